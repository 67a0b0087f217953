//! Cursor pagination over Vimeo listing endpoints
//!
//! Every listing answers with `{data: [...], paging: {next}}`. The paginator
//! fetches one page at a time, only when the consumer asks for more items, and
//! follows `paging.next` whether it is a full URL or an API-relative path.
//!
//! Safety mechanisms:
//! - `per_page` and `fields` are only sent with the first request; continuation
//!   links already carry them
//! - a hard page limit stops servers that never stop answering with `next`
//! - any failure ends the stream with an error rather than truncating it

use futures_util::stream::{self, TryStreamExt};
use tracing::debug;

use crate::api::config::MAX_PAGES;
use crate::api::http::VimeoHttpClient;
use crate::api::models::Page;
use crate::api::{ApiError, ItemStream};

/// Builder for a lazy item stream over one listing endpoint
pub struct Paginator<'a> {
    client: &'a VimeoHttpClient,
    reference: String,
    fields: Option<String>,
    page_size: u32,
    max_pages: usize,
}

struct Cursor {
    next: Option<String>,
    query: Vec<(&'static str, String)>,
    pages: usize,
}

impl<'a> Paginator<'a> {
    /// Paginate `reference` (absolute URL or API-relative path) with the
    /// client's configured page size.
    pub fn new(client: &'a VimeoHttpClient, reference: impl Into<String>) -> Self {
        Self {
            client,
            reference: reference.into(),
            fields: None,
            page_size: client.config().page_size,
            max_pages: MAX_PAGES,
        }
    }

    /// Restrict the returned fields (sent on the first page only).
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Override the page size for this listing.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the page limit.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn first_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("per_page", self.page_size.to_string())];
        if let Some(fields) = &self.fields {
            query.push(("fields", fields.clone()));
        }
        query
    }

    /// Lazy stream of items in page order.
    pub fn into_stream(self) -> ItemStream<'a> {
        let client = self.client;
        let max_pages = self.max_pages;
        let cursor = Cursor {
            query: self.first_query(),
            next: Some(self.reference),
            pages: 0,
        };

        let pages = stream::try_unfold(cursor, move |mut cursor| async move {
            let Some(reference) = cursor.next.take() else {
                return Ok(None);
            };

            if cursor.pages >= max_pages {
                return Err(ApiError::TooManyPages { limit: max_pages });
            }

            let query = std::mem::take(&mut cursor.query);
            let page: Page = client.get(&reference, &query).await?;
            cursor.pages += 1;
            cursor.next = page.next_reference().map(str::to_string);

            let items = page.into_items();
            debug!(
                "Received {} items in page {} of {}",
                items.len(),
                cursor.pages,
                reference
            );
            if cursor.next.is_none() {
                debug!("Pagination complete after {} pages", cursor.pages);
            }

            Ok(Some((items, cursor)))
        });

        Box::pin(
            pages
                .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, ApiError>)))
                .try_flatten(),
        )
    }
}
