//! Integration tests for cursor pagination over a fixture server

use futures_util::TryStreamExt;
use serde_json::{json, Value};
use vimeo_archiver::api::{ApiConfig, ApiError, CatalogSource, Paginator, VimeoApi, VimeoHttpClient};
use vimeo_archiver::retry::RetryPolicy;

use crate::support::{FixtureServer, Reply};

fn config(server: &FixtureServer) -> ApiConfig {
    ApiConfig::new("secret")
        .with_base_url(server.base_url())
        .with_page_size(2)
        .with_retry_policy(RetryPolicy::immediate(2))
}

fn ids(items: &[Value]) -> Vec<&str> {
    items.iter().filter_map(|item| item["uri"].as_str()).collect()
}

#[tokio::test]
async fn test_follows_absolute_and_relative_next_links() {
    let server = FixtureServer::start().await;
    server.push(Reply::json(json!({
        "data": [{"uri": "/videos/1"}, {"uri": "/videos/2"}],
        "paging": {"next": server.url("/me/videos?page=2")}
    })));
    server.push(Reply::json(json!({
        "data": [{"uri": "/videos/3"}, {"uri": "/videos/4"}],
        "paging": {"next": "/me/videos?page=3"}
    })));
    server.push(Reply::json(json!({
        "data": [{"uri": "/videos/5"}],
        "paging": {"next": null}
    })));

    let client = VimeoHttpClient::new(config(&server)).unwrap();
    let items: Vec<Value> = Paginator::new(&client, "/me/videos")
        .with_fields("uri,name")
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(
        ids(&items),
        vec!["/videos/1", "/videos/2", "/videos/3", "/videos/4", "/videos/5"]
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].path(), "/me/videos");
    assert!(requests[0].query().contains("per_page=2"));
    assert!(requests[0].query().contains("fields=uri%2Cname"));
    assert_eq!(requests[1].target, "/me/videos?page=2");
    assert_eq!(requests[2].target, "/me/videos?page=3");

    for request in &requests {
        assert_eq!(request.header("authorization"), Some("bearer secret"));
        assert_eq!(
            request.header("accept"),
            Some("application/vnd.vimeo.*+json;version=3.4")
        );
    }
}

#[tokio::test]
async fn test_missing_data_and_empty_next_end_stream() {
    let server = FixtureServer::start().await;
    server.push(Reply::json(json!({"data": null, "paging": {"next": ""}})));

    let client = VimeoHttpClient::new(config(&server)).unwrap();
    let items: Vec<Value> = Paginator::new(&client, "/me/projects")
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    assert!(items.is_empty());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_pages_fetched_only_on_demand() {
    let server = FixtureServer::start().await;
    server.push(Reply::json(json!({
        "data": [{"uri": "/videos/1"}],
        "paging": {"next": "/me/videos?page=2"}
    })));

    let client = VimeoHttpClient::new(config(&server)).unwrap();
    let mut stream = Paginator::new(&client, "/me/videos").into_stream();
    let first = stream.try_next().await.unwrap().unwrap();
    assert_eq!(first["uri"], "/videos/1");

    drop(stream);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_failing_page_ends_stream_with_error() {
    let server = FixtureServer::start().await;
    server.push(Reply::json(json!({
        "data": [{"uri": "/videos/1"}],
        "paging": {"next": "/me/videos?page=2"}
    })));
    server.push(Reply::new(500, "upstream exploded"));

    let client = VimeoHttpClient::new(config(&server)).unwrap();
    let mut stream = Paginator::new(&client, "/me/videos").into_stream();

    assert!(stream.try_next().await.unwrap().is_some());
    match stream.try_next().await {
        Err(ApiError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_page_limit_stops_endless_listing() {
    let server = FixtureServer::start().await;
    for page in 0..3 {
        server.push(Reply::json(json!({
            "data": [{"uri": format!("/videos/{page}")}],
            "paging": {"next": "/me/videos?again"}
        })));
    }

    let client = VimeoHttpClient::new(config(&server)).unwrap();
    let result: Result<Vec<Value>, ApiError> = Paginator::new(&client, "/me/videos")
        .with_max_pages(2)
        .into_stream()
        .try_collect()
        .await;

    assert!(matches!(result, Err(ApiError::TooManyPages { limit: 2 })));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_folder_listing_decodes_parent_shapes() {
    let server = FixtureServer::start().await;
    server.push(Reply::json(json!({
        "data": [
            {"uri": "/users/1/projects/10", "name": "Top"},
            {
                "uri": "/users/1/projects/11",
                "name": "Object parent",
                "metadata": {"connections": {"parent_folder": {"uri": "/users/1/projects/10"}}}
            },
            {
                "uri": "/users/1/projects/12",
                "name": "List parent",
                "metadata": {"connections": {"parent_folder": [{"uri": "/users/1/projects/10"}]}}
            }
        ],
        "paging": {"next": null}
    })));

    let api = VimeoApi::new(config(&server)).unwrap();
    let folders = api.folders().await.unwrap();

    let parents: Vec<Option<String>> = folders.iter().map(|f| f.parent_id()).collect();
    assert_eq!(
        parents,
        vec![None, Some("10".to_string()), Some("10".to_string())]
    );
    assert_eq!(server.requests()[0].path(), "/me/projects");
}
