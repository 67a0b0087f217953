//! CLI command implementations

pub mod download;
pub mod error;
pub mod tree;

pub use download::{Cli, Commands, DownloadArgs, OutputFormat, ProgressMode};
pub use error::CliError;
pub use tree::{render_tree, TreeArgs, TreeNode};
