//! V&V Common Library
//!
//! Configuration, data model, persistence and storage layout shared by the
//! V&V automation server and CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod lint;
pub mod storage;
pub mod types;

pub use config::{DatabaseLocation, ExecutionConfig, LlmConfig, VvConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::*;

/// Backend version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
