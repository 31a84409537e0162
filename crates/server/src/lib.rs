//! V&V automation server
//!
//! REST backend that turns SRS documents into test cases via an LLM,
//! generates pytest/Playwright scripts for them, executes the scripts and
//! reports per-script outcomes.

// Nested json! literals in the OpenAPI document
#![recursion_limit = "256"]

pub mod api;
pub mod error;
pub mod execution;
pub mod llm;
pub mod normalize;
pub mod scripts;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{app, serve, AppState};
