//! Environment-driven configuration
//!
//! Every setting has a default so the backend starts with an empty
//! environment: mock LLM, SQLite under `./data`, CORS for the local frontend.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30 * 60;

/// Backend configuration
#[derive(Debug, Clone, Serialize)]
pub struct VvConfig {
    /// Root of uploads, generated scripts and run artifacts
    pub data_dir: PathBuf,

    /// Where the SQLite store lives
    pub database: DatabaseLocation,

    /// Allowed CORS origin (`*` allows any)
    pub frontend_url: String,

    /// HTTP listen address
    pub bind_addr: String,

    pub llm: LlmConfig,

    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "path")]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// LLM provider selection
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub provider: String,
    pub mock: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Test execution settings
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionConfig {
    /// Interpreter used as `<python> -m pytest`
    pub python: String,
    pub timeout_secs: u64,
}

impl Default for VvConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            database: DatabaseLocation::File(data_dir.join("app.db")),
            data_dir,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            llm: LlmConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            mock: true,
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.to_string(),
            timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl VvConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = PathBuf::from(
            non_empty("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let database = match non_empty("DATABASE_URL") {
            Some(url) => parse_database_url(&url)?,
            None => DatabaseLocation::File(data_dir.join("app.db")),
        };

        let timeout_secs = match non_empty("VV_RUN_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!("VV_RUN_TIMEOUT_SECS must be an integer, got '{}'", v))
            })?,
            None => DEFAULT_RUN_TIMEOUT_SECS,
        };

        Ok(Self {
            data_dir,
            database,
            frontend_url: non_empty("REACT_APP_FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            bind_addr: non_empty("VV_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            llm: LlmConfig {
                provider: non_empty("LLM_PROVIDER")
                    .map(|v| v.to_lowercase())
                    .unwrap_or_else(|| "mock".to_string()),
                mock: lookup("LLM_MOCK")
                    .map(|v| parse_bool(&v))
                    .unwrap_or(true),
                api_key: non_empty("LLM_API_KEY"),
                base_url: non_empty("LLM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                model: non_empty("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            },
            execution: ExecutionConfig {
                python: non_empty("VV_PYTHON").unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
                timeout_secs,
            },
        })
    }

    /// Configuration rooted at `data_dir` with an in-memory database (for testing)
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            database: DatabaseLocation::Memory,
            ..Default::default()
        }
    }
}

/// Truthy values accepted for boolean flags
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Resolve a `DATABASE_URL` to a SQLite location.
///
/// Follows the SQLAlchemy convention: `sqlite:///rel.db` is relative,
/// `sqlite:////abs/app.db` is absolute.
pub fn parse_database_url(url: &str) -> Result<DatabaseLocation> {
    let url = url.trim();
    if url == "sqlite::memory:" || url == "sqlite://" || url == "sqlite:///:memory:" {
        return Ok(DatabaseLocation::Memory);
    }
    if let Some(path) = url.strip_prefix("sqlite:///") {
        return Ok(DatabaseLocation::File(PathBuf::from(path)));
    }
    if let Some(path) = url.strip_prefix("sqlite://") {
        return Ok(DatabaseLocation::File(PathBuf::from(path)));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(Error::InvalidConfig(format!(
            "unsupported DATABASE_URL scheme '{}': only sqlite is available",
            scheme
        )));
    }
    Ok(DatabaseLocation::File(PathBuf::from(url)))
}
