//! Core V&V entities
//!
//! SRS documents produce test cases, test cases produce scripts, and runs
//! execute scripts into per-script test results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCRIPT_LANGUAGE: &str = "python";
pub const DEFAULT_SCRIPT_FRAMEWORK: &str = "pytest-playwright";

// ============================================================================
// SRS
// ============================================================================

/// Software requirements specification document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Srs {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Normalized markdown/plain text of the document
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSrs {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// ============================================================================
// Test cases
// ============================================================================

/// Structured test case generated from an SRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub srs_id: i64,
    pub name: String,
    pub description: Option<String>,
    /// e.g. P0/P1
    pub priority: Option<String>,
    /// Comma-separated
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Test case content before it is attached to an SRS
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestCaseDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl From<&TestCase> for TestCaseDraft {
    fn from(tc: &TestCase) -> Self {
        Self {
            name: tc.name.clone(),
            description: tc.description.clone(),
            priority: tc.priority.clone(),
            tags: tc.tags.clone(),
        }
    }
}

// ============================================================================
// Scripts
// ============================================================================

/// Generated test script for a test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: i64,
    pub test_case_id: i64,
    pub language: String,
    pub framework: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScript {
    pub test_case_id: i64,
    pub language: String,
    pub framework: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
}

impl NewScript {
    /// pytest + Playwright script with the default language/framework
    pub fn pytest_playwright(test_case_id: i64, content: String, file_path: String) -> Self {
        Self {
            test_case_id,
            language: DEFAULT_SCRIPT_LANGUAGE.to_string(),
            framework: DEFAULT_SCRIPT_FRAMEWORK.to_string(),
            content: Some(content),
            file_path: Some(file_path),
        }
    }
}

// ============================================================================
// Runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {}", s)),
        }
    }
}

/// Execution batch of scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub label: Option<String>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// User or system
    pub triggered_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Error,
    Pending,
}

impl Default for Outcome {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("unknown outcome: {}", s)),
        }
    }
}

/// Result of executing one script within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub run_id: i64,
    pub script_id: i64,
    pub outcome: Outcome,
    pub duration_ms: Option<i64>,
    /// Assertion message, error output, junit pointer
    pub message: Option<String>,
    /// Logs, screenshots, videos
    pub artifacts_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub run_id: i64,
    pub script_id: i64,
    pub outcome: Outcome,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
    pub artifacts_path: Option<String>,
}

/// Outcome counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Error => summary.errors += 1,
                Outcome::Pending => {}
            }
        }
        summary
    }
}
