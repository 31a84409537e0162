//! Lint gate for generated scripts and the backend tree
//!
//! Runs `flake8 .` (or another linter) in a directory and turns a non-zero
//! exit into a failure that stops whatever comes after the check.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct LintConfig {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            program: "flake8".to_string(),
            args: vec![".".to_string()],
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LintOutcome {
    /// Linter exit code; `None` when killed by a signal
    pub exit_code: Option<i32>,
}

impl LintOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code the gate itself reports: 0 on a clean tree, 1 otherwise
    pub fn gate_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    /// Convert a failed check into an error so `?` stops the caller
    pub fn into_result(self) -> Result<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(Error::Validation(match self.exit_code {
                Some(code) => format!("lint failed with exit code {}", code),
                None => "lint terminated by signal".to_string(),
            }))
        }
    }
}

/// Run the linter with inherited stdout/stderr
pub fn run_lint(config: &LintConfig) -> Result<LintOutcome> {
    debug!(
        "Running {} {:?} in {}",
        config.program,
        config.args,
        config.dir.display()
    );

    let status = Command::new(&config.program)
        .args(&config.args)
        .current_dir(&config.dir)
        .stdin(Stdio::null())
        .status()
        .map_err(|e| Error::Execution(format!("failed to start {}: {}", config.program, e)))?;

    let outcome = LintOutcome {
        exit_code: status.code(),
    };
    if outcome.passed() {
        info!("Lint passed");
    } else {
        warn!("Lint failed with status {:?}", outcome.exit_code);
    }
    Ok(outcome)
}
