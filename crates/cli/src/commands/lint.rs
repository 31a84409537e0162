//! Lint gate
//!
//! Runs the Python linter over a source tree. A non-zero linter exit stops
//! the pipeline with exit code 1; a clean tree falls through with 0.

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use vv_common::lint::{run_lint, LintConfig};

use crate::output::{print_error, print_success};

#[derive(Args)]
pub struct LintArgs {
    /// Directory to lint
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Linter executable
    #[arg(long, default_value = "flake8")]
    pub linter: String,

    /// Arguments passed to the linter (default: `.`)
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl LintArgs {
    fn config(&self) -> LintConfig {
        let args = if self.args.is_empty() {
            vec![".".to_string()]
        } else {
            self.args.clone()
        };
        LintConfig {
            program: self.linter.clone(),
            args,
            dir: self.path.clone(),
        }
    }
}

/// Exit code for the gate: 0 when the linter passed, 1 otherwise
pub fn execute(args: LintArgs) -> i32 {
    let config = args.config();
    info!("Linting {} with {}", config.dir.display(), config.program);

    match run_lint(&config) {
        Ok(outcome) if outcome.passed() => {
            print_success("Lint passed");
            0
        }
        Ok(outcome) => {
            print_error(&format!(
                "Lint failed (linter exit code {})",
                outcome
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string())
            ));
            outcome.gate_code()
        }
        Err(e) => {
            print_error(&format!("Lint could not run: {}", e));
            1
        }
    }
}
