//! Run Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use vv_common::RunStatus;

use crate::client::ApiClient;
use crate::output::{print_item, print_list, print_success, print_warning, OutputFormat};

#[derive(Subcommand)]
pub enum RunCommands {
    /// Execute scripts with pytest and wait for the result
    Create {
        /// Script IDs
        #[arg(required = true)]
        script_ids: Vec<i64>,

        /// Run label
        #[arg(short, long)]
        label: Option<String>,

        /// Recorded as the run's trigger
        #[arg(long, default_value = "cli")]
        triggered_by: String,

        /// Exit non-zero when the run fails
        #[arg(long)]
        check: bool,
    },

    /// List runs, newest first
    List,

    /// Get a run
    Get {
        /// Run ID
        id: i64,
    },

    /// Per-script results of a run
    Results {
        /// Run ID
        id: i64,
    },

    /// Tail of a run's pytest log
    Logs {
        /// Run ID
        id: i64,
    },
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub async fn execute(cmd: RunCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        RunCommands::Create {
            script_ids,
            label,
            triggered_by,
            check,
        } => {
            let pb = spinner(format!("Running {} script(s)", script_ids.len()));
            let run = client
                .create_run(&script_ids, label.as_deref(), &triggered_by)
                .await;
            pb.finish_and_clear();
            let run = run?;

            if run.status == RunStatus::Completed {
                print_success(&format!("Run {} completed", run.id));
            } else {
                print_warning(&format!("Run {} {}", run.id, run.status));
            }
            print_item(&run, format);

            let results = client.run_results(run.id).await?;
            print_list(&results, format);

            if check && run.status != RunStatus::Completed {
                bail!("Run {} finished with status {}", run.id, run.status);
            }
        }

        RunCommands::List => {
            let runs = client.list_runs().await?;
            print_list(&runs, format);
        }

        RunCommands::Get { id } => {
            let run = client.get_run(id).await?;
            print_item(&run, format);
        }

        RunCommands::Results { id } => {
            let results = client.run_results(id).await?;
            print_list(&results, format);
        }

        RunCommands::Logs { id } => {
            let logs = client.run_logs(id).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&logs)?);
                }
                _ => {
                    println!("# {}", logs.log_path);
                    print!("{}", logs.tail);
                }
            }
        }
    }

    Ok(())
}
