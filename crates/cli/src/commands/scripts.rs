//! Script Commands

use anyhow::Result;
use clap::Subcommand;

use crate::client::ApiClient;
use crate::output::{print_item, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// Generate a pytest/Playwright script for one or more test cases
    Generate {
        /// Test case IDs
        #[arg(required = true)]
        test_case_ids: Vec<i64>,

        /// Print the generated source
        #[arg(long)]
        show: bool,
    },

    /// List scripts
    List {
        /// Only scripts of this test case
        #[arg(long)]
        test_case_id: Option<i64>,
    },
}

pub async fn execute(cmd: ScriptCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        ScriptCommands::Generate { test_case_ids, show } => {
            for id in test_case_ids {
                let script = client.generate_script(id).await?;
                print_success(&format!(
                    "Script {} written to {}",
                    script.id,
                    script.file_path.as_deref().unwrap_or("-")
                ));
                if show {
                    println!("{}", script.content.as_deref().unwrap_or_default());
                } else {
                    print_item(&script, format);
                }
            }
        }

        ScriptCommands::List { test_case_id } => {
            let scripts = client.list_scripts(test_case_id).await?;
            print_list(&scripts, format);
        }
    }

    Ok(())
}
