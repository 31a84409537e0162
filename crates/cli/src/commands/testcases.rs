//! Test case Commands

use anyhow::Result;
use clap::Subcommand;

use crate::client::ApiClient;
use crate::output::{print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum TestCaseCommands {
    /// Generate test cases for an SRS with the configured LLM
    Generate {
        /// SRS ID
        srs_id: i64,
    },

    /// List test cases
    List {
        /// Only cases of this SRS
        #[arg(long)]
        srs_id: Option<i64>,
    },
}

pub async fn execute(cmd: TestCaseCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        TestCaseCommands::Generate { srs_id } => {
            let cases = client.generate_test_cases(srs_id).await?;
            print_success(&format!("{} test case(s) for SRS {}", cases.len(), srs_id));
            print_list(&cases, format);
        }

        TestCaseCommands::List { srs_id } => {
            let cases = client.list_test_cases(srs_id).await?;
            print_list(&cases, format);
        }
    }

    Ok(())
}
