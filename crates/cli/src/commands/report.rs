//! Report Command

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{print_item, OutputFormat};

/// Summary of the most recent run
pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.latest_report().await?;
    print_item(&report, format);
    Ok(())
}
