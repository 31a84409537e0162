//! SRS Commands

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::client::ApiClient;
use crate::output::{print_item, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum SrsCommands {
    /// List SRS documents
    List,

    /// Get an SRS document
    Get {
        /// SRS ID
        id: i64,
    },

    /// Create an SRS from text
    Create {
        /// Title
        #[arg(short, long)]
        title: String,

        /// Short description
        #[arg(short, long)]
        description: Option<String>,

        /// Requirement text
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read the requirement text from a file
        #[arg(long)]
        content_file: Option<PathBuf>,
    },

    /// Upload an SRS file (.txt, .md, .json, .csv, .xlsx, .xls)
    Upload {
        /// File to upload
        file: PathBuf,

        /// Title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Short description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete an SRS with its test cases, scripts and results
    Delete {
        /// SRS ID
        id: i64,
    },
}

pub async fn execute(cmd: SrsCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        SrsCommands::List => {
            let items = client.list_srs().await?;
            print_list(&items, format);
        }

        SrsCommands::Get { id } => {
            let srs = client.get_srs(id).await?;
            print_item(&srs, format);
        }

        SrsCommands::Create {
            title,
            description,
            content,
            content_file,
        } => {
            let content = match content_file {
                Some(path) => Some(tokio::fs::read_to_string(&path).await?),
                None => content,
            };
            let srs = client
                .create_srs(&title, description.as_deref(), content.as_deref())
                .await?;
            print_success(&format!("SRS {} created", srs.id));
            print_item(&srs, format);
        }

        SrsCommands::Upload {
            file,
            title,
            description,
        } => {
            let srs = client
                .upload_srs(&file, title.as_deref(), description.as_deref())
                .await?;
            print_success(&format!("Uploaded {} as SRS {}", file.display(), srs.id));
            print_item(&srs, format);
        }

        SrsCommands::Delete { id } => {
            client.delete_srs(id).await?;
            print_success(&format!("SRS {} deleted", id));
        }
    }

    Ok(())
}
