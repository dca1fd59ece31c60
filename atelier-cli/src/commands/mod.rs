//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod health;
mod job;

use anyhow::Result;
use atelier_client::AtelierClient;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit an image generation request
    Submit(job::SubmitArgs),
    /// Submit every request in a JSON file
    Batch {
        /// File holding `{"requests": [...]}` or a plain array of requests
        file: PathBuf,
    },
    /// Show the status of a job
    Status {
        /// Job ID
        id: String,
    },
    /// Wait until a job completes or fails
    Wait {
        /// Job ID
        id: String,

        /// Seconds between status polls
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 3600)]
        timeout: u64,
    },
    /// Download a generated image
    Download {
        /// Job ID
        id: String,

        /// Index of the image within the job
        #[arg(short, long, default_value_t = 0)]
        index: usize,

        /// Output file (default: <id>_image_<index>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show server health
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = AtelierClient::new(&config.server_url);

    match command {
        Commands::Submit(args) => job::submit(&client, args).await,
        Commands::Batch { file } => job::batch(&client, &file).await,
        Commands::Status { id } => job::status(&client, &id).await,
        Commands::Wait {
            id,
            interval,
            timeout,
        } => job::wait(&client, &id, interval, timeout).await.map(|_| ()),
        Commands::Download { id, index, output } => {
            job::download(&client, &id, index, output).await
        }
        Commands::Health => health::health(&client).await,
    }
}
