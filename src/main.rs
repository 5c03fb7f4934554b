//! ytclip - cut a clip out of an online video
//!
//! Lists the formats yt-dlp offers for a URL and downloads only the requested
//! time range, merged into a single file.
//!
//! # Usage
//!
//! ```bash
//! ytclip formats --url "https://www.youtube.com/watch?v=..."
//! ytclip clip --url "https://www.youtube.com/watch?v=..." --format 137 --start 1:00 --end 1:30
//! ytclip check
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use ytclip::cli::{commands, Cli, Commands};
use ytclip::utils::logging::{init_logging, log_system_info};

/// Main entry point for the ytclip CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;

    init_logging(&config.logging_config())?;
    log_system_info();

    match cli.command {
        Commands::Formats(args) => {
            info!("Executing formats command");
            commands::formats(args, &config).await
        }
        Commands::Clip(args) => {
            info!("Executing clip command");
            commands::clip(args, config).await
        }
        Commands::Check => {
            info!("Executing check command");
            commands::check(&config).await
        }
    }
}
