//! CLI module for ytclip
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{ClipArgs, FormatsArgs};

/// ytclip - cut a clip out of an online video
///
/// Lists the formats of a video and downloads only the requested time range,
/// pairing video-only streams with the best audio stream automatically.
#[derive(Parser, Debug)]
#[command(name = "ytclip")]
#[command(about = "Cut a time-bounded clip out of an online video using yt-dlp and ffmpeg")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (default: ./ytclip.toml when present)
    #[arg(long, global = true, env = "YTCLIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the downloadable formats of a video
    Formats(args::FormatsArgs),
    /// Download a time range of a video in the chosen format
    Clip(args::ClipArgs),
    /// Check that yt-dlp and ffmpeg are installed
    Check,
}
