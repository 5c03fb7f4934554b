//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::domain::model::OutputContainer;

/// Arguments for the formats command
#[derive(Args, Debug)]
pub struct FormatsArgs {
    /// Video URL
    #[arg(short, long)]
    pub url: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the clip command
#[derive(Args, Debug)]
pub struct ClipArgs {
    /// Video URL
    #[arg(short, long)]
    pub url: String,

    /// Format id as listed by `ytclip formats`
    #[arg(short, long)]
    pub format: String,

    /// Audio-only format id to pair with a video-only format (default: best audio)
    #[arg(short, long)]
    pub audio_format: Option<String>,

    /// Start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: String,

    /// End time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub end: String,

    /// Output file path (default: <title>_clip_<start>_<end>.<ext> in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for auto-named clips
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Preferred output container (mkv, mp4, webm)
    #[arg(long, value_parser = parse_container)]
    pub container: Option<OutputContainer>,

    /// Replace the output file if it exists
    #[arg(long)]
    pub overwrite: bool,

    /// Cut on existing keyframes instead of re-encoding around the cut points
    #[arg(long)]
    pub no_keyframe_cuts: bool,
}

fn parse_container(value: &str) -> Result<OutputContainer, String> {
    OutputContainer::parse(value)
        .ok_or_else(|| format!("unknown container '{}' (expected mkv, mp4, webm or mka)", value))
}
