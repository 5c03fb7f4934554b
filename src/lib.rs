//! ytclip library
//!
//! Resolves a video URL into a catalog of stream formats, plans which streams
//! make up a clip (pairing video-only streams with the best audio stream) and
//! runs the cut through yt-dlp and ffmpeg with progress and cancellation.
//!
//! The [`app::ClipSession`] type is the entry point for interactive front ends:
//! fetch formats, list them, plan a clip and start it.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod output;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{AppContainer, ClipHandle, ClipInteractor, ClipSession, FormatCatalog};
pub use domain::errors::{ClipError, ExecError, ExitInfo, FetchError, PlanError};
pub use domain::model::{
    Catalog, ClipOutput, ClipPlan, ClipResult, ClipState, FormatEntry, FormatKind,
    FormatListing, OutputContainer, ProgressEvent, TimeRange, TimeSpec,
};
pub use domain::rules::{ClipPlanner, FormatLister, PlannerSettings};
