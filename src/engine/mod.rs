//! Process supervision and progress reporting for external tools

pub mod process;
pub mod progress;

pub use process::{run_supervised, Supervised, ToolCommand, STDERR_TAIL_LINES};
pub use progress::ProgressParser;
