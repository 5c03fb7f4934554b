// Domain errors - Error types for the domain layer

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving a URL into a format catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The metadata service could not reach the remote site
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The metadata service rejected the URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The service answered, but no usable stream was listed
    #[error("No downloadable formats available for this URL")]
    NoFormatsAvailable,

    /// The service is missing, crashed, or produced unreadable output
    #[error("Metadata service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl FetchError {
    /// Short hint shown to the user next to the error
    pub fn suggestion(&self) -> &'static str {
        match self {
            FetchError::NetworkUnreachable(_) => "Check your network connection and try again.",
            FetchError::InvalidUrl(_) => "Check that the URL points to a single, public video.",
            FetchError::NoFormatsAvailable => {
                "The video may be a live stream, private, or region-locked."
            }
            FetchError::ServiceUnavailable(_) => {
                "Make sure yt-dlp is installed and up to date (`yt-dlp -U`)."
            }
        }
    }
}

/// Logic-level rejections raised while building a clip plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The format id is not part of the catalog
    #[error("Unknown format: '{0}' is not listed for this video")]
    UnknownFormat(String),

    /// A video-only format was chosen but nothing can provide its audio
    #[error("Format '{format_id}' has no audio track and no audio-only stream is available to pair with it")]
    NoAudioAvailable { format_id: String },

    /// The audio override is not an audio-only stream
    #[error("Format '{0}' is not an audio-only stream and cannot be used as the audio track")]
    NotAudioOnly(String),

    /// An audio override was given for a format that is not video-only
    #[error("Format '{format_id}' is not video-only; an audio format can only be paired with a video-only format")]
    AudioNotPairable { format_id: String },

    /// A bound is negative or not a number, or start is not strictly before end
    #[error("Invalid range: start ({start}) must be a non-negative time before end ({end})")]
    InvalidRange { start: String, end: String },

    /// The plan was built from a catalog that has since been replaced
    #[error("The format list changed since this clip was planned; fetch and select again")]
    StaleCatalog,

    /// No catalog has been fetched in this session yet
    #[error("No formats fetched yet")]
    NoCatalog,
}

/// Exit information of a failed external process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub stderr_tail: Vec<String>,
}

impl ExitInfo {
    /// Last non-empty diagnostic line, usually the `ERROR:` line of yt-dlp
    pub fn last_line(&self) -> Option<&str> {
        self.stderr_tail
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code)?,
            None => write!(f, "terminated by signal")?,
        }
        if let Some(line) = self.last_line() {
            write!(f, ": {}", line)?;
        }
        Ok(())
    }
}

/// Runtime failures while executing a clip plan
#[derive(Error, Debug)]
pub enum ExecError {
    /// A required external program is not installed or not on PATH
    #[error("Executor not found: '{program}' could not be started")]
    ExecutorNotFound { program: String },

    /// The executor ran but reported a failure
    #[error("Clip execution failed ({0})")]
    ExecutionFailed(ExitInfo),

    /// The user cancelled the request
    #[error("Clip cancelled")]
    Cancelled,

    /// Another clip is already being written to this path
    #[error("Another clip is already being written to {}", .0.display())]
    OutputBusy(PathBuf),

    /// The target exists and overwriting is disabled
    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any failure surfaced by the clip pipeline
#[derive(Error, Debug)]
pub enum ClipError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}
