// Ports - Interface definitions (contracts)

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Channel used by executors to report progress
pub type ProgressSink = mpsc::UnboundedSender<ProgressEvent>;

/// Video description as reported by the metadata service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One format as reported by the metadata service. Codec fields use the
/// literal `none` for a missing track.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

impl RawFormat {
    pub fn new(format_id: impl Into<String>, ext: &str) -> Self {
        Self {
            format_id: format_id.into(),
            ext: Some(ext.to_string()),
            ..Self::default()
        }
    }

    pub fn with_codecs(mut self, vcodec: &str, acodec: &str) -> Self {
        self.vcodec = Some(vcodec.to_string());
        self.acodec = Some(acodec.to_string());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Port for resolving a URL into its available formats
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Describe the video behind `url`. Formats are returned best first.
    async fn describe(&self, url: &str) -> Result<RawMetadata, FetchError>;
}

/// Port for producing a clip file from a plan
#[async_trait]
pub trait ClipExecutor: Send + Sync {
    /// Produce `plan.output_path`. Returns the written path.
    ///
    /// Implementations must stop promptly once `cancel` fires and must not
    /// leave a partial file at the target.
    async fn execute(
        &self,
        plan: &ClipPlan,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ExecError>;

    /// Verify the external tools the executor drives are installed
    async fn check_dependencies(&self) -> Result<Vec<ToolVersion>, ExecError>;
}

/// Name and reported version of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub name: String,
    pub version: String,
}
