//! In-memory adapters for tests and offline use

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::output::{OverwritePolicy, StagedOutput};
use crate::ports::*;

/// Metadata provider answering from a fixed table
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    responses: HashMap<String, Result<RawMetadata, FetchError>>,
    calls: AtomicUsize,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, url: &str, metadata: RawMetadata) -> Self {
        self.responses.insert(url.to_string(), Ok(metadata));
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    /// Number of `describe` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Metadata for the catalog used throughout the docs: 137 video-only,
    /// 140 audio-only, 18 pre-merged. Listed best first.
    pub fn sample_metadata() -> RawMetadata {
        RawMetadata {
            title: Some("Sample Video".to_string()),
            duration: Some(212.0),
            webpage_url: None,
            formats: vec![
                RawFormat::new("137", "mp4")
                    .with_codecs("avc1.640028", "none")
                    .with_size(1920, 1080),
                RawFormat::new("140", "m4a").with_codecs("none", "mp4a.40.2"),
                RawFormat::new("18", "mp4")
                    .with_codecs("avc1.42001E", "mp4a.40.2")
                    .with_size(640, 360),
            ],
        }
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn describe(&self, url: &str) -> Result<RawMetadata, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::InvalidUrl(format!("Unsupported URL: {}", url))))
    }
}

/// Scripted outcome of [`MockClipExecutor::execute`]
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Write the given bytes to the target through a staging directory
    Succeed(Vec<u8>),
    /// Exit with the given code
    Fail(i32),
    /// Run until cancelled
    Hang,
}

/// Executor that produces files without any external tool
#[derive(Debug)]
pub struct MockClipExecutor {
    behavior: Mutex<MockBehavior>,
    calls: AtomicUsize,
}

impl MockClipExecutor {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self
            .behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn behavior(&self) -> MockBehavior {
        self.behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ClipExecutor for MockClipExecutor {
    async fn execute(
        &self,
        plan: &ClipPlan,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let staged = StagedOutput::create(&plan.output_path)?;
        let _ = progress.send(ProgressEvent::Percent(0.0));

        match self.behavior() {
            MockBehavior::Succeed(bytes) => {
                tokio::fs::write(staged.staged_file(plan.container.extension()), bytes).await?;
                if cancel.is_cancelled() {
                    return Err(ExecError::Cancelled);
                }
                let _ = progress.send(ProgressEvent::Percent(100.0));
                staged.commit(OverwritePolicy::Always)
            }
            MockBehavior::Fail(code) => Err(ExecError::ExecutionFailed(ExitInfo {
                code: Some(code),
                stderr_tail: vec!["ERROR: mock failure".to_string()],
            })),
            MockBehavior::Hang => {
                tokio::fs::write(staged.staged_file("part"), b"partial").await?;
                cancel.cancelled().await;
                Err(ExecError::Cancelled)
            }
        }
    }

    async fn check_dependencies(&self) -> Result<Vec<ToolVersion>, ExecError> {
        Ok(vec![ToolVersion {
            name: "mock".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }])
    }
}
