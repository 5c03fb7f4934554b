// Clip interactor - Runs clip plans on background tasks

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::ClipPlanner;
use crate::output::{OutputClaim, OverwritePolicy};
use crate::ports::*;

/// Interactor for the clip use case
pub struct ClipInteractor {
    planner: ClipPlanner,
    executor: Arc<dyn ClipExecutor>,
    overwrite: OverwritePolicy,
}

impl ClipInteractor {
    /// Create new clip interactor with an injected executor
    pub fn new(
        planner: ClipPlanner,
        executor: Arc<dyn ClipExecutor>,
        overwrite: OverwritePolicy,
    ) -> Self {
        Self {
            planner,
            executor,
            overwrite,
        }
    }

    pub fn planner(&self) -> &ClipPlanner {
        &self.planner
    }

    /// Plan and start a clip. `output` replaces the planner's default path.
    pub fn request_clip(
        &self,
        catalog: &Catalog,
        format_id: &str,
        range: TimeRange,
        output: Option<PathBuf>,
    ) -> Result<ClipHandle, ClipError> {
        let plan = self.planner.plan(catalog, format_id, range)?;
        let plan = match output {
            Some(path) => plan.with_output_path(path),
            None => plan,
        };
        self.start(plan)
    }

    /// Start executing `plan` on a tokio task. Must be called inside a runtime.
    ///
    /// Fails immediately when another clip of this process is writing the same
    /// path, or when the target exists and overwriting is disabled.
    pub fn start(&self, plan: ClipPlan) -> Result<ClipHandle, ClipError> {
        let claim = OutputClaim::acquire(&plan.output_path)?;
        if !self.overwrite.allows_overwrite() && plan.output_path.exists() {
            return Err(ExecError::OutputExists(plan.output_path.clone()).into());
        }

        // The plan is final here, so the request starts out executing
        let (state_tx, state_rx) = watch::channel(ClipState::Executing);
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let output_path = plan.output_path.clone();

        let executor = Arc::clone(&self.executor);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _claim = claim;
            let started = Instant::now();

            let outcome = executor
                .execute(&plan, progress_tx, task_cancel)
                .await
                .and_then(|path| {
                    let size_bytes = std::fs::metadata(&path)?.len();
                    Ok(ClipOutput {
                        path,
                        size_bytes,
                        elapsed: started.elapsed(),
                    })
                });

            let state = match &outcome {
                Ok(output) => {
                    info!(
                        "Clip written to {} ({} bytes) in {:.1?}",
                        output.path.display(),
                        output.size_bytes,
                        output.elapsed
                    );
                    ClipState::Succeeded
                }
                Err(ExecError::Cancelled) => {
                    info!("Clip cancelled");
                    ClipState::Cancelled
                }
                Err(e) => {
                    error!("Clip failed: {}", e);
                    ClipState::Failed
                }
            };
            state_tx.send_replace(state);
            outcome
        });

        Ok(ClipHandle {
            output_path,
            state: state_rx,
            progress: progress_rx,
            cancel,
            task,
        })
    }

    /// Verify the executor's external tools
    pub async fn check_dependencies(&self) -> Result<Vec<ToolVersion>, ExecError> {
        self.executor.check_dependencies().await
    }
}

/// Handle to a running clip: progress, cancellation and the final result
#[derive(Debug)]
pub struct ClipHandle {
    output_path: PathBuf,
    state: watch::Receiver<ClipState>,
    progress: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    task: JoinHandle<ClipResult>,
}

impl ClipHandle {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> ClipState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_receiver(&self) -> watch::Receiver<ClipState> {
        self.state.clone()
    }

    /// Next progress event; None once the executor is done
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    /// Request cancellation. The result resolves to [`ExecError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal result
    pub async fn wait(self) -> ClipResult {
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => {
                warn!("Clip task ended abnormally: {}", join_error);
                Err(ExecError::Io(io::Error::other(join_error.to_string())))
            }
        }
    }
}
