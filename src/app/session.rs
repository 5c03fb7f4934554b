// Clip session - Catalog ownership and request lifecycle for one user

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::catalog_interactor::FormatCatalog;
use crate::app::clip_interactor::{ClipHandle, ClipInteractor};
use crate::domain::errors::*;
use crate::domain::model::*;

struct ActiveClip {
    cancel: CancellationToken,
    state: watch::Receiver<ClipState>,
}

impl ActiveClip {
    fn state(&self) -> ClipState {
        *self.state.borrow()
    }
}

/// State of one interactive session: the current catalog and the clips started from it.
///
/// Fetching a new URL replaces the catalog, cancels clips still running and turns
/// plans built from the old catalog stale.
pub struct ClipSession {
    catalogs: FormatCatalog,
    clips: ClipInteractor,
    catalog: Option<Arc<Catalog>>,
    active: Vec<ActiveClip>,
    /// State of a request that has not reached execution
    pending: Option<ClipState>,
}

impl ClipSession {
    pub fn new(catalogs: FormatCatalog, clips: ClipInteractor) -> Self {
        Self {
            catalogs,
            clips,
            catalog: None,
            active: Vec::new(),
            pending: None,
        }
    }

    /// Load the formats of `url`. Any failure leaves the session without a catalog.
    pub async fn fetch_formats(&mut self, url: &str) -> Result<Arc<Catalog>, FetchError> {
        self.cancel_running();

        match self.catalogs.fetch(url).await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                self.catalog = Some(Arc::clone(&catalog));
                Ok(catalog)
            }
            Err(e) => {
                self.catalog = None;
                Err(e)
            }
        }
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.clone()
    }

    pub fn list_formats(&self) -> Result<Vec<FormatListing>, PlanError> {
        let catalog = self.catalog.as_ref().ok_or(PlanError::NoCatalog)?;
        Ok(self.catalogs.list_formats(catalog))
    }

    /// Plan a clip against the current catalog
    pub fn plan(
        &mut self,
        format_id: &str,
        start: TimeSpec,
        end: TimeSpec,
    ) -> Result<ClipPlan, PlanError> {
        self.plan_with_audio(format_id, None, start, end)
    }

    /// Plan a clip, pairing a video-only format with `audio_id` instead of the best audio
    pub fn plan_with_audio(
        &mut self,
        format_id: &str,
        audio_id: Option<&str>,
        start: TimeSpec,
        end: TimeSpec,
    ) -> Result<ClipPlan, PlanError> {
        self.pending = Some(ClipState::Planning);
        let planned = match self.catalog.as_ref() {
            Some(catalog) => self
                .clips
                .planner()
                .plan_between_with_audio(catalog, format_id, audio_id, start, end),
            None => Err(PlanError::NoCatalog),
        };
        if planned.is_err() {
            self.pending = Some(ClipState::Failed);
        }
        planned
    }

    /// Start a planned clip. Plans from a replaced catalog are rejected.
    pub fn request_clip(&mut self, plan: ClipPlan) -> Result<ClipHandle, ClipError> {
        let started = self.start_current(plan);
        match &started {
            Ok(handle) => {
                self.pending = None;
                self.active.retain(|clip| !clip.state().is_terminal());
                self.active.push(ActiveClip {
                    cancel: handle.cancellation(),
                    state: handle.state_receiver(),
                });
            }
            Err(_) => self.pending = Some(ClipState::Failed),
        }
        started
    }

    fn start_current(&self, plan: ClipPlan) -> Result<ClipHandle, ClipError> {
        let catalog = self.catalog.as_ref().ok_or(PlanError::NoCatalog)?;
        if plan.catalog_id != catalog.id() {
            return Err(PlanError::StaleCatalog.into());
        }
        self.clips.start(plan)
    }

    /// State of the most recent clip request
    pub fn state(&self) -> ClipState {
        if let Some(state) = self.pending {
            return state;
        }
        self.active
            .last()
            .map(ActiveClip::state)
            .unwrap_or_default()
    }

    /// Cancel every clip of this session that is still running
    pub fn cancel_running(&mut self) {
        for clip in &self.active {
            if !clip.state().is_terminal() {
                info!("Cancelling in-flight clip");
                clip.cancel.cancel();
            }
        }
    }
}

impl Drop for ClipSession {
    fn drop(&mut self) {
        self.cancel_running();
    }
}
