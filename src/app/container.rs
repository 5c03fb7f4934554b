use std::sync::Arc;

use crate::adapters::{ClipperConfig, ConfigError, YtDlpExecutor, YtDlpMetadataAdapter};
use crate::app::{ClipInteractor, ClipSession, FormatCatalog};
use crate::domain::rules::{ClipPlanner, PlannerSettings};
use crate::output::OverwritePolicy;
use crate::ports::{ClipExecutor, MetadataProvider};

/// Wires adapters into interactors
pub struct AppContainer {
    provider: Arc<dyn MetadataProvider>,
    executor: Arc<dyn ClipExecutor>,
    settings: PlannerSettings,
    overwrite: OverwritePolicy,
}

impl AppContainer {
    /// Real yt-dlp adapters configured from `config`
    pub fn from_config(config: &ClipperConfig) -> Result<Self, ConfigError> {
        let ytdlp = config.ytdlp_command()?;
        let ffmpeg = config.ffmpeg_command()?;
        let overwrite = OverwritePolicy::from_flag(config.overwrite);

        let provider = Arc::new(YtDlpMetadataAdapter::new(ytdlp.clone()));
        let executor = Arc::new(
            YtDlpExecutor::new(ytdlp, ffmpeg)
                .with_keyframe_cuts(config.force_keyframes_at_cuts)
                .with_overwrite(overwrite),
        );

        Ok(Self::with_adapters(
            provider,
            executor,
            PlannerSettings {
                preferred_container: config.container,
                output_dir: config.output_dir.clone(),
            },
            overwrite,
        ))
    }

    pub fn with_adapters(
        provider: Arc<dyn MetadataProvider>,
        executor: Arc<dyn ClipExecutor>,
        settings: PlannerSettings,
        overwrite: OverwritePolicy,
    ) -> Self {
        Self {
            provider,
            executor,
            settings,
            overwrite,
        }
    }

    pub fn format_catalog(&self) -> FormatCatalog {
        FormatCatalog::new(Arc::clone(&self.provider))
    }

    pub fn clip_interactor(&self) -> ClipInteractor {
        ClipInteractor::new(
            ClipPlanner::new(self.settings.clone()),
            Arc::clone(&self.executor),
            self.overwrite,
        )
    }

    pub fn session(&self) -> ClipSession {
        ClipSession::new(self.format_catalog(), self.clip_interactor())
    }
}
