// Domain rules - Clip planning and format presentation policies

use std::path::PathBuf;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::utils::path::default_clip_file_name;

/// Settings that shape every plan produced by a [`ClipPlanner`]
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    /// Container tried first for clips with video
    pub preferred_container: OutputContainer,
    /// Directory used when the caller does not pick an output path
    pub output_dir: PathBuf,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            preferred_container: OutputContainer::Mkv,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Turns a format selection and a time range into a [`ClipPlan`]
#[derive(Debug, Clone, Default)]
pub struct ClipPlanner {
    settings: PlannerSettings,
}

impl ClipPlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    /// Build a plan for an already validated range, pairing video-only formats
    /// with the catalog's best audio stream
    pub fn plan(
        &self,
        catalog: &Catalog,
        format_id: &str,
        range: TimeRange,
    ) -> Result<ClipPlan, PlanError> {
        self.plan_with_audio(catalog, format_id, None, range)
    }

    /// Like [`ClipPlanner::plan`], with an explicit audio-only stream for a
    /// video-only format. `None` pairs the best audio stream.
    pub fn plan_with_audio(
        &self,
        catalog: &Catalog,
        format_id: &str,
        audio_id: Option<&str>,
        range: TimeRange,
    ) -> Result<ClipPlan, PlanError> {
        let entry = catalog
            .get(format_id)
            .ok_or_else(|| PlanError::UnknownFormat(format_id.to_string()))?;
        let audio_override = audio_id
            .map(|id| Self::audio_stream(catalog, id))
            .transpose()?;
        if audio_override.is_some() && entry.kind() != Some(FormatKind::VideoOnly) {
            return Err(PlanError::AudioNotPairable {
                format_id: entry.id.clone(),
            });
        }

        let (kind, selectors, container) = match entry.kind() {
            Some(FormatKind::PreMerged) => {
                let container = self.pick_container(&[entry]);
                (PlanKind::PreMerged, vec![entry.id.clone()], container)
            }
            Some(FormatKind::VideoOnly) => {
                let audio = match audio_override {
                    Some(audio) => audio,
                    None => catalog.best_audio_entry().ok_or_else(|| {
                        PlanError::NoAudioAvailable {
                            format_id: entry.id.clone(),
                        }
                    })?,
                };
                let container = self.pick_container(&[entry, audio]);
                (
                    PlanKind::PairedAudio,
                    vec![entry.id.clone(), audio.id.clone()],
                    container,
                )
            }
            Some(FormatKind::AudioOnly) => (
                PlanKind::AudioOnly,
                vec![entry.id.clone()],
                OutputContainer::Mka,
            ),
            // Catalog construction drops these, so an id can never resolve to one
            None => return Err(PlanError::UnknownFormat(format_id.to_string())),
        };

        let file_name = default_clip_file_name(catalog.title(), &range, container);

        Ok(ClipPlan {
            catalog_id: catalog.id(),
            source_url: catalog.source_url().to_string(),
            selectors,
            kind,
            range,
            container,
            output_path: self.settings.output_dir.join(file_name),
        })
    }

    /// Build a plan from raw bounds. The format is resolved before the range is checked.
    pub fn plan_between(
        &self,
        catalog: &Catalog,
        format_id: &str,
        start: TimeSpec,
        end: TimeSpec,
    ) -> Result<ClipPlan, PlanError> {
        self.plan_between_with_audio(catalog, format_id, None, start, end)
    }

    pub fn plan_between_with_audio(
        &self,
        catalog: &Catalog,
        format_id: &str,
        audio_id: Option<&str>,
        start: TimeSpec,
        end: TimeSpec,
    ) -> Result<ClipPlan, PlanError> {
        if catalog.get(format_id).is_none() {
            return Err(PlanError::UnknownFormat(format_id.to_string()));
        }
        let range = TimeRange::new(start, end)?;
        self.plan_with_audio(catalog, format_id, audio_id, range)
    }

    fn audio_stream<'a>(catalog: &'a Catalog, audio_id: &str) -> Result<&'a FormatEntry, PlanError> {
        let audio = catalog
            .get(audio_id)
            .ok_or_else(|| PlanError::UnknownFormat(audio_id.to_string()))?;
        if audio.kind() != Some(FormatKind::AudioOnly) {
            return Err(PlanError::NotAudioOnly(audio.id.clone()));
        }
        Ok(audio)
    }

    /// Keep the preferred container when every selected stream can be remuxed
    /// into it, otherwise fall back to Matroska, which takes any codec pair.
    /// Streams with an unknown codec also force the fallback.
    fn pick_container(&self, streams: &[&FormatEntry]) -> OutputContainer {
        let preferred = self.settings.preferred_container;
        if preferred == OutputContainer::Mkv {
            return preferred;
        }

        let compatible = streams.iter().all(|stream| {
            let video_ok = !stream.has_video
                || stream
                    .codec_video
                    .as_deref()
                    .is_some_and(|c| preferred.accepts_video(c));
            let audio_ok = !stream.has_audio
                || stream
                    .codec_audio
                    .as_deref()
                    .is_some_and(|c| preferred.accepts_audio(c));
            video_ok && audio_ok
        });

        if compatible {
            preferred
        } else {
            tracing::debug!(
                preferred = %preferred,
                "Selected codecs cannot be remuxed into the preferred container, using mkv"
            );
            OutputContainer::Mkv
        }
    }
}

/// Presentation rules for the format picker
pub struct FormatLister;

impl FormatLister {
    /// Video-capable formats first, tallest first; then audio-only formats,
    /// highest bitrate first. Ties keep catalog order.
    pub fn list(catalog: &Catalog) -> Vec<FormatListing> {
        let mut video: Vec<&FormatEntry> =
            catalog.entries().iter().filter(|e| e.has_video).collect();
        let mut audio: Vec<&FormatEntry> = catalog
            .entries()
            .iter()
            .filter(|e| e.kind() == Some(FormatKind::AudioOnly))
            .collect();

        video.sort_by(|a, b| b.height().unwrap_or(0).cmp(&a.height().unwrap_or(0)));
        audio.sort_by(|a, b| {
            let a = a.audio_bitrate_kbps.unwrap_or(0.0);
            let b = b.audio_bitrate_kbps.unwrap_or(0.0);
            b.total_cmp(&a)
        });

        video
            .into_iter()
            .chain(audio)
            .filter_map(|entry| {
                entry.kind().map(|kind| FormatListing {
                    id: entry.id.clone(),
                    label: Self::label(entry),
                    kind,
                    approx_size_bytes: entry.approx_size_bytes,
                })
            })
            .collect()
    }

    /// `1080p (30fps, mp4) (Video Only)` or `129k (opus, webm)`
    pub fn label(entry: &FormatEntry) -> String {
        match entry.kind() {
            Some(FormatKind::AudioOnly) => {
                let bitrate = entry
                    .audio_bitrate_kbps
                    .map(|abr| format!("{}k", abr.round() as u64))
                    .unwrap_or_else(|| "?k".to_string());
                let codec = entry.codec_audio.as_deref().unwrap_or("unknown");
                format!("{} ({}, {})", bitrate, codec, entry.container)
            }
            Some(kind) => {
                let height = entry
                    .height()
                    .map(|h| format!("{}p", h))
                    .or_else(|| entry.note.clone())
                    .unwrap_or_else(|| format!("format {}", entry.id));
                let fps = entry
                    .fps
                    .map(|fps| format!("{}fps", fps.round() as u64))
                    .unwrap_or_else(|| "N/A fps".to_string());
                format!("{} ({}, {}) ({})", height, fps, entry.container, kind)
            }
            None => format!("format {}", entry.id),
        }
    }
}

#[cfg(test)]
mod tests;
