// Catalog interactor - Resolves a URL into a format catalog

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::FormatLister;
use crate::ports::*;

/// Interactor for the format lookup use case
pub struct FormatCatalog {
    provider: Arc<dyn MetadataProvider>,
}

impl FormatCatalog {
    /// Create new catalog interactor with an injected metadata provider
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Query the metadata service and build a catalog for `url`
    pub async fn fetch(&self, url: &str) -> Result<Catalog, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let metadata = self.provider.describe(url).await?;
        let raw_count = metadata.formats.len();

        let entries: Vec<FormatEntry> = metadata.formats.iter().map(normalize_format).collect();
        // The service's canonical page URL survives redirects and short links
        let source_url = metadata
            .webpage_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(url);
        let catalog = Catalog::new(
            source_url,
            metadata.title,
            metadata.duration.map(TimeSpec::from_seconds),
            entries,
        );

        if catalog.is_empty() {
            warn!("No usable formats among {} listed for {}", raw_count, url);
            return Err(FetchError::NoFormatsAvailable);
        }

        debug!(
            "Kept {} of {} formats, best audio: {}",
            catalog.len(),
            raw_count,
            catalog.best_audio().unwrap_or("none")
        );
        info!(
            title = catalog.title().unwrap_or("<untitled>"),
            formats = catalog.len(),
            "Format catalog ready"
        );
        Ok(catalog)
    }

    /// Display rows for the format picker
    pub fn list_formats(&self, catalog: &Catalog) -> Vec<FormatListing> {
        FormatLister::list(catalog)
    }
}

/// Map a service format to a catalog entry.
///
/// A track counts as present unless the service reports its codec as `none`.
fn normalize_format(raw: &RawFormat) -> FormatEntry {
    let codec = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "none")
            .map(str::to_string)
    };
    let has_video = raw.vcodec.as_deref().map(str::trim) != Some("none");
    let has_audio = raw.acodec.as_deref().map(str::trim) != Some("none");

    let mut entry = FormatEntry::new(
        raw.format_id.trim(),
        raw.ext.clone().unwrap_or_else(|| "unknown".to_string()),
        has_video,
        has_audio,
    );
    entry.codec_video = codec(&raw.vcodec);
    entry.codec_audio = codec(&raw.acodec);
    entry.approx_size_bytes = raw.filesize.or(raw.filesize_approx);
    entry.fps = raw.fps.filter(|fps| *fps > 0.0);
    entry.audio_bitrate_kbps = raw.abr.filter(|abr| *abr > 0.0);
    entry.note = raw.format_note.clone();

    if let (Some(width), Some(height)) = (raw.width, raw.height) {
        entry = entry.with_resolution(width, height);
    }
    entry
}
