// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{ExecError, PlanError};

/// Time offset relative to the start of a stream, with millisecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimeSpec {
    millis: u64,
}

impl TimeSpec {
    /// Create a new TimeSpec from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Create a new TimeSpec from seconds. Negative and non-finite values clamp to zero;
    /// use [`TimeSpec::try_from_seconds`] where they must be rejected.
    pub fn from_seconds(seconds: f64) -> Self {
        Self::try_from_seconds(seconds).unwrap_or_default()
    }

    /// Create a new TimeSpec from seconds, or None for negative and non-finite values
    pub fn try_from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        Some(Self {
            millis: (seconds * 1000.0).round() as u64,
        })
    }

    /// Create a new TimeSpec from hours, minutes, seconds, milliseconds
    pub fn from_components(hours: u32, minutes: u32, seconds: u32, milliseconds: u32) -> Self {
        let millis = hours as u64 * 3_600_000
            + minutes as u64 * 60_000
            + seconds as u64 * 1000
            + milliseconds as u64;
        Self { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_seconds(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    /// Parse a time string: seconds (`90.5`), `MM:SS[.ms]` or `HH:MM:SS[.ms]`
    pub fn parse(time_str: &str) -> Result<Self, String> {
        let trimmed = time_str.trim();
        if trimmed.is_empty() {
            return Err("Time cannot be empty".to_string());
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        let seconds_part = parse_seconds(parts[parts.len() - 1])?;

        match parts.len() {
            1 => Ok(Self::from_seconds(seconds_part)),
            2 => {
                let minutes = parse_unit(parts[0], "minutes")?;
                check_below_sixty(seconds_part)?;
                Ok(Self::from_seconds(minutes as f64 * 60.0 + seconds_part))
            }
            3 => {
                let hours = parse_unit(parts[0], "hours")?;
                let minutes = parse_unit(parts[1], "minutes")?;
                if minutes >= 60 {
                    return Err("Minutes must be less than 60".to_string());
                }
                check_below_sixty(seconds_part)?;
                Ok(Self::from_seconds(
                    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds_part,
                ))
            }
            _ => Err(format!(
                "Invalid time '{}'. Supported formats: seconds (e.g., 95.5), MM:SS.ms (e.g., 1:35.5), HH:MM:SS.ms (e.g., 0:01:35.5)",
                trimmed
            )),
        }
    }

    /// Format as HH:MM:SS.mmm, the form understood by both yt-dlp and ffmpeg
    pub fn format_hms(&self) -> String {
        let hours = self.millis / 3_600_000;
        let minutes = (self.millis % 3_600_000) / 60_000;
        let seconds = (self.millis % 60_000) / 1000;
        let milliseconds = self.millis % 1000;
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
    }
}

fn parse_seconds(part: &str) -> Result<f64, String> {
    let seconds = part
        .parse::<f64>()
        .map_err(|_| format!("Invalid seconds '{}'", part))?;
    if !seconds.is_finite() {
        return Err(format!("Invalid seconds '{}'", part));
    }
    if seconds < 0.0 {
        return Err("Time cannot be negative".to_string());
    }
    Ok(seconds)
}

fn parse_unit(part: &str, unit: &str) -> Result<u32, String> {
    part.parse::<u32>()
        .map_err(|_| format!("Invalid {} '{}'", unit, part))
}

fn check_below_sixty(seconds: f64) -> Result<(), String> {
    if seconds >= 60.0 {
        Err("Seconds must be less than 60".to_string())
    } else {
        Ok(())
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_hms())
    }
}

/// Half-open clip range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: TimeSpec,
    end: TimeSpec,
}

impl TimeRange {
    /// Create a range, rejecting empty and reversed ones
    pub fn new(start: TimeSpec, end: TimeSpec) -> Result<Self, PlanError> {
        if start >= end {
            return Err(PlanError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Create a range from raw seconds. Negative and non-finite bounds are rejected.
    pub fn from_seconds(start: f64, end: f64) -> Result<Self, PlanError> {
        match (TimeSpec::try_from_seconds(start), TimeSpec::try_from_seconds(end)) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(PlanError::InvalidRange {
                start: format!("{}s", start),
                end: format!("{}s", end),
            }),
        }
    }

    pub fn start(&self) -> TimeSpec {
        self.start
    }

    pub fn end(&self) -> TimeSpec {
        self.end
    }

    pub fn duration(&self) -> TimeSpec {
        TimeSpec::from_millis(self.end.as_millis() - self.start.as_millis())
    }

    /// Section argument for `yt-dlp --download-sections`
    pub fn to_section_arg(&self) -> String {
        format!("*{}-{}", self.start.format_hms(), self.end.format_hms())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Frame size of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a format contributes to a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Video and audio in one stream
    PreMerged,
    /// Video without an audio track
    VideoOnly,
    /// Audio without a video track
    AudioOnly,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormatKind::PreMerged => "Video+Audio",
            FormatKind::VideoOnly => "Video Only",
            FormatKind::AudioOnly => "Audio Only",
        };
        write!(f, "{}", label)
    }
}

/// One stream offered by the metadata service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub id: String,
    pub container: String,
    pub resolution: Option<Resolution>,
    pub codec_video: Option<String>,
    pub codec_audio: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    pub approx_size_bytes: Option<u64>,
    pub fps: Option<f64>,
    pub audio_bitrate_kbps: Option<f64>,
    pub note: Option<String>,
}

impl FormatEntry {
    pub fn new(
        id: impl Into<String>,
        container: impl Into<String>,
        has_video: bool,
        has_audio: bool,
    ) -> Self {
        Self {
            id: id.into(),
            container: container.into(),
            resolution: None,
            codec_video: None,
            codec_audio: None,
            has_video,
            has_audio,
            approx_size_bytes: None,
            fps: None,
            audio_bitrate_kbps: None,
            note: None,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution { width, height });
        self
    }

    pub fn with_codecs(mut self, video: Option<&str>, audio: Option<&str>) -> Self {
        self.codec_video = video.map(str::to_string);
        self.codec_audio = audio.map(str::to_string);
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.approx_size_bytes = Some(bytes);
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_audio_bitrate(mut self, kbps: f64) -> Self {
        self.audio_bitrate_kbps = Some(kbps);
        self
    }

    /// An entry must carry at least one of video or audio
    pub fn is_valid(&self) -> bool {
        self.has_video || self.has_audio
    }

    /// Classify the entry. Returns None for entries with neither track.
    pub fn kind(&self) -> Option<FormatKind> {
        match (self.has_video, self.has_audio) {
            (true, true) => Some(FormatKind::PreMerged),
            (true, false) => Some(FormatKind::VideoOnly),
            (false, true) => Some(FormatKind::AudioOnly),
            (false, false) => None,
        }
    }

    pub fn height(&self) -> Option<u32> {
        self.resolution.map(|r| r.height)
    }
}

/// Identity of one fetched catalog, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CatalogId(u64);

impl CatalogId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable list of formats available for one URL, best first
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    id: CatalogId,
    source_url: String,
    title: Option<String>,
    duration: Option<TimeSpec>,
    entries: Vec<FormatEntry>,
    best_audio: Option<String>,
}

impl Catalog {
    /// Build a catalog from entries ordered best first.
    ///
    /// Entries without video and audio are dropped, as are repeated ids (the
    /// first occurrence wins). The best audio stream is the first audio-only
    /// entry left in that order.
    pub fn new(
        source_url: impl Into<String>,
        title: Option<String>,
        duration: Option<TimeSpec>,
        entries: Vec<FormatEntry>,
    ) -> Self {
        let mut kept: Vec<FormatEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_valid() || entry.id.is_empty() {
                continue;
            }
            if kept.iter().any(|k| k.id == entry.id) {
                continue;
            }
            kept.push(entry);
        }

        let best_audio = kept
            .iter()
            .find(|e| e.kind() == Some(FormatKind::AudioOnly))
            .map(|e| e.id.clone());

        Self {
            id: CatalogId::next(),
            source_url: source_url.into(),
            title,
            duration,
            entries: kept,
            best_audio,
        }
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn duration(&self) -> Option<TimeSpec> {
        self.duration
    }

    pub fn entries(&self) -> &[FormatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, format_id: &str) -> Option<&FormatEntry> {
        self.entries.iter().find(|e| e.id == format_id)
    }

    /// Selector of the best audio-only stream, if any
    pub fn best_audio(&self) -> Option<&str> {
        self.best_audio.as_deref()
    }

    pub fn best_audio_entry(&self) -> Option<&FormatEntry> {
        self.best_audio.as_deref().and_then(|id| self.get(id))
    }
}

/// Container of the produced clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputContainer {
    /// Matroska, holds any codec combination
    #[default]
    Mkv,
    Mp4,
    Webm,
    /// Matroska audio, used for audio-only clips
    Mka,
}

impl OutputContainer {
    pub fn extension(self) -> &'static str {
        match self {
            OutputContainer::Mkv => "mkv",
            OutputContainer::Mp4 => "mp4",
            OutputContainer::Webm => "webm",
            OutputContainer::Mka => "mka",
        }
    }

    /// Parse a container name such as `mkv` or `.mp4`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_lowercase().as_str() {
            "mkv" | "matroska" => Some(OutputContainer::Mkv),
            "mp4" => Some(OutputContainer::Mp4),
            "webm" => Some(OutputContainer::Webm),
            "mka" => Some(OutputContainer::Mka),
            _ => None,
        }
    }

    /// Whether a video stream of this codec can be remuxed into the container
    pub fn accepts_video(self, codec: &str) -> bool {
        let family = codec_family(codec);
        match self {
            OutputContainer::Mkv => true,
            OutputContainer::Mp4 => matches!(family.as_str(), "avc1" | "avc3" | "h264" | "hev1" | "hvc1" | "hevc" | "av01" | "vp09"),
            OutputContainer::Webm => matches!(family.as_str(), "vp8" | "vp9" | "vp09" | "av01"),
            OutputContainer::Mka => false,
        }
    }

    /// Whether an audio stream of this codec can be remuxed into the container
    pub fn accepts_audio(self, codec: &str) -> bool {
        let family = codec_family(codec);
        match self {
            OutputContainer::Mkv | OutputContainer::Mka => true,
            OutputContainer::Mp4 => matches!(family.as_str(), "mp4a" | "aac" | "mp3" | "ac-3" | "ec-3" | "opus"),
            OutputContainer::Webm => matches!(family.as_str(), "opus" | "vorbis"),
        }
    }
}

impl fmt::Display for OutputContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// `avc1.640028` -> `avc1`, `VP9` -> `vp9`
fn codec_family(codec: &str) -> String {
    codec
        .split('.')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Stream layout chosen for a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanKind {
    /// One stream that already holds video and audio
    PreMerged,
    /// Video-only stream merged with the catalog's best audio
    PairedAudio,
    /// A single audio stream, no video
    AudioOnly,
}

/// Everything the executor needs to produce one clip
#[derive(Debug, Clone, Serialize)]
pub struct ClipPlan {
    pub catalog_id: CatalogId,
    pub source_url: String,
    pub selectors: Vec<String>,
    pub kind: PlanKind,
    pub range: TimeRange,
    pub container: OutputContainer,
    pub output_path: PathBuf,
}

impl ClipPlan {
    /// Selector string for `yt-dlp -f`, e.g. `137+140`
    pub fn format_spec(&self) -> String {
        self.selectors.join("+")
    }

    /// True when the executor has to merge two streams
    pub fn needs_merge(&self) -> bool {
        self.selectors.len() > 1
    }

    /// Point the plan at another file. The extension is forced to the plan's container.
    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output_path = path.as_ref().with_extension(self.container.extension());
        self
    }
}

/// A successfully written clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed: Duration,
}

/// Terminal outcome of executing a clip plan
pub type ClipResult = Result<ClipOutput, ExecError>;

/// Lifecycle of a single clip request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClipState {
    #[default]
    Idle,
    Planning,
    Executing,
    Succeeded,
    Failed,
    Cancelled,
}

impl ClipState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ClipState::Succeeded | ClipState::Failed | ClipState::Cancelled
        )
    }
}

impl fmt::Display for ClipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClipState::Idle => "idle",
            ClipState::Planning => "planning",
            ClipState::Executing => "executing",
            ClipState::Succeeded => "succeeded",
            ClipState::Failed => "failed",
            ClipState::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Progress notifications emitted while a clip runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Completion estimate, 0.0 - 100.0
    Percent(f32),
    /// A post-processing step started (merge, remux)
    Stage(String),
    /// Any other output line of the executor
    Line(String),
}

/// One row of the format picker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatListing {
    pub id: String,
    pub label: String,
    pub kind: FormatKind,
    pub approx_size_bytes: Option<u64>,
}
