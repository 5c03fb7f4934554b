//! Progress parsing for yt-dlp and ffmpeg output lines

use crate::domain::model::{ProgressEvent, TimeSpec};

/// Turns executor output lines into [`ProgressEvent`]s.
///
/// yt-dlp prints `[download]  42.0% of ...` while it fetches whole streams. With
/// `--download-sections` the cut is done by ffmpeg, which reports `time=HH:MM:SS.xx`
/// instead; those are scaled against the clip length. Percentages never go backwards.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    clip_length: TimeSpec,
    streams: usize,
    stream_index: usize,
    last_percent: f32,
}

impl ProgressParser {
    /// `streams` is the number of selectors downloaded one after another
    pub fn new(clip_length: TimeSpec, streams: usize) -> Self {
        Self {
            clip_length,
            streams: streams.max(1),
            stream_index: 0,
            last_percent: 0.0,
        }
    }

    /// Classify one output line
    pub fn parse_line(&mut self, line: &str) -> Option<ProgressEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.starts_with("[download] Destination:") {
            if self.last_percent > 0.0 {
                self.stream_index = (self.stream_index + 1).min(self.streams - 1);
            }
            return Some(ProgressEvent::Line(line.to_string()));
        }

        if let Some(stage) = parse_stage(line) {
            return Some(ProgressEvent::Stage(stage));
        }

        let stream_percent = parse_download_percent(line).or_else(|| {
            parse_ffmpeg_time(line).map(|elapsed| {
                let total = self.clip_length.as_millis().max(1) as f32;
                (elapsed.as_millis() as f32 / total * 100.0).min(100.0)
            })
        });

        match stream_percent {
            Some(pct) => {
                let overall =
                    (self.stream_index as f32 * 100.0 + pct) / self.streams as f32;
                if overall > self.last_percent {
                    self.last_percent = overall;
                    Some(ProgressEvent::Percent(overall))
                } else {
                    None
                }
            }
            None => Some(ProgressEvent::Line(line.to_string())),
        }
    }
}

/// `[download]  42.0% of ~ 10.00MiB at ...` -> 42.0
pub fn parse_download_percent(line: &str) -> Option<f32> {
    let rest = line.strip_prefix("[download]")?.trim_start();
    let token = rest.split_whitespace().next()?;
    let value = token.strip_suffix('%')?;
    let pct = value.parse::<f32>().ok()?;
    pct.is_finite().then_some(pct.clamp(0.0, 100.0))
}

/// ffmpeg status line `frame=... time=00:00:04.52 bitrate=...` -> 4.52s
pub fn parse_ffmpeg_time(line: &str) -> Option<TimeSpec> {
    let start = line.find("time=")? + "time=".len();
    let value = line[start..].split_whitespace().next()?;
    if value.starts_with('-') || value == "N/A" {
        return None;
    }
    TimeSpec::parse(value).ok()
}

fn parse_stage(line: &str) -> Option<String> {
    const STAGES: [(&str, &str); 4] = [
        ("[Merger]", "Merging audio and video"),
        ("[VideoRemuxer]", "Remuxing into output container"),
        ("[FixupM3u8]", "Fixing container"),
        ("[ExtractAudio]", "Extracting audio"),
    ];
    STAGES
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map(|(_, label)| label.to_string())
}
