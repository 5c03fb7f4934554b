//! Output path helpers

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::domain::model::{OutputContainer, TimeRange, TimeSpec};

/// Characters that are rejected by at least one common filesystem
const FORBIDDEN_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Turn a video title into something usable as a file stem
pub fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches('.').trim();

    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<title>_clip_<start>_<end>.<ext>`
pub fn default_clip_file_name(
    title: Option<&str>,
    range: &TimeRange,
    container: OutputContainer,
) -> String {
    let stem = sanitize_file_stem(title.unwrap_or("video"));
    format!(
        "{}_clip_{}_{}.{}",
        stem,
        format_time_short(range.start()),
        format_time_short(range.end()),
        container.extension()
    )
}

/// Format time as short string for filename
pub fn format_time_short(time: TimeSpec) -> String {
    let millis = time.as_millis();
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    let ms = millis % 1000;

    if hours > 0 {
        format!("{:02}h{:02}m{:02}s{:03}ms", hours, minutes, secs, ms)
    } else if minutes > 0 {
        format!("{:02}m{:02}s{:03}ms", minutes, secs, ms)
    } else {
        format!("{:02}s{:03}ms", secs, ms)
    }
}

/// Absolute, lexically normalized form of a path that may not exist yet
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_forbidden_characters() {
        assert_eq!(sanitize_file_stem("AC/DC: Live? <2024>"), "ACDC Live 2024");
        assert_eq!(sanitize_file_stem("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_sanitize_falls_back_for_empty_titles() {
        assert_eq!(sanitize_file_stem("???"), "video");
        assert_eq!(sanitize_file_stem(".."), "video");
    }

    #[test]
    fn test_format_time_short() {
        assert_eq!(format_time_short(TimeSpec::from_millis(5_250)), "05s250ms");
        assert_eq!(format_time_short(TimeSpec::from_seconds(95.0)), "01m35s000ms");
        assert_eq!(
            format_time_short(TimeSpec::from_seconds(3725.0)),
            "01h02m05s000ms"
        );
    }

    #[test]
    fn test_default_clip_file_name_without_title() {
        let range = TimeRange::from_seconds(0.0, 1.5).unwrap();
        assert_eq!(
            default_clip_file_name(None, &range, OutputContainer::Mka),
            "video_clip_00s000ms_01s500ms.mka"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_path_normalizes_dots() {
        let path = absolute_path(Path::new("/tmp/a/./b/../c.mkv")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/a/c.mkv"));
    }
}
