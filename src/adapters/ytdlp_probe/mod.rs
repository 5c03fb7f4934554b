//! yt-dlp metadata adapter
//!
//! Runs `yt-dlp --dump-json` and turns its output into [`RawMetadata`].

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::engine::ToolCommand;
use crate::ports::*;

/// Metadata provider backed by the yt-dlp command line tool
#[derive(Debug, Clone)]
pub struct YtDlpMetadataAdapter {
    ytdlp: ToolCommand,
}

impl YtDlpMetadataAdapter {
    pub fn new(ytdlp: ToolCommand) -> Self {
        Self { ytdlp }
    }
}

impl Default for YtDlpMetadataAdapter {
    fn default() -> Self {
        Self::new(ToolCommand::new("yt-dlp", Vec::<String>::new()))
    }
}

#[async_trait]
impl MetadataProvider for YtDlpMetadataAdapter {
    async fn describe(&self, url: &str) -> Result<RawMetadata, FetchError> {
        info!("Fetching formats for {}", url);

        let mut command = self.ytdlp.command();
        command
            .args(["--dump-json", "--no-playlist", "--no-warnings", "--"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!("Executing command: {:?}", command.as_std());

        let output = command.output().await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::ServiceUnavailable(format!(
                "'{}' is not installed or not on PATH",
                self.ytdlp.program()
            )),
            _ => FetchError::ServiceUnavailable(format!("failed to run {}: {}", self.ytdlp, e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp exited with {}", output.status);
            return Err(classify_fetch_failure(&stderr));
        }

        let metadata = parse_metadata(&output.stdout)?;
        debug!(
            title = metadata.title.as_deref().unwrap_or("<untitled>"),
            formats = metadata.formats.len(),
            "Metadata received"
        );
        Ok(metadata)
    }
}

/// Parse `--dump-json` output. yt-dlp lists formats worst first; the result
/// is reordered best first.
pub fn parse_metadata(stdout: &[u8]) -> Result<RawMetadata, FetchError> {
    // Playlist-like pages print one object per line; only the first is used
    let text = String::from_utf8_lossy(stdout);
    let first = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| FetchError::ServiceUnavailable("yt-dlp printed no metadata".to_string()))?;

    let mut metadata: RawMetadata = serde_json::from_str(first).map_err(|e| {
        FetchError::ServiceUnavailable(format!("unreadable yt-dlp output: {}", e))
    })?;
    metadata.formats.reverse();
    Ok(metadata)
}

/// Map yt-dlp's diagnostic output to a [`FetchError`]
pub fn classify_fetch_failure(stderr: &str) -> FetchError {
    const URL_MARKERS: [&str; 6] = [
        "Unsupported URL",
        "is not a valid URL",
        "Incomplete YouTube ID",
        "Video unavailable",
        "Private video",
        "This video is unavailable",
    ];
    const NETWORK_MARKERS: [&str; 7] = [
        "Unable to download webpage",
        "getaddrinfo",
        "Name or service not known",
        "Temporary failure in name resolution",
        "timed out",
        "Connection refused",
        "Network is unreachable",
    ];

    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("yt-dlp failed without a diagnostic")
        .to_string();

    if URL_MARKERS.iter().any(|m| stderr.contains(m)) {
        FetchError::InvalidUrl(message)
    } else if NETWORK_MARKERS.iter().any(|m| stderr.contains(m)) {
        FetchError::NetworkUnreachable(message)
    } else {
        FetchError::ServiceUnavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{"title":"Demo","duration":212.5,"webpage_url":"https://www.youtube.com/watch?v=abc","formats":[
        {"format_id":"sb0","ext":"mhtml","vcodec":"none","acodec":"none","format_note":"storyboard"},
        {"format_id":"18","ext":"mp4","width":640,"height":360,"vcodec":"avc1.42001E","acodec":"mp4a.40.2","fps":30},
        {"format_id":"140","ext":"m4a","vcodec":"none","acodec":"mp4a.40.2","abr":129.5,"filesize":3400000},
        {"format_id":"137","ext":"mp4","width":1920,"height":1080,"vcodec":"avc1.640028","acodec":"none","fps":30,"filesize_approx":52000000}
    ]}"#;

    #[test]
    fn test_parse_metadata_reverses_formats() {
        let metadata = parse_metadata(DUMP.replace('\n', "").as_bytes()).unwrap();
        let ids: Vec<&str> = metadata.formats.iter().map(|f| f.format_id.as_str()).collect();

        assert_eq!(metadata.title.as_deref(), Some("Demo"));
        assert_eq!(metadata.duration, Some(212.5));
        assert_eq!(ids, vec!["137", "140", "18", "sb0"]);
        assert_eq!(metadata.formats[0].filesize_approx, Some(52_000_000));
        assert_eq!(metadata.formats[1].abr, Some(129.5));
    }

    #[test]
    fn test_parse_metadata_rejects_garbage() {
        assert!(matches!(
            parse_metadata(b"not json"),
            Err(FetchError::ServiceUnavailable(_))
        ));
        assert!(matches!(
            parse_metadata(b""),
            Err(FetchError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_classify_invalid_url() {
        let err = classify_fetch_failure("ERROR: Unsupported URL: https://example.com/\n");
        assert_eq!(
            err,
            FetchError::InvalidUrl("ERROR: Unsupported URL: https://example.com/".to_string())
        );
    }

    #[test]
    fn test_classify_network_failure() {
        let stderr = "WARNING: retrying\nERROR: [youtube] abc: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>";
        assert!(matches!(
            classify_fetch_failure(stderr),
            FetchError::NetworkUnreachable(_)
        ));
    }

    #[test]
    fn test_classify_unknown_failure() {
        assert!(matches!(
            classify_fetch_failure("Traceback (most recent call last):\nKeyError: 'formats'"),
            FetchError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_fetch_failure(""),
            FetchError::ServiceUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_service_unavailable() {
        let adapter =
            YtDlpMetadataAdapter::new(ToolCommand::new("ytclip-missing-yt-dlp", Vec::<String>::new()));
        let err = adapter.describe("https://www.youtube.com/watch?v=abc").await.unwrap_err();
        assert!(matches!(err, FetchError::ServiceUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_describe_runs_tool_and_parses_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp.sh");
        std::fs::write(
            &script,
            format!("cat <<'JSON'\n{}\nJSON\n", DUMP.replace('\n', "")),
        )
        .unwrap();

        let adapter = YtDlpMetadataAdapter::new(ToolCommand::new(
            "sh",
            [script.to_string_lossy().to_string()],
        ));
        let metadata = adapter.describe("https://www.youtube.com/watch?v=abc").await.unwrap();
        assert_eq!(metadata.formats.len(), 4);
        assert_eq!(metadata.formats[0].format_id, "137");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_describe_classifies_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp.sh");
        std::fs::write(
            &script,
            "echo 'ERROR: [generic] Unable to download webpage: timed out' >&2\nexit 1\n",
        )
        .unwrap();

        let adapter = YtDlpMetadataAdapter::new(ToolCommand::new(
            "sh",
            [script.to_string_lossy().to_string()],
        ));
        let err = adapter.describe("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, FetchError::NetworkUnreachable(_)));
    }
}
