//! yt-dlp clip executor
//!
//! Downloads only the requested section with `--download-sections`; yt-dlp hands
//! the cut, merge and remux to ffmpeg. Output is staged next to the target and
//! renamed into place on success.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::{run_supervised, ProgressParser, Supervised, ToolCommand};
use crate::output::{OverwritePolicy, StagedOutput};
use crate::ports::*;

const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Install instructions for the external tools
pub fn install_hint(program: &str) -> &'static str {
    if program.contains("ffmpeg") {
        "Install ffmpeg from https://ffmpeg.org/download.html or your package manager (e.g. `apt install ffmpeg`, `brew install ffmpeg`)."
    } else {
        "Install yt-dlp with `pip install -U yt-dlp` or from https://github.com/yt-dlp/yt-dlp#installation."
    }
}

/// Clip executor driving yt-dlp (and through it, ffmpeg)
#[derive(Debug, Clone)]
pub struct YtDlpExecutor {
    ytdlp: ToolCommand,
    ffmpeg: ToolCommand,
    force_keyframes_at_cuts: bool,
    overwrite: OverwritePolicy,
}

impl YtDlpExecutor {
    pub fn new(ytdlp: ToolCommand, ffmpeg: ToolCommand) -> Self {
        Self {
            ytdlp,
            ffmpeg,
            force_keyframes_at_cuts: true,
            overwrite: OverwritePolicy::Never,
        }
    }

    /// Re-encode around the cut points so the clip starts exactly at `start`
    pub fn with_keyframe_cuts(mut self, enabled: bool) -> Self {
        self.force_keyframes_at_cuts = enabled;
        self
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Full yt-dlp argument list for `plan`, writing to `template`
    pub fn build_args(&self, plan: &ClipPlan, template: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-part".into(),
            "-f".into(),
            plan.format_spec(),
            "--download-sections".into(),
            plan.range.to_section_arg(),
        ];

        if self.force_keyframes_at_cuts {
            args.push("--force-keyframes-at-cuts".into());
        }

        if plan.needs_merge() {
            args.push("--merge-output-format".into());
        } else {
            args.push("--remux-video".into());
        }
        args.push(plan.container.extension().into());

        if self.ffmpeg.program() != DEFAULT_FFMPEG {
            args.push("--ffmpeg-location".into());
            args.push(self.ffmpeg.program().into());
        }

        args.push("-o".into());
        args.push(template.to_string_lossy().to_string());
        args.push("--".into());
        args.push(plan.source_url.clone());
        args
    }

    fn spawn_error(tool: &ToolCommand, error: io::Error) -> ExecError {
        if error.kind() == io::ErrorKind::NotFound {
            ExecError::ExecutorNotFound {
                program: tool.program().to_string(),
            }
        } else {
            ExecError::Io(error)
        }
    }

    async fn tool_version(tool: &ToolCommand, flag: &str) -> Result<ToolVersion, ExecError> {
        let mut command = tool.command();
        command
            .arg(flag)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = command
            .output()
            .await
            .map_err(|e| Self::spawn_error(tool, e))?;

        if !output.status.success() {
            warn!("{} {} exited with {}", tool, flag, output.status);
            return Err(ExecError::ExecutionFailed(ExitInfo {
                code: output.status.code(),
                stderr_tail: String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .map(str::to_string)
                    .collect(),
            }));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(ToolVersion {
            name: tool.to_string(),
            version,
        })
    }
}

impl Default for YtDlpExecutor {
    fn default() -> Self {
        Self::new(
            ToolCommand::new("yt-dlp", Vec::<String>::new()),
            ToolCommand::new(DEFAULT_FFMPEG, Vec::<String>::new()),
        )
    }
}

#[async_trait]
impl ClipExecutor for YtDlpExecutor {
    async fn execute(
        &self,
        plan: &ClipPlan,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ExecError> {
        info!(
            format = %plan.format_spec(),
            range = %plan.range,
            output = %plan.output_path.display(),
            "Starting clip"
        );

        let staged = StagedOutput::create(&plan.output_path)?;
        let mut command = self.ytdlp.command();
        command.args(self.build_args(plan, &staged.template()));

        let mut parser = ProgressParser::new(plan.range.duration(), plan.selectors.len());
        let outcome = run_supervised(command, &cancel, |line| {
            if let Some(event) = parser.parse_line(line) {
                // The receiver may be gone; the clip keeps running regardless
                let _ = progress.send(event);
            }
        })
        .await
        .map_err(|e| Self::spawn_error(&self.ytdlp, e))?;

        match outcome {
            Supervised::Cancelled => {
                info!("Clip cancelled, discarding {}", staged.dir().display());
                Err(ExecError::Cancelled)
            }
            Supervised::Exited { status, .. } if status.success() => {
                let _ = progress.send(ProgressEvent::Percent(100.0));
                staged.commit(self.overwrite)
            }
            Supervised::Exited {
                status,
                stderr_tail,
            } => {
                let info = ExitInfo {
                    code: status.code(),
                    stderr_tail,
                };
                warn!("yt-dlp failed: {}", info);
                Err(ExecError::ExecutionFailed(info))
            }
        }
    }

    async fn check_dependencies(&self) -> Result<Vec<ToolVersion>, ExecError> {
        let ytdlp = Self::tool_version(&self.ytdlp, "--version").await?;
        debug!("Found {} {}", ytdlp.name, ytdlp.version);
        let ffmpeg = Self::tool_version(&self.ffmpeg, "-version").await?;
        debug!("Found {}", ffmpeg.version);
        Ok(vec![ytdlp, ffmpeg])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::{ClipPlanner, PlannerSettings};

    fn catalog() -> Catalog {
        Catalog::new(
            "https://www.youtube.com/watch?v=abc",
            Some("Demo".to_string()),
            None,
            vec![
                FormatEntry::new("137", "mp4", true, false).with_codecs(Some("avc1.640028"), None),
                FormatEntry::new("140", "m4a", false, true).with_codecs(None, Some("mp4a.40.2")),
                FormatEntry::new("18", "mp4", true, true)
                    .with_codecs(Some("avc1.42001E"), Some("mp4a.40.2")),
            ],
        )
    }

    fn plan_in(dir: &Path, format_id: &str) -> ClipPlan {
        let planner = ClipPlanner::new(PlannerSettings {
            output_dir: dir.to_path_buf(),
            ..PlannerSettings::default()
        });
        planner
            .plan(&catalog(), format_id, TimeRange::from_seconds(10.0, 20.0).unwrap())
            .unwrap()
    }

    #[test]
    fn test_build_args_for_paired_audio() {
        let plan = plan_in(Path::new("/tmp"), "137");
        let args = YtDlpExecutor::default().build_args(&plan, Path::new("/tmp/.stage/clip.%(ext)s"));

        let expected: Vec<String> = [
            "--newline",
            "--no-playlist",
            "--no-part",
            "-f",
            "137+140",
            "--download-sections",
            "*00:00:10.000-00:00:20.000",
            "--force-keyframes-at-cuts",
            "--merge-output-format",
            "mkv",
            "-o",
            "/tmp/.stage/clip.%(ext)s",
            "--",
            "https://www.youtube.com/watch?v=abc",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_build_args_single_stream_remuxes() {
        let plan = plan_in(Path::new("/tmp"), "140");
        let executor = YtDlpExecutor::new(
            ToolCommand::new("yt-dlp", Vec::<String>::new()),
            ToolCommand::new("/opt/ffmpeg/bin/ffmpeg", Vec::<String>::new()),
        )
        .with_keyframe_cuts(false);
        let args = executor.build_args(&plan, Path::new("t"));

        assert!(!args.contains(&"--force-keyframes-at-cuts".to_string()));
        let remux = args.iter().position(|a| a == "--remux-video").unwrap();
        assert_eq!(args[remux + 1], "mka");
        let location = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[location + 1], "/opt/ffmpeg/bin/ffmpeg");
    }

    #[tokio::test]
    async fn test_missing_ytdlp_is_executor_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let executor = YtDlpExecutor::new(
            ToolCommand::new("ytclip-no-such-yt-dlp", Vec::<String>::new()),
            ToolCommand::new(DEFAULT_FFMPEG, Vec::<String>::new()),
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let err = executor
            .execute(&plan_in(dir.path(), "18"), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::ExecutorNotFound { ref program } if program == "ytclip-no-such-yt-dlp"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    mod fake_tool {
        use super::*;
        use std::time::Duration;
        use tokio::sync::mpsc;

        const WRITES_CLIP: &str = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
echo "[download] Destination: clip"
echo "[download]  50.0% of 1.00MiB"
echo "[download] 100.0% of 1.00MiB"
file=$(printf '%s' "$out" | sed 's/%(ext)s/mkv/')
printf 'clip-bytes' > "$file"
"#;

        fn executor_with(dir: &Path, script: &str) -> YtDlpExecutor {
            let path = dir.join("fake-yt-dlp.sh");
            std::fs::write(&path, script).unwrap();
            YtDlpExecutor::new(
                ToolCommand::new("sh", [path.to_string_lossy().to_string()]),
                ToolCommand::new(DEFAULT_FFMPEG, Vec::<String>::new()),
            )
        }

        fn leftovers(dir: &Path) -> Vec<String> {
            std::fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .filter(|name| name.starts_with(".ytclip-"))
                .collect()
        }

        #[tokio::test]
        async fn test_success_renames_into_place() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let executor = executor_with(tools.path(), WRITES_CLIP);
            let plan = plan_in(out.path(), "18");
            let (tx, mut rx) = mpsc::unbounded_channel();

            let written = executor
                .execute(&plan, tx, CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(written, plan.output_path);
            assert_eq!(std::fs::read(&written).unwrap(), b"clip-bytes");
            assert!(leftovers(out.path()).is_empty());

            let mut percents = Vec::new();
            while let Ok(event) = rx.try_recv() {
                if let ProgressEvent::Percent(p) = event {
                    percents.push(p);
                }
            }
            assert_eq!(percents.last(), Some(&100.0));
        }

        #[tokio::test]
        async fn test_failure_reports_stderr_tail() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let executor = executor_with(
                tools.path(),
                "echo 'ERROR: [youtube] abc: Requested format is not available' >&2\nexit 1\n",
            );
            let plan = plan_in(out.path(), "18");
            let (tx, _rx) = mpsc::unbounded_channel();

            let err = executor
                .execute(&plan, tx, CancellationToken::new())
                .await
                .unwrap_err();

            match err {
                ExecError::ExecutionFailed(info) => {
                    assert_eq!(info.code, Some(1));
                    assert!(info.last_line().unwrap().contains("Requested format"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(!plan.output_path.exists());
            assert!(leftovers(out.path()).is_empty());
        }

        #[tokio::test]
        async fn test_cancel_leaves_nothing_behind() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            // ffmpeg runs as a child of yt-dlp during section downloads
            let executor = executor_with(
                tools.path(),
                "echo started\nsleep 30 > /dev/null &\nwait\n",
            );
            let plan = plan_in(out.path(), "137");
            let (tx, _rx) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                trigger.cancel();
            });

            let err = tokio::time::timeout(
                Duration::from_secs(10),
                executor.execute(&plan, tx, cancel),
            )
            .await
            .expect("cancellation should stop the executor")
            .unwrap_err();

            assert!(matches!(err, ExecError::Cancelled));
            assert!(!plan.output_path.exists());
            assert!(leftovers(out.path()).is_empty());
        }

        #[tokio::test]
        async fn test_check_dependencies_reports_versions() {
            let tools = tempfile::tempdir().unwrap();
            let ytdlp = tools.path().join("yt.sh");
            let ffmpeg = tools.path().join("ff.sh");
            std::fs::write(&ytdlp, "echo 2024.08.06\n").unwrap();
            std::fs::write(&ffmpeg, "echo 'ffmpeg version 6.1 Copyright'\n").unwrap();

            let executor = YtDlpExecutor::new(
                ToolCommand::new("sh", [ytdlp.to_string_lossy().to_string()]),
                ToolCommand::new("sh", [ffmpeg.to_string_lossy().to_string()]),
            );
            let versions = executor.check_dependencies().await.unwrap();
            assert_eq!(versions[0].version, "2024.08.06");
            assert_eq!(versions[1].version, "ffmpeg version 6.1 Copyright");
        }
    }
}
