//! Supervision of external tool processes

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Number of stderr lines kept for error reports
pub const STDERR_TAIL_LINES: usize = 20;

/// An external program plus the arguments that always precede the ones we add,
/// e.g. `python3 -m yt_dlp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace. Returns None for a blank string.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fresh tokio command with the leading arguments applied
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args);
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.leading_args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a supervised process ended
#[derive(Debug)]
pub enum Supervised {
    /// The process exited on its own
    Exited {
        status: ExitStatus,
        stderr_tail: Vec<String>,
    },
    /// The token fired first and the process was killed
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stdout,
    Stderr,
}

/// Kills the whole process tree rooted at a child unless disarmed.
///
/// yt-dlp runs ffmpeg as its own child for section downloads, so killing the
/// direct child alone leaves ffmpeg writing into the staging directory.
struct TreeKill {
    pid: Option<u32>,
}

impl TreeKill {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The tree ended on its own
    fn disarm(&mut self) {
        self.pid = None;
    }

    fn fire(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_tree(pid);
        }
    }
}

impl Drop for TreeKill {
    fn drop(&mut self) {
        self.fire();
    }
}

/// The child leads its own process group, so the group id is its pid
#[cfg(unix)]
fn kill_tree(pid: u32) {
    let group = format!("-{}", pid);
    match std::process::Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => debug!("Killed process group {}", pid),
        Ok(status) => debug!("kill for process group {} exited with {}", pid, status),
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    let pid = pid.to_string();
    match std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", pid.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => debug!("taskkill for process tree {} exited with {}", pid, status),
        Err(e) => warn!("Failed to kill process tree {}: {}", pid, e),
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(_pid: u32) {}

/// Run `command` to completion, handing every output line to `on_line`.
///
/// Stdin is closed and both output pipes are captured. On unix the child leads
/// a new process group. When `cancel` fires, the child and every process it
/// started are killed and the child is reaped before returning
/// [`Supervised::Cancelled`]. Dropping the future kills the tree as well.
///
/// Spawn failures are returned as the raw [`io::Error`] so callers can map
/// `NotFound` to their own error type.
pub async fn run_supervised<F>(
    mut command: Command,
    cancel: &CancellationToken,
    mut on_line: F,
) -> io::Result<Supervised>
where
    F: FnMut(&str) + Send,
{
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    debug!("Executing command: {:?}", command.as_std());
    let mut child = command.spawn()?;
    let mut tree = TreeKill::new(child.id());

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, Source::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, Source::Stderr, tx));
    } else {
        drop(tx);
    }

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut handle_line = |source: Source, line: String| {
        trace!(?source, "{}", line);
        on_line(&line);
        if source == Source::Stderr {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    };

    let mut lines_open = true;
    let status = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tree.fire();
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill cancelled process: {}", e);
                }
                debug!("Process killed after cancellation");
                return Ok(Supervised::Cancelled);
            }
            received = rx.recv(), if lines_open => match received {
                Some((source, line)) => handle_line(source, line),
                None => lines_open = false,
            },
            status = child.wait() => break status?,
        }
    };
    tree.disarm();

    // Pipes close once the process is gone; collect what is still buffered.
    while let Some((source, line)) = rx.recv().await {
        handle_line(source, line);
    }

    debug!("Process exited with {}", status);
    Ok(Supervised::Exited {
        status,
        stderr_tail: tail.into_iter().collect(),
    })
}

async fn forward_lines<R>(reader: R, source: Source, tx: mpsc::UnboundedSender<(Source, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        // yt-dlp rewrites progress in place with carriage returns
        for part in line.split('\r').filter(|p| !p.trim().is_empty()) {
            if tx.send((source, part.to_string())).is_err() {
                return;
            }
        }
    }
}
