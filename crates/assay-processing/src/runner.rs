//! External process execution.
//!
//! A run is split in two so the caller can record the `Running` transition
//! between a successful spawn and the wait: [`RunningProcess::spawn`] starts
//! the child with both output streams piped into capture tasks, and
//! [`RunningProcess::finish`] waits for exit under a timeout, kills and reaps
//! on expiry, then joins the capture tasks.
//!
//! On unix the child leads its own process group so a timeout kill also
//! reaches anything it started.

use crate::capture::{CaptureBuffer, MAX_LINE_BYTES};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long capture tasks get to drain after the child is gone. A grandchild
/// holding the pipe open would otherwise block the terminal transition.
const CAPTURE_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// What to run. Positional paths are appended after `args` for each run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub capture_max_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The child exited on its own. `None` when it was terminated by a signal.
    Exited(Option<i32>),
    /// The deadline passed and the child was killed.
    TimedOut,
}

#[derive(Debug)]
pub struct FinishedProcess {
    pub exit: ExitKind,
    pub stdout: CaptureBuffer,
    pub stderr: CaptureBuffer,
    pub elapsed: Duration,
}

pub struct RunningProcess {
    job_id: String,
    child: Child,
    stdout_task: Option<JoinHandle<CaptureBuffer>>,
    stderr_task: Option<JoinHandle<CaptureBuffer>>,
    started: std::time::Instant,
    max_lines: usize,
}

impl RunningProcess {
    /// Start the child. Stdin is closed; the child is killed if this handle is
    /// dropped before it exits.
    pub fn spawn<I, S>(spec: &CommandSpec, job_id: &str, positional: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .args(positional)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        tracing::debug!(
            job_id = %job_id,
            program = %spec.program,
            pid = child.id(),
            "Analysis process spawned"
        );

        let max_lines = spec.capture_max_lines;
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(capture(out, job_id.to_string(), "stdout", max_lines)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(capture(err, job_id.to_string(), "stderr", max_lines)));

        Ok(Self {
            job_id: job_id.to_string(),
            child,
            stdout_task,
            stderr_task,
            started: std::time::Instant::now(),
            max_lines,
        })
    }

    /// Wait for the child to exit, killing it once `timeout` elapses.
    ///
    /// Returns only after the child has been reaped and both capture tasks
    /// have finished (or been abandoned after a short grace period).
    pub async fn finish(mut self, timeout: Duration) -> FinishedProcess {
        let exit = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => ExitKind::Exited(exit_code(status)),
            Ok(Err(e)) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Failed to wait for analysis process");
                self.reap().await;
                ExitKind::Exited(None)
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    timeout_secs = timeout.as_secs_f64(),
                    "Analysis process timed out, killing"
                );
                self.reap().await;
                ExitKind::TimedOut
            }
        };

        let stdout = join_capture(self.stdout_task.take(), &self.job_id, self.max_lines).await;
        let stderr = join_capture(self.stderr_task.take(), &self.job_id, self.max_lines).await;

        FinishedProcess {
            exit,
            stdout,
            stderr,
            elapsed: self.started.elapsed(),
        }
    }

    async fn reap(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.child.id().and_then(|pid| i32::try_from(pid).ok()) {
                // SAFETY: plain syscall on the group the child leads; no memory is touched.
                unsafe {
                    libc::kill(-pgid, libc::SIGKILL);
                }
            }
        }
        if let Err(e) = self.child.kill().await {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to kill analysis process");
        }
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

async fn capture<R>(reader: R, job_id: String, stream: &'static str, max_lines: usize) -> CaptureBuffer
where
    R: AsyncRead + Unpin,
{
    let mut buffer = CaptureBuffer::new(max_lines);
    let mut reader = BufReader::new(reader);
    // Bytes past MAX_LINE_BYTES are discarded until the next newline, so a
    // stream without newlines never holds more than one capped line.
    let mut line: Vec<u8> = Vec::with_capacity(256);
    let mut overflowed = false;

    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(job_id = %job_id, stream = stream, error = %e, "Output capture stopped");
                break;
            }
        };
        if chunk.is_empty() {
            if !line.is_empty() || overflowed {
                emit_line(&mut buffer, &line, &job_id, stream);
            }
            break;
        }

        let newline = chunk.iter().position(|&b| b == b'\n');
        let segment = match newline {
            Some(i) => &chunk[..i],
            None => chunk,
        };
        let room = MAX_LINE_BYTES.saturating_sub(line.len());
        if segment.len() > room {
            overflowed = true;
        }
        line.extend_from_slice(&segment[..segment.len().min(room)]);

        let consumed = newline.map(|i| i + 1).unwrap_or(chunk.len());
        reader.consume(consumed);

        if newline.is_some() {
            emit_line(&mut buffer, &line, &job_id, stream);
            line.clear();
            overflowed = false;
        }
    }

    buffer
}

fn emit_line(buffer: &mut CaptureBuffer, raw: &[u8], job_id: &str, stream: &'static str) {
    let line = String::from_utf8_lossy(raw)
        .trim_end_matches('\r')
        .to_string();
    tracing::debug!(job_id = %job_id, stream = stream, "{}", line);
    buffer.push_line(line);
}

async fn join_capture(
    task: Option<JoinHandle<CaptureBuffer>>,
    job_id: &str,
    max_lines: usize,
) -> CaptureBuffer {
    let Some(mut task) = task else {
        return CaptureBuffer::new(max_lines);
    };

    match tokio::time::timeout(CAPTURE_DRAIN_GRACE, &mut task).await {
        Ok(Ok(buffer)) => buffer,
        Ok(Err(e)) => {
            tracing::warn!(job_id = %job_id, error = %e, "Output capture task failed");
            CaptureBuffer::new(max_lines)
        }
        Err(_) => {
            tracing::warn!(job_id = %job_id, "Output pipe still open after exit, abandoning capture");
            task.abort();
            CaptureBuffer::new(max_lines)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "analysis".to_string()],
            workdir: None,
            capture_max_lines: 10,
        }
    }

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let spec = sh("echo \"got $1\"; echo oops >&2; exit 3");
        let running = RunningProcess::spawn(&spec, "job", ["input.csv"]).unwrap();
        let finished = running.finish(Duration::from_secs(10)).await;

        assert_eq!(finished.exit, ExitKind::Exited(Some(3)));
        assert_eq!(finished.stdout.tail(10), "got input.csv");
        assert_eq!(finished.stderr.tail(10), "oops");
    }

    #[tokio::test]
    async fn test_capture_is_bounded() {
        let spec = sh("i=0; while [ $i -lt 50 ]; do echo line$i; i=$((i+1)); done");
        let finished = RunningProcess::spawn(&spec, "job", Vec::<String>::new())
            .unwrap()
            .finish(Duration::from_secs(10))
            .await;

        assert_eq!(finished.exit, ExitKind::Exited(Some(0)));
        assert_eq!(finished.stdout.len(), 10);
        assert_eq!(finished.stdout.dropped(), 40);
        assert!(finished.stdout.tail(1).ends_with("line49"));
    }

    #[tokio::test]
    async fn test_unterminated_output_stays_bounded() {
        use tokio::io::AsyncReadExt;

        let endless = tokio::io::repeat(b'x')
            .take(128 * 1024 * 1024)
            .chain(&b"\ntail\n"[..]);
        let before = peak_resident_kb();
        let buffer = capture(endless, "job".to_string(), "stdout", 10).await;
        let after = peak_resident_kb();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.tail(2), format!("{}\ntail", "x".repeat(MAX_LINE_BYTES)));
        if let (Some(before), Some(after)) = (before, after) {
            assert!(after - before < 32 * 1024, "peak RSS grew by {}kB", after - before);
        }
    }

    #[tokio::test]
    async fn test_trailing_partial_line_kept() {
        let buffer = capture(&b"one\ntwo"[..], "job".to_string(), "stdout", 10).await;
        assert_eq!(buffer.into_lines(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survivor");
        let spec = sh("(sleep 1; touch \"$1\") & wait");
        let finished = RunningProcess::spawn(&spec, "job", [&marker])
            .unwrap()
            .finish(Duration::from_millis(200))
            .await;

        assert_eq!(finished.exit, ExitKind::TimedOut);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    /// VmHWM from /proc, where available.
    fn peak_resident_kb() -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        status
            .lines()
            .find(|l| l.starts_with("VmHWM:"))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let spec = sh("exec sleep 30");
        let started = std::time::Instant::now();
        let finished = RunningProcess::spawn(&spec, "job", Vec::<String>::new())
            .unwrap()
            .finish(Duration::from_millis(200))
            .await;

        assert_eq!(finished.exit, ExitKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let spec = CommandSpec {
            program: "/nonexistent/assay-analysis".to_string(),
            args: Vec::new(),
            workdir: None,
            capture_max_lines: 10,
        };
        assert!(RunningProcess::spawn(&spec, "job", ["x"]).is_err());
    }
}
