//! Transcoder process supervision.
//!
//! A worker task owns the child process, drains its stderr, and reports
//! [`TranscoderEvent`]s over an mpsc channel. It never touches job state.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use cutline_common::TranscoderConfig;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::progress::{parse_time_marker, DiagnosticTail, LineSplitter};

/// Something that can turn an argument vector into a transcoder process.
pub trait Transcoder: Send + Sync {
    /// Build the command for `args`. Stdio is configured by the caller.
    fn command(&self, args: &[String]) -> Command;

    fn name(&self) -> &str;
}

/// An ffmpeg-compatible binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.ffmpeg.clone())
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    /// Whether the binary can be executed.
    pub fn is_available(&self) -> bool {
        binary_available(&self.binary)
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for FfmpegTranscoder {
    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(args);
        command
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Run `<binary> -version` and report whether it succeeded.
pub fn binary_available(binary: &std::path::Path) -> bool {
    std::process::Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// What a worker observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscoderEvent {
    /// A `time=` marker: seconds of output written so far.
    Progress { elapsed_secs: f64 },

    /// The process ended. `diagnostic` holds the last stderr lines.
    Exited {
        success: bool,
        code: Option<i32>,
        diagnostic: String,
    },

    /// The process could not be started.
    SpawnFailed { message: String },
}

/// Spawn a worker that runs `args` through `transcoder`.
///
/// Exactly one `Exited` or `SpawnFailed` event is sent before the worker
/// drops its sender. Notifying `cancel` kills the process; the worker still
/// reaps it and reports the exit.
pub fn spawn_worker(
    transcoder: &dyn Transcoder,
    args: &[String],
    events: mpsc::UnboundedSender<TranscoderEvent>,
    cancel: Arc<Notify>,
) -> JoinHandle<()> {
    let mut command = transcoder.command(args);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(transcoder = transcoder.name(), args = ?args, "Spawning transcoder");
    tokio::spawn(run_worker(command, events, cancel))
}

async fn run_worker(
    mut command: Command,
    events: mpsc::UnboundedSender<TranscoderEvent>,
    cancel: Arc<Notify>,
) {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start transcoder");
            let _ = events.send(TranscoderEvent::SpawnFailed {
                message: err.to_string(),
            });
            return;
        }
    };

    tracing::info!(pid = child.id(), "Transcoder process started");

    let drain = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(drain_stderr(stderr, events.clone())));

    let finished = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.notified() => None,
    };

    let status = match finished {
        Some(status) => status,
        None => {
            tracing::info!(pid = child.id(), "Killing transcoder");
            if let Err(err) = child.start_kill() {
                tracing::warn!(error = %err, "Failed to signal transcoder");
            }
            child.wait().await
        }
    };

    let diagnostic = match drain {
        Some(task) => task
            .await
            .unwrap_or_else(|e| format!("<failed to read transcoder stderr: {e}>")),
        None => String::new(),
    };

    let event = match status {
        Ok(status) => {
            tracing::debug!(status = %status, "Transcoder exited");
            TranscoderEvent::Exited {
                success: status.success(),
                code: status.code(),
                diagnostic,
            }
        }
        Err(err) => TranscoderEvent::Exited {
            success: false,
            code: None,
            diagnostic: format!("failed to wait on transcoder: {err}"),
        },
    };
    let _ = events.send(event);
}

/// Forward `time=` markers as progress and return the diagnostic tail of
/// everything else.
async fn drain_stderr(
    mut stderr: ChildStderr,
    events: mpsc::UnboundedSender<TranscoderEvent>,
) -> String {
    let mut splitter = LineSplitter::default();
    let mut tail = DiagnosticTail::default();
    let mut buf = [0u8; 4096];

    let handle = |line: String, tail: &mut DiagnosticTail| {
        match parse_time_marker(&line) {
            Some(elapsed_secs) => {
                let _ = events.send(TranscoderEvent::Progress { elapsed_secs });
            }
            None => tail.push(line),
        }
    };

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    handle(line, &mut tail);
                }
            }
            Err(err) => {
                tail.push(format!("<failed to read transcoder stderr: {err}>"));
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        handle(line, &mut tail);
    }

    tail.render()
}
