//! Render job state machine.
//!
//! ```text
//! Idle ──start──► Running ──exit 0──────► Succeeded ─┐
//!                    │ ────exit ≠ 0/spawn──► Failed ─┼─dismiss──► Idle
//!                    └─────cancel──────────► Cancelled┘
//! ```
//!
//! At most one job is active. Events for a job that is no longer running
//! are ignored, so a late progress line or the exit of a killed process
//! cannot move a terminal job.

use std::fmt;
use std::path::PathBuf;

use cutline_project_model::QualityPreset;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::ExportError;
use crate::progress::{progress_percent, truncate_tail, DIAGNOSTIC_MAX_CHARS};
use crate::runner::TranscoderEvent;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Identifier of a render job, unique per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Controller-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The transcoder could not be started.
    TranscoderSpawn,
    /// The transcoder ran and exited unsuccessfully.
    TranscoderExit { code: Option<i32> },
}

/// User-facing failure report plus the raw stderr excerpt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    pub diagnostic: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A render job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportJob {
    pub id: JobId,
    pub label: String,
    pub output_path: PathBuf,
    pub quality: QualityPreset,

    /// Percent complete, 0 to 100; never decreases while running.
    pub progress: f64,

    pub state: JobState,

    /// Set when `state` is `Failed`.
    pub failure: Option<JobFailure>,

    /// Expected output duration used to compute `progress`.
    pub total_duration_secs: f64,
}

/// Broadcast to observers of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobUpdate {
    Progress { job_id: JobId, percent: f64 },
    Finished { job_id: JobId, state: JobState },
}

/// Owns the active job and reduces transcoder events into it.
#[derive(Debug)]
pub struct JobController {
    current: Option<ExportJob>,
    next_id: u64,
    updates: broadcast::Sender<JobUpdate>,
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

impl JobController {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            current: None,
            next_id: 1,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> JobState {
        self.current.as_ref().map_or(JobState::Idle, |job| job.state)
    }

    /// The active or undismissed job.
    pub fn current(&self) -> Option<&ExportJob> {
        self.current.as_ref()
    }

    pub fn job(&self, id: JobId) -> Option<&ExportJob> {
        self.current.as_ref().filter(|job| job.id == id)
    }

    /// Start a job. Fails while another job is running; an undismissed
    /// terminal job is replaced.
    pub fn start(
        &mut self,
        label: impl Into<String>,
        output_path: PathBuf,
        quality: QualityPreset,
        total_duration_secs: f64,
    ) -> Result<JobId, ExportError> {
        if let Some(running) = self.running_id() {
            return Err(ExportError::JobAlreadyRunning { running });
        }

        let id = JobId(self.next_id);
        self.next_id += 1;
        let job = ExportJob {
            id,
            label: label.into(),
            output_path,
            quality,
            progress: 0.0,
            state: JobState::Running,
            failure: None,
            total_duration_secs,
        };

        tracing::info!(
            job_id = %id,
            label = %job.label,
            output = %job.output_path.display(),
            quality = %quality,
            "Export job started"
        );
        self.current = Some(job);
        Ok(id)
    }

    pub fn running_id(&self) -> Option<JobId> {
        self.current
            .as_ref()
            .filter(|job| job.state == JobState::Running)
            .map(|job| job.id)
    }

    /// Apply a worker event to job `id`. Returns whether anything changed.
    pub fn apply(&mut self, id: JobId, event: TranscoderEvent) -> bool {
        let Some(job) = self.running_job_mut(id) else {
            tracing::trace!(job_id = %id, ?event, "Ignoring event for inactive job");
            return false;
        };

        match event {
            TranscoderEvent::Progress { elapsed_secs } => {
                let Some(percent) = progress_percent(elapsed_secs, job.total_duration_secs) else {
                    return false;
                };
                if percent <= job.progress {
                    return false;
                }
                job.progress = percent;
                let _ = self.updates.send(JobUpdate::Progress {
                    job_id: id,
                    percent,
                });
                true
            }
            TranscoderEvent::Exited { success: true, .. } => {
                job.progress = 100.0;
                self.finish(id, JobState::Succeeded, None);
                true
            }
            TranscoderEvent::Exited {
                success: false,
                code,
                diagnostic,
            } => {
                let message = match code {
                    Some(code) => format!("Export failed: the transcoder exited with status {code}"),
                    None => "Export failed: the transcoder was terminated".to_string(),
                };
                let failure = JobFailure {
                    kind: FailureKind::TranscoderExit { code },
                    message,
                    diagnostic: truncate_tail(&diagnostic, DIAGNOSTIC_MAX_CHARS),
                };
                self.finish(id, JobState::Failed, Some(failure));
                true
            }
            TranscoderEvent::SpawnFailed { message } => {
                let failure = JobFailure {
                    kind: FailureKind::TranscoderSpawn,
                    message: "Export failed: could not start the transcoder; check that ffmpeg is installed".to_string(),
                    diagnostic: truncate_tail(&message, DIAGNOSTIC_MAX_CHARS),
                };
                self.finish(id, JobState::Failed, Some(failure));
                true
            }
        }
    }

    /// Mark job `id` cancelled. Returns `false` when it is not running; the
    /// caller signals the process only on `true`.
    pub fn cancel(&mut self, id: JobId) -> bool {
        if self.running_job_mut(id).is_none() {
            return false;
        }
        self.finish(id, JobState::Cancelled, None);
        true
    }

    /// Clear a terminal job. Returns `false` while running or idle.
    pub fn dismiss(&mut self) -> bool {
        match &self.current {
            Some(job) if job.state.is_terminal() => {
                tracing::debug!(job_id = %job.id, "Export job dismissed");
                self.current = None;
                true
            }
            _ => false,
        }
    }

    fn running_job_mut(&mut self, id: JobId) -> Option<&mut ExportJob> {
        self.current
            .as_mut()
            .filter(|job| job.id == id && job.state == JobState::Running)
    }

    fn finish(&mut self, id: JobId, state: JobState, failure: Option<JobFailure>) {
        let Some(job) = self.current.as_mut().filter(|job| job.id == id) else {
            return;
        };
        job.state = state;
        job.failure = failure;

        match &job.failure {
            Some(failure) => tracing::warn!(
                job_id = %id,
                kind = ?failure.kind,
                diagnostic = %failure.diagnostic,
                "{}",
                failure.message
            ),
            None => tracing::info!(job_id = %id, state = %state, "Export job finished"),
        }

        let _ = self.updates.send(JobUpdate::Finished { job_id: id, state });
    }
}
