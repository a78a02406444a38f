//! Export service: one render job at a time, driven by a transcoder worker.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cutline_project_model::{MediaCatalog, QualityPreset, Timeline};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

use crate::error::ExportError;
use crate::job::{ExportJob, JobController, JobId, JobState, JobUpdate};
use crate::plan::plan_export;
use crate::runner::{spawn_worker, Transcoder, TranscoderEvent};

/// What to export and where.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub output: PathBuf,
    pub quality: QualityPreset,

    /// Shown to observers; defaults to the output file name.
    pub label: Option<String>,
}

impl ExportRequest {
    pub fn new(output: impl Into<PathBuf>, quality: QualityPreset) -> Self {
        Self {
            output: output.into(),
            quality,
            label: None,
        }
    }
}

/// Owns the job controller and the transcoder used for every export.
///
/// Must be used from within a tokio runtime.
pub struct ExportService {
    controller: Arc<Mutex<JobController>>,
    transcoder: Arc<dyn Transcoder>,
}

impl ExportService {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(JobController::new())),
            transcoder,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        lock(&self.controller).subscribe()
    }

    pub fn state(&self) -> JobState {
        lock(&self.controller).state()
    }

    /// Snapshot of the active or undismissed job.
    pub fn current_job(&self) -> Option<ExportJob> {
        lock(&self.controller).current().cloned()
    }

    pub fn dismiss(&self) -> bool {
        lock(&self.controller).dismiss()
    }

    /// Plan and launch an export of `timeline`.
    ///
    /// The timeline is snapshotted before planning, so later edits do not
    /// affect the running job. Every synchronous failure happens before the
    /// transcoder is spawned.
    pub fn start(
        &self,
        timeline: &Timeline,
        catalog: &MediaCatalog,
        request: ExportRequest,
    ) -> Result<ExportHandle, ExportError> {
        if let Some(running) = lock(&self.controller).running_id() {
            return Err(ExportError::JobAlreadyRunning { running });
        }

        let snapshot = timeline.snapshot();
        let plan = plan_export(&snapshot, catalog, request.quality, &request.output)?;

        if let Some(parent) = plan.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::OutputDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let label = request.label.unwrap_or_else(|| {
            plan.output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| plan.output.display().to_string())
        });

        let job_id = lock(&self.controller).start(
            label,
            plan.output.clone(),
            request.quality,
            plan.total_duration_secs,
        )?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let signal = Arc::new(Notify::new());
        let worker = spawn_worker(self.transcoder.as_ref(), &plan.args(), events_tx, signal.clone());
        let pump = tokio::spawn(pump_events(
            self.controller.clone(),
            job_id,
            events_rx,
            worker,
        ));

        Ok(ExportHandle {
            job_id,
            canceller: JobCanceller {
                job_id,
                controller: self.controller.clone(),
                signal,
            },
            pump,
        })
    }
}

/// Cancels one job. Cheap to clone; safe to use after the job has ended.
#[derive(Clone)]
pub struct JobCanceller {
    job_id: JobId,
    controller: Arc<Mutex<JobController>>,
    signal: Arc<Notify>,
}

impl JobCanceller {
    /// Mark the job cancelled and ask the worker to kill the process.
    /// Returns `false` when the job already ended.
    pub fn cancel(&self) -> bool {
        let cancelled = lock(&self.controller).cancel(self.job_id);
        if cancelled {
            self.signal.notify_one();
        }
        cancelled
    }
}

/// A launched export.
pub struct ExportHandle {
    job_id: JobId,
    canceller: JobCanceller,
    pump: JoinHandle<Option<ExportJob>>,
}

impl ExportHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn canceller(&self) -> JobCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    /// Wait for the worker to finish and return the job's final record.
    pub async fn wait(self) -> Result<ExportJob, ExportError> {
        match self.pump.await {
            Ok(Some(job)) => Ok(job),
            Ok(None) => Err(ExportError::Worker {
                message: format!("job {} was replaced before it finished", self.job_id),
            }),
            Err(e) => Err(ExportError::Worker {
                message: e.to_string(),
            }),
        }
    }
}

/// Feed worker events into the controller until the worker hangs up.
async fn pump_events(
    controller: Arc<Mutex<JobController>>,
    job_id: JobId,
    mut events: mpsc::UnboundedReceiver<TranscoderEvent>,
    worker: JoinHandle<()>,
) -> Option<ExportJob> {
    while let Some(event) = events.recv().await {
        lock(&controller).apply(job_id, event);
    }

    if let Err(e) = worker.await {
        tracing::error!(job_id = %job_id, error = %e, "Transcoder worker panicked");
    }

    let mut controller = lock(&controller);
    if controller.running_id() == Some(job_id) {
        controller.apply(
            job_id,
            TranscoderEvent::Exited {
                success: false,
                code: None,
                diagnostic: "transcoder worker stopped without reporting an exit".to_string(),
            },
        );
    }
    controller.job(job_id).cloned()
}

fn lock(controller: &Mutex<JobController>) -> MutexGuard<'_, JobController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}
