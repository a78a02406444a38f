//! Export a project's timeline to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use cutline_common::config::AppConfig;
use cutline_common::CutlineError;
use cutline_project_model::{LoadedProject, QualityPreset};
use cutline_render_engine::{
    ExportRequest, ExportService, FfmpegTranscoder, JobState, JobUpdate,
};
use tokio::sync::broadcast::error::RecvError;

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    quality: Option<String>,
) -> anyhow::Result<()> {
    println!("Exporting project at: {}", path.display());

    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let quality: QualityPreset = match quality {
        Some(name) => name.parse()?,
        None => project.project.export.quality,
    };
    let output_path = output.unwrap_or_else(|| project.default_export_path());

    println!("  Output: {}", output_path.display());
    println!("  Quality: {quality}");
    println!(
        "  Timeline: {} segment(s), {:.2}s",
        project.timeline.len(),
        project.timeline.total_duration()
    );

    let transcoder = FfmpegTranscoder::from_config(&config.transcoder);
    if !transcoder.is_available() {
        anyhow::bail!(
            "Transcoder not found at {}; run `cutline check`",
            transcoder.binary().display()
        );
    }

    let service = ExportService::new(Arc::new(transcoder));
    let mut updates = service.subscribe();
    let handle = service
        .start(
            &project.timeline,
            project.catalog(),
            ExportRequest::new(&output_path, quality),
        )
        .map_err(CutlineError::from)?;
    let canceller = handle.canceller();
    let job_id = handle.job_id();

    let wait = handle.wait();
    tokio::pin!(wait);

    let job = loop {
        tokio::select! {
            result = &mut wait => break result.map_err(CutlineError::from)?,
            update = updates.recv() => match update {
                Ok(JobUpdate::Progress { job_id: id, percent }) if id == job_id => {
                    print!("\r  Progress: {percent:5.1}%  ");
                    std::io::stdout().flush().ok();
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break wait.await.map_err(CutlineError::from)?,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("  Cancelling...");
                canceller.cancel();
                break wait.await.map_err(CutlineError::from)?;
            }
        }
    };
    println!();

    match job.state {
        JobState::Succeeded => {
            println!("Export complete: {}", job.output_path.display());
            Ok(())
        }
        JobState::Cancelled => {
            println!("Export cancelled.");
            Ok(())
        }
        _ => {
            let failure = job
                .failure
                .map(|f| {
                    if f.diagnostic.is_empty() {
                        f.message
                    } else {
                        format!("{}\n\n{}", f.message, f.diagnostic)
                    }
                })
                .unwrap_or_else(|| format!("job ended in state {}", job.state));
            anyhow::bail!("Export failed: {failure}")
        }
    }
}
