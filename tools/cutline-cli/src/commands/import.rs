//! Import media files into a project.

use std::path::PathBuf;

use cutline_common::config::AppConfig;
use cutline_common::CutlineError;
use cutline_media_probe::{DecodeDurationSource, FfprobeProber, Importer};
use cutline_project_model::LoadedProject;

pub fn run(config: &AppConfig, path: PathBuf, files: Vec<PathBuf>, add: bool) -> anyhow::Result<()> {
    let mut project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let prober = FfprobeProber::from_config(&config.transcoder);
    let playback = DecodeDurationSource::from_config(&config.transcoder);
    let importer = Importer::new(&prober, Some(&playback));

    let mut failures = 0;
    for file in &files {
        let outcome = match importer.import(&mut project.project.catalog, file) {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("  [FAIL] {}: {}", file.display(), CutlineError::from(e));
                failures += 1;
                continue;
            }
        };

        let Some(asset) = project.catalog().get(outcome.asset) else {
            continue;
        };
        println!(
            "  [OK] asset {}: {} ({:.2}s, duration from {:?})",
            asset.id, asset.name, asset.duration_secs, outcome.duration_source
        );
        let usable = asset.has_usable_duration();
        if !outcome.is_usable() && usable {
            println!("       Duration unresolved this time; kept the known {:.2}s", asset.duration_secs);
        }

        let refitted = project.sync_asset(outcome.asset);
        if refitted > 0 {
            println!("       Refitted {refitted} segment(s) to the new duration");
        }

        if !usable {
            println!("       Duration unknown; the asset cannot be placed on the timeline yet.");
            continue;
        }
        if add {
            let segment = project
                .add_to_timeline(outcome.asset)
                .map_err(|e| anyhow::anyhow!("Failed to add asset to timeline: {e}"))?;
            println!("       Added as segment {segment}");
        }
    }

    project.touch();
    project
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;

    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) could not be imported", files.len());
    }
    Ok(())
}
