//! Show project information.

use std::path::PathBuf;

use cutline_project_model::LoadedProject;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    if json {
        let value = serde_json::json!({
            "project": project.project,
            "timeline": project.timeline,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let p = &project.project;

    println!("Project: {}", p.name);
    println!("  Created: {}", p.created_at);
    println!("  Modified: {}", p.modified_at);
    println!();

    println!("Media ({}):", p.catalog.len());
    for asset in p.catalog.iter() {
        let resolution = asset
            .resolution
            .map(|r| r.to_string())
            .unwrap_or_else(|| "audio".to_string());
        println!(
            "  [{}] {} ({:.2}s, {}, {})",
            asset.id, asset.name, asset.duration_secs, resolution, asset.container
        );
    }
    println!();

    println!(
        "Timeline ({} segment(s), {:.2}s):",
        project.timeline.len(),
        project.timeline.total_duration()
    );
    for segment in project.timeline.segments() {
        println!(
            "  [{}] {} @ {:.3}s  len {:.3}s  trim [{:.3}, {:.3}]  asset {}",
            segment.id,
            segment.name,
            segment.start_time(),
            segment.duration(),
            segment.trim_start(),
            segment.trim_end(),
            segment.asset_id
        );
    }
    println!();

    println!("Export:");
    println!("  Quality: {}", p.export.quality);
    println!("  Default output: {}", project.default_export_path().display());

    let issues = project.validate_sources();
    if !issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
    }

    Ok(())
}
