//! Timeline editing commands.
//!
//! Each command loads the project, applies one edit, and saves it back.

use std::path::{Path, PathBuf};

use cutline_project_model::{AssetId, LoadedProject, SegmentId, SplitOutcome};

fn load(path: &Path) -> anyhow::Result<LoadedProject> {
    LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))
}

fn save(project: &mut LoadedProject) -> anyhow::Result<()> {
    project.touch();
    project
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
    println!(
        "Timeline: {} segment(s), {:.2}s",
        project.timeline.len(),
        project.timeline.total_duration()
    );
    Ok(())
}

pub fn add(path: PathBuf, asset: u64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    let segment = project.add_to_timeline(AssetId(asset))?;
    println!("Added asset {asset} as segment {segment}");
    save(&mut project)
}

pub fn remove(path: PathBuf, segment: u64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    if !project.timeline.remove(SegmentId(segment)) {
        println!("Segment {segment} is not on the timeline; nothing to remove");
        return Ok(());
    }
    println!("Removed segment {segment}");
    save(&mut project)
}

pub fn remove_asset(path: PathBuf, asset: u64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    let (removed, segments) = project
        .remove_asset(AssetId(asset))
        .ok_or_else(|| anyhow::anyhow!("Asset {asset} is not in the catalog"))?;
    println!(
        "Removed asset {} ({}) and {segments} segment(s)",
        removed.id, removed.name
    );
    save(&mut project)
}

pub fn trim(path: PathBuf, segment: u64, start: f64, end: f64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    let adjustment = project.timeline.update_trim(
        &project.project.catalog,
        SegmentId(segment),
        start,
        end,
    )?;
    println!(
        "Segment {segment} trimmed to [{:.3}, {:.3}]{}",
        adjustment.trim_start,
        adjustment.trim_end,
        if adjustment.clamped { " (clamped)" } else { "" }
    );
    save(&mut project)
}

pub fn split(path: PathBuf, segment: u64, at: f64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    match project.timeline.split(SegmentId(segment), at)? {
        SplitOutcome::Split { left, right } => {
            println!("Split segment {segment} into {left} and {right}");
            save(&mut project)
        }
        SplitOutcome::Rejected(reason) => {
            println!("Split ignored: {reason:?}");
            Ok(())
        }
    }
}

pub fn move_segment(path: PathBuf, segment: u64, start: f64) -> anyhow::Result<()> {
    let mut project = load(&path)?;
    project.timeline.move_segment(SegmentId(segment), start)?;
    if let Some(moved) = project.timeline.segment(SegmentId(segment)) {
        println!("Segment {segment} now starts at {:.3}s", moved.start_time());
    }
    save(&mut project)
}
