//! Initialize a new Cutline project.

use std::path::PathBuf;

use cutline_common::config::AppConfig;
use cutline_project_model::{ExportSettings, LoadedProject};

pub fn run(config: &AppConfig, name: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let export = ExportSettings::from_defaults(&config.export.quality, &config.export.file_name)
        .map_err(|e| anyhow::anyhow!("Invalid export defaults in config: {e}"))?;

    let project_dir = output
        .unwrap_or_else(|| config.projects_dir.clone())
        .join(&name);
    println!("Creating project '{}' at {}", name, project_dir.display());

    let project = LoadedProject::create_with_export(&project_dir, &name, export)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;

    println!("Project created successfully:");
    println!("  Directory: {}", project.root.display());
    println!(
        "  Export:    {} ({})",
        project.default_export_path().display(),
        project.project.export.quality
    );
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── sources/     (recordings)");
    println!("  ├── meta/        (project.json, timeline.json)");
    println!("  └── exports/     (rendered output)");

    Ok(())
}
