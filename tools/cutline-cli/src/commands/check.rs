//! Check external tool availability.

use cutline_common::config::{config_file_path, AppConfig};
use cutline_render_engine::binary_available;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Cutline System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("Transcoder", &config.transcoder.ffmpeg),
        ("Probe", &config.transcoder.ffprobe),
    ];

    let mut all_ok = true;
    for (label, binary) in tools {
        if binary_available(binary) {
            println!("[OK] {label}: {}", binary.display());
        } else {
            println!("[MISSING] {label}: {}", binary.display());
            all_ok = false;
        }
    }

    println!("[OK] Projects directory: {}", config.projects_dir.display());

    println!();
    if all_ok {
        println!("All required tools are available. Cutline is ready.");
    } else {
        println!(
            "Install ffmpeg or set transcoder paths in {}",
            config_file_path().display()
        );
    }

    Ok(())
}
