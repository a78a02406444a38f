//! Probe a single file.

use std::path::PathBuf;

use cutline_common::config::AppConfig;
use cutline_media_probe::{resolve_metadata, DecodeDurationSource, FfprobeProber};

pub fn run(config: &AppConfig, file: PathBuf) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let prober = FfprobeProber::from_config(&config.transcoder);
    let playback = DecodeDurationSource::from_config(&config.transcoder);
    let resolved = resolve_metadata(&file, &prober, Some(&playback));
    let m = &resolved.metadata;

    println!("File: {}", file.display());
    println!(
        "  Duration: {:.3}s (from {:?})",
        m.duration_secs, resolved.duration_source
    );
    match m.resolution {
        Some(r) => println!("  Resolution: {r}"),
        None => println!("  Resolution: none"),
    }
    if let Some(fps) = m.frame_rate {
        println!("  Frame rate: {fps:.3}");
    }
    println!("  Container: {}", m.container);
    println!("  Size: {} bytes", m.file_size);
    match m.has_audio {
        Some(true) => println!("  Audio: yes"),
        Some(false) => println!("  Audio: no"),
        None => println!("  Audio: unknown"),
    }

    Ok(())
}
