//! Cutline CLI: build and export timelines from the command line.
//!
//! Usage:
//!   cutline init <NAME>                      Create a new project
//!   cutline import <PATH> <FILES>...         Probe files into the media catalog
//!   cutline add <PATH> <ASSET>               Append an asset to the timeline
//!   cutline trim <PATH> <SEGMENT> <IN> <OUT> Set a segment's trim window
//!   cutline split <PATH> <SEGMENT> <AT>      Split a segment at a timeline time
//!   cutline move <PATH> <SEGMENT> <START>    Drag a segment to a new start
//!   cutline remove <PATH> <SEGMENT>          Remove a segment
//!   cutline remove-asset <PATH> <ASSET>      Remove an asset and its segments
//!   cutline info <PATH>                      Show project information
//!   cutline probe <FILE>                     Show probed metadata for a file
//!   cutline export <PATH>                    Render the timeline to a file
//!   cutline check                            Check transcoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cutline_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "cutline",
    about = "Trim, arrange, and export video clips",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    Init {
        /// Project name
        name: String,

        /// Parent directory (defaults to the configured projects directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import media files into a project's catalog
    Import {
        /// Path to the project directory
        path: PathBuf,

        /// Files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also append each usable asset to the timeline
        #[arg(long)]
        add: bool,
    },

    /// Append a catalog asset to the timeline
    Add {
        /// Path to the project directory
        path: PathBuf,

        /// Asset id (see `cutline info`)
        asset: u64,
    },

    /// Remove a segment from the timeline
    Remove {
        /// Path to the project directory
        path: PathBuf,

        /// Segment id
        segment: u64,
    },

    /// Remove an asset from the catalog along with its segments
    RemoveAsset {
        /// Path to the project directory
        path: PathBuf,

        /// Asset id
        asset: u64,
    },

    /// Set a segment's trim window, in source seconds
    Trim {
        /// Path to the project directory
        path: PathBuf,

        /// Segment id
        segment: u64,

        /// Trim start (source seconds)
        #[arg(allow_negative_numbers = true)]
        start: f64,

        /// Trim end (source seconds)
        #[arg(allow_negative_numbers = true)]
        end: f64,
    },

    /// Split a segment at a timeline time
    Split {
        /// Path to the project directory
        path: PathBuf,

        /// Segment id
        segment: u64,

        /// Split point (timeline seconds)
        at: f64,
    },

    /// Drag a segment to a new start time
    Move {
        /// Path to the project directory
        path: PathBuf,

        /// Segment id
        segment: u64,

        /// Requested start (timeline seconds)
        start: f64,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,

        /// Print the project as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file without importing it
    Probe {
        /// Media file
        file: PathBuf,
    },

    /// Export the timeline to a single video file
    Export {
        /// Path to the project directory
        path: PathBuf,

        /// Output file path (defaults to exports/<file name> in the project)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality preset: low|high|source
        #[arg(short, long)]
        quality: Option<String>,
    },

    /// Check that the transcoder and probe binaries are available
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    cutline_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init { name, output } => commands::init::run(&config, name, output),
        Commands::Import { path, files, add } => commands::import::run(&config, path, files, add),
        Commands::Add { path, asset } => commands::edit::add(path, asset),
        Commands::Remove { path, segment } => commands::edit::remove(path, segment),
        Commands::RemoveAsset { path, asset } => commands::edit::remove_asset(path, asset),
        Commands::Trim {
            path,
            segment,
            start,
            end,
        } => commands::edit::trim(path, segment, start, end),
        Commands::Split { path, segment, at } => commands::edit::split(path, segment, at),
        Commands::Move {
            path,
            segment,
            start,
        } => commands::edit::move_segment(path, segment, start),
        Commands::Info { path, json } => commands::info::run(path, json),
        Commands::Probe { file } => commands::probe::run(&config, file),
        Commands::Export {
            path,
            output,
            quality,
        } => commands::export::run(&config, path, output, quality).await,
        Commands::Check => commands::check::run(&config),
    }
}
