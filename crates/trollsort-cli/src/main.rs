mod commands;
mod logging;
mod progress;

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use trollsort_core::{AppConfig, ExifTool, SortEngine};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match trollsort_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Sort {
            dest,
            src,
            top_folder,
            collision_policy,
        }) => {
            if let Some(top) = top_folder {
                config.top_folder = Some(top);
            }
            if let Some(policy) = collision_policy {
                config.collision_policy = policy.into();
            }
            run_sort(config, src, &dest)
        }
        Some(Commands::Index { dest }) => run_index(&dest),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {}", err);
        process::exit(1);
    }
}

fn run_sort(
    config: AppConfig,
    src: Option<PathBuf>,
    dest: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let src = match src {
        Some(src) => src,
        None => env::current_dir()?,
    };

    let exiftool = ExifTool::locate(
        config.exiftool_path.as_deref(),
        Duration::from_secs(config.exiftool_timeout_secs),
    )?;
    info!("Using ExifTool at {}", exiftool.program().display());

    let engine = SortEngine::new(config, &exiftool);
    let reporter = CliReporter::new();
    let result = engine.sort(&src, dest, &reporter)?;

    println!();
    info!(
        "Scan: {}, Metadata: {}, Index: {}, Copy: {}",
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.classify_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.index_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.commit_duration.as_secs_f64()).green(),
    );
    info!(
        "{} media files of {} discovered, {} planned copies",
        format!("{}", result.media_items).cyan(),
        format!("{}", result.files_discovered).cyan(),
        format!("{}", result.planned_copies).cyan(),
    );

    let s = result.summary;
    info!(
        "{} copied, {} already present, {} duplicates skipped",
        format!("{}", s.copied + s.copied_after_collision).green(),
        format!("{}", s.already_present).cyan(),
        format!("{}", s.skipped_duplicates).yellow(),
    );
    if s.collisions > 0 {
        info!(
            "{} collisions: {} copied under a new name, {} skipped",
            format!("{}", s.collisions).yellow(),
            format!("{}", s.copied_after_collision).green(),
            format!("{}", s.skipped_collisions).yellow(),
        );
    }
    if s.errors > 0 {
        warn!(
            "{} file(s) could not be copied, see {}",
            format!("{}", s.errors).red(),
            result.logs_dir.display()
        );
    }

    Ok(())
}

fn run_index(dest: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = CliReporter::new();
    let index = trollsort_core::build_index(dest, &reporter)?;
    let groups = index.duplicate_groups();

    println!();
    info!(
        "{} files, {} distinct contents, {} duplicate groups",
        format!("{}", index.file_count()).cyan(),
        format!("{}", index.len()).cyan(),
        format!("{}", groups.len()).red(),
    );
    for (fingerprint, paths) in groups {
        info!("{}", fingerprint.to_hex().dimmed());
        for path in paths {
            info!("  {}", path.display());
        }
    }

    Ok(())
}
