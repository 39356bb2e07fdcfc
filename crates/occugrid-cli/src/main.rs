//! `occugrid` – build an occupancy grid from a recorded robot log.
//!
//! Reads a CARMEN log of laser scans and odometry and folds every scan into
//! a log-odds grid. Writes the result as a PGM image.
//!
//! ```text
//! occugrid --log intel.log --config run.toml --output intel.pgm \
//!          --frames-every 50 --frames-dir frames --summary intel.json
//! ```
//!
//! Ctrl-C stops mapping after the current scan; the partial map is still
//! written.

mod carmen;
mod config;
mod snapshot;
mod telemetry;

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use occugrid_mapping::{Mapper, PoseTrack};
use occugrid_types::MapError;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Build an occupancy grid map from a CARMEN laser log
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CARMEN log file with FLASER records
    #[arg(short, long)]
    log: PathBuf,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output PGM image for the final map
    #[arg(short, long, default_value = "map.pgm")]
    output: PathBuf,

    /// Write an intermediate map every N scans (0 = never)
    #[arg(long)]
    frames_every: Option<usize>,

    /// Directory for intermediate maps
    #[arg(long, default_value = "frames")]
    frames_dir: PathBuf,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Log(#[from] carmen::LogError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn main() {
    let args = Args::parse();
    let guard = telemetry::init_tracing("occugrid", args.verbose);

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing current scan …".yellow().bold());
        stop_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run cannot be stopped early");
    }

    let code = match run(&args, &stop) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            1
        }
    };

    // Flush spans before exiting.
    drop(guard);
    std::process::exit(code);
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

fn run(args: &Args, stop: &AtomicBool) -> Result<(), CliError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut settings = config::resolve(args.config.as_deref())?;
    if let Some(n) = args.frames_every {
        settings.output.frames_every = n;
    }
    let mapper = Mapper::new(settings.mapper_config())?;
    let cfg = *mapper.config();
    match &args.config {
        Some(path) => println!("  Config loaded from {}", path.display().to_string().bold()),
        None => println!("  Using default configuration"),
    }
    println!(
        "  Grid {}×{} @ {} m, association {}",
        cfg.grid.width,
        cfg.grid.height,
        cfg.grid.resolution,
        cfg.association.to_string().cyan()
    );

    // ── Log ───────────────────────────────────────────────────────────────
    let parsed = carmen::read_log(&args.log, cfg.sensor.field_of_view)?;
    if parsed.skipped_lines > 0 {
        warn!(skipped = parsed.skipped_lines, "Malformed FLASER records were skipped");
    }
    let skipped_log_lines = parsed.skipped_lines;
    let scans = parsed.scans;
    let track = PoseTrack::new(parsed.poses)?;
    println!(
        "  Read {} scan(s) from {}",
        scans.len().to_string().bold(),
        args.log.display()
    );

    // ── Mapping ───────────────────────────────────────────────────────────
    let frames_every = settings.output.frames_every;
    if frames_every > 0 {
        std::fs::create_dir_all(&args.frames_dir).map_err(|source| CliError::Write {
            path: args.frames_dir.clone(),
            source,
        })?;
    }
    let report_every = (scans.len() / 10).max(1);
    let mut frames_written = 0usize;
    let mut frame_error: Option<CliError> = None;

    let mut grid = mapper.new_grid();
    let stats = mapper.run_with(&track, &scans, &mut grid, |progress, grid| {
        let done = progress.index + 1;
        if done % report_every == 0 || done == progress.total {
            info!(scan = done, total = progress.total, "progress");
        }
        if frames_every > 0 && done % frames_every == 0 {
            let path = snapshot::frame_path(&args.frames_dir, done);
            if let Err(source) = snapshot::write_pgm(&grid.snapshot(), &path) {
                frame_error = Some(CliError::Write { path, source });
                return ControlFlow::Break(());
            }
            frames_written += 1;
        }
        if stop.load(Ordering::SeqCst) {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    if let Some(e) = frame_error {
        return Err(e);
    }

    // ── Output ────────────────────────────────────────────────────────────
    snapshot::write_pgm(&grid.snapshot(), &args.output).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })?;

    let cells: snapshot::CellCounts = grid
        .count_cells(settings.output.free_threshold, settings.output.occupied_threshold)
        .into();
    info!(
        free = cells.free,
        unknown = cells.unknown,
        occupied = cells.occupied,
        "Cell classification"
    );

    let status = if stats.interrupted {
        "Stopped early".yellow().bold()
    } else {
        "Done".green().bold()
    };
    println!(
        "\n  {} {} scan(s), {} beam(s) ({} hit, {} skipped)",
        status,
        stats.scans_processed,
        stats.totals.beams,
        stats.totals.hits,
        stats.totals.skipped
    );
    println!(
        "  Cells: {} free, {} occupied, {} unknown",
        cells.free.to_string().green(),
        cells.occupied.to_string().red(),
        cells.unknown.to_string().dimmed()
    );
    println!("  Map written to {}", args.output.display().to_string().bold());
    if frames_written > 0 {
        println!(
            "  {} frame(s) written to {}",
            frames_written,
            args.frames_dir.display()
        );
    }

    let summary_path = args.summary.clone().or(settings.output.summary.clone());
    if let Some(path) = summary_path {
        let summary = snapshot::RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            log: args.log.clone(),
            map: args.output.clone(),
            association: cfg.association,
            width: cfg.grid.width,
            height: cfg.grid.height,
            resolution: cfg.grid.resolution,
            skipped_log_lines,
            frames_written,
            cells,
            stats,
        };
        snapshot::write_summary(&summary, &path).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
        println!("  Summary written to {}", path.display());
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "occugrid".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Log-odds occupancy grid mapper");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
