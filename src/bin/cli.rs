//! geoprox CLI - proximity detection over CSV point archives
//!
//! Usage:
//!   geoprox-cli run <points.csv> [--start <epoch>] [--end <epoch>] [options]
//!   geoprox-cli synth [--vehicles N] [--encounters K] [--output <file>]
//!
//! `run` streams a sorted point archive through the chunked detector and
//! writes the pair results as CSV; `synth` generates a seeded synthetic
//! archive with known close encounters for testing the pipeline end to end.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use geoprox::{
    CsvPointSource, DetectorConfig, ProximityRun, RunReport,
    synthetic::FleetScenario,
};

#[derive(Parser)]
#[command(name = "geoprox-cli")]
#[command(about = "Find vehicle pairs that came close in space and time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run proximity detection over a sorted CSV point archive
    Run {
        /// CSV file with header vehicle_id,timestamp,latitude,longitude,
        /// sorted by (timestamp, vehicle_id)
        points: PathBuf,

        /// Start of the time range (epoch seconds); defaults to the
        /// archive's first timestamp
        #[arg(long)]
        start: Option<i64>,

        /// End of the time range, exclusive (epoch seconds); defaults to
        /// just past the archive's last timestamp
        #[arg(long)]
        end: Option<i64>,

        /// Distance threshold in meters
        #[arg(long, default_value = "5.0")]
        distance: f64,

        /// Time threshold in seconds
        #[arg(long, default_value = "5")]
        time_window: i64,

        /// Grid cell size in meters (must exceed the distance threshold)
        #[arg(long, default_value = "12.0")]
        grid_cell: f64,

        /// Chunk size in hours
        #[arg(long, default_value = "24")]
        chunk_hours: i64,

        /// Checkpoint file for resumable runs
        #[arg(long, default_value = "geoprox_checkpoint.json")]
        checkpoint: PathBuf,

        /// Resume from an existing checkpoint
        #[arg(long)]
        resume: bool,

        /// Output CSV path for pair results
        #[arg(short, long, default_value = "proximity_pairs.csv")]
        output: PathBuf,
    },

    /// Generate a synthetic point archive with planted encounters
    Synth {
        /// Number of vehicles in the fleet
        #[arg(long, default_value = "20")]
        vehicles: u32,

        /// Fixes per vehicle
        #[arg(long, default_value = "200")]
        points: u32,

        /// Close encounters to plant between distinct pairs
        #[arg(long, default_value = "3")]
        encounters: u32,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output CSV path
        #[arg(short, long, default_value = "synthetic_points.csv")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            points,
            start,
            end,
            distance,
            time_window,
            grid_cell,
            chunk_hours,
            checkpoint,
            resume,
            output,
        } => run_detection(
            points, start, end, distance, time_window, grid_cell, chunk_hours, checkpoint, resume,
            output,
        ),
        Commands::Synth {
            vehicles,
            points,
            encounters,
            seed,
            output,
        } => run_synth(vehicles, points, encounters, seed, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_detection(
    points: PathBuf,
    start: Option<i64>,
    end: Option<i64>,
    distance: f64,
    time_window: i64,
    grid_cell: f64,
    chunk_hours: i64,
    checkpoint: PathBuf,
    resume: bool,
    output: PathBuf,
) -> geoprox::Result<()> {
    let config = DetectorConfig {
        distance_threshold_m: distance,
        time_threshold_s: time_window,
        grid_cell_size_m: grid_cell,
        chunk_size_s: chunk_hours * 3600,
        resume,
        ..DetectorConfig::default()
    };
    config.validate()?;

    let source = CsvPointSource::new(&points);
    let (range_start, range_end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            let scanned = source.time_range()?.unwrap_or((0, 0));
            (start.unwrap_or(scanned.0), end.unwrap_or(scanned.1))
        }
    };

    println!("Time range:        [{}, {})", range_start, range_end);
    println!("Distance threshold: {} m", config.distance_threshold_m);
    println!("Time threshold:     {} s", config.time_threshold_s);
    println!("Grid cell size:     {} m", config.grid_cell_size_m);
    println!("Chunk size:         {} h", chunk_hours);

    let mut run =
        ProximityRun::new(source, config, range_start, range_end)?.with_checkpoint(&checkpoint);

    // Operator interrupt stops cleanly after the in-flight chunk's
    // checkpoint is written.
    let cancel = run.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        log::warn!("could not install interrupt handler: {}", e);
    }

    let started = std::time::Instant::now();
    let report = run.run()?;
    print_summary(&report);
    println!("Elapsed:           {:.1} s", started.elapsed().as_secs_f64());

    let file = File::create(&output)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in &report.results {
        writer.serialize(row)?;
    }
    writer.flush()?;
    println!("\nSaved {} pairs to {}", report.results.len(), output.display());

    if report.cancelled {
        println!("Interrupted; rerun with --resume to continue.");
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(70));
    println!(
        "Chunks: {}/{} completed, {} failed{}",
        report.chunks_completed,
        report.chunks_total,
        report.chunks_failed.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    println!("Points processed:  {}", report.counters.points_processed);
    println!("Comparisons:       {}", report.counters.comparisons);
    println!("Proximity events:  {}", report.counters.events);
    println!(
        "Skipped records:   {} (+{} invalid points)",
        report.skipped_records, report.counters.skipped_points
    );
    println!("Unique pairs:      {}", report.unique_pairs);

    if !report.results.is_empty() {
        println!("\nTop pairs:");
        println!(
            "{:<10} {:<10} {:<8} {:<12} {:<12} {:<10} {:<10}",
            "Vehicle A", "Vehicle B", "Count", "MinDist(m)", "AvgDist(m)", "MinDT(s)", "AvgDT(s)"
        );
        for row in report.results.iter().take(20) {
            println!(
                "{:<10} {:<10} {:<8} {:<12.2} {:<12.2} {:<10} {:<10.2}",
                row.vehicle_a,
                row.vehicle_b,
                row.proximity_count,
                row.min_distance_m,
                row.avg_distance_m,
                row.min_time_diff_s,
                row.avg_time_diff_s
            );
        }
    }
    println!("{}", "=".repeat(70));
}

fn run_synth(
    vehicles: u32,
    points: u32,
    encounters: u32,
    seed: u64,
    output: PathBuf,
) -> geoprox::Result<()> {
    let scenario = FleetScenario {
        vehicle_count: vehicles,
        points_per_vehicle: points,
        planted_encounters: encounters,
        seed,
        ..FleetScenario::default()
    };
    let fleet = scenario.generate();

    let file = File::create(&output)?;
    let mut writer = csv::Writer::from_writer(file);
    for point in &fleet.points {
        writer.serialize(point)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} points for {} vehicles to {}",
        fleet.points.len(),
        vehicles,
        output.display()
    );
    println!("Planted encounters:");
    for pair in &fleet.expected_pairs {
        println!("  vehicles {} and {}", pair.a, pair.b);
    }
    Ok(())
}
