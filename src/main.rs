use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, trace, warn};
use slime_common::SimulationConfig;
use slime_engine::output::{save_agents_csv, save_snapshots, SnapshotFormat};
use slime_engine::{load_seed_image, CpuSimulation, SeedRaster, SnapshotRecorder, TickOutcome};
use std::path::PathBuf;
use std::time::Instant;

/// Headless slime mold runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(default_value = "config.toml")]
    config: PathBuf,

    /// Image the agent population is seeded from (palette bands if omitted)
    #[arg(long)]
    seed_image: Option<PathBuf>,

    /// Number of ticks to run (overrides timing.total_ticks)
    #[arg(long)]
    ticks: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Slime Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let config = SimulationConfig::load(&args.config)?;
    let total_ticks = args.ticks.unwrap_or(config.timing.total_ticks);
    let record_interval = config.timing.record_interval_ticks;

    if config.engine.threads > 0 {
        info!("Using a dedicated pool of {} threads.", config.engine.threads);
    } else {
        info!("Using {} Rayon threads.", rayon::current_num_threads());
    }

    // --- Initialize Simulation ---
    let mut sim = CpuSimulation::new(config)?;
    let (width, height) = (sim.params().width, sim.params().height);
    let raster = match &args.seed_image {
        Some(path) => {
            info!("Seeding from image {}", path.display());
            load_seed_image(path, width, height)?
        }
        None => {
            info!("No seed image given, seeding from palette bands.");
            SeedRaster::palette_bands(width, height, sim.palette())?
        }
    };
    if let Err(e) = sim.reload(&raster) {
        error!("Initial load failed: {}", e);
        return Err(e);
    }

    let output = sim.config().output.clone();
    let mut recorder = SnapshotRecorder::new(
        record_interval,
        sim.params().species_count,
        output.save_agents_in_snapshot,
    )?;

    // --- Initial Snapshot (tick = 0) ---
    if let Some(frame) = sim.frame() {
        recorder.record(&frame)?;
    }

    info!(
        "Running {} ticks, recording every {} ticks.",
        total_ticks, record_interval
    );
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut skipped = 0u64;

    for step in 0..total_ticks {
        let step_start_time = Instant::now();
        let outcome = sim.tick_clock(&mut recorder);
        let step_duration = step_start_time.elapsed();

        let tick = match outcome {
            TickOutcome::Advanced { tick } => tick,
            TickOutcome::Skipped { .. } => {
                skipped += 1;
                continue;
            }
            TickOutcome::Idle => {
                warn!("Engine is not loaded, stopping.");
                break;
            }
        };

        // Print status periodically
        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= 5.0;
        let is_record_step = recorder.is_due(tick);
        let is_last_step = step + 1 == total_ticks;

        if should_print_status || is_record_step || is_last_step {
            info!(
                "Tick [{}/{}] (t = {:.2}) | Agents: {} | Tick Time: {:6.2} ms | Elapsed: {:.2} s",
                tick,
                total_ticks,
                sim.sim_time(),
                sim.agent_count(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if let Some(field) = sim.field() {
                for species in 0..field.species_count() {
                    let stats = field.stats(species);
                    debug!(
                        "  {}: total {:.1}, mean {:.4}, max {:.1}",
                        sim.palette().name(species).unwrap_or("?"),
                        stats.total,
                        stats.mean,
                        stats.max
                    );
                }
            }
        } else {
            trace!("Tick [{}/{}] completed in {:.2} ms", tick, total_ticks, step_duration.as_secs_f64() * 1000.0);
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished {} ticks in {:.3} seconds ({} skipped).",
        sim.current_tick(),
        total_duration.as_secs_f64(),
        skipped
    );

    // --- Save Recorded Data ---
    if output.save_stats {
        let format = SnapshotFormat::from_config(output.format.as_deref());
        if let Err(e) = save_snapshots(recorder.snapshots(), format, &output.base_filename) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_agents {
        if let Some(agents) = sim.agents() {
            let filename = format!("{}_final_agents.csv", output.base_filename);
            if let Err(e) = save_agents_csv(agents, &filename) {
                error!("Error saving CSV file '{}': {:#}", filename, e);
            }
        }
    } else {
        info!("Skipping saving final agents as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
