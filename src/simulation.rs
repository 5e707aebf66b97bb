use crate::agents::{seed_agents, species_counts, Agent};
use crate::cpu_state::CpuState;
use crate::diffuse::diffuse_and_evaporate;
use crate::field::TrailField;
use crate::present::{FrameSink, FrameView};
use crate::raster::SeedRaster;
use crate::update::update_agents;
use anyhow::Result;
use log::{debug, info, trace, warn};
use slime_common::{DtSource, SimParams, SimulationConfig, SpeciesPalette};
use std::time::Instant;

/// Lifecycle of the engine. `Reloading` is only observable while a reload is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    Reloading,
    Loaded,
}

/// Result of one call to [`CpuSimulation::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing is loaded; the tick was a no-op.
    Idle,
    /// The tick committed; `tick` is the new tick count.
    Advanced { tick: u64 },
    /// A pass could not begin; committed state is unchanged.
    Skipped { reason: String },
}

/// Manages the engine context and sequences the per-tick passes on the CPU.
pub struct CpuSimulation {
    /// The simulation configuration.
    config: SimulationConfig,
    /// Parameters derived from `config`, copied into each new context.
    params: SimParams,
    palette: SpeciesPalette,
    /// The loaded run, if any.
    state: Option<CpuState>,
    phase: Phase,
    /// Dedicated worker pool, when `engine.threads` is non-zero.
    pool: Option<rayon::ThreadPool>,
    /// Committed ticks since the last reload.
    current_tick: u64,
    /// Simulated time since the last reload.
    sim_time: f64,
    /// Start of the previous wall-clock tick.
    last_clock: Option<Instant>,
}

impl CpuSimulation {
    /// Creates an unloaded engine from a validated configuration.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        let palette = config.palette()?;
        let pool = if config.engine.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.engine.threads)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build thread pool: {}", e))?;
            Some(pool)
        } else {
            None
        };
        debug!("Simulation Parameters: {:#?}", params);

        Ok(Self {
            config,
            params,
            palette,
            state: None,
            phase: Phase::Unloaded,
            pool,
            current_tick: 0,
            sim_time: 0.0,
            last_clock: None,
        })
    }

    /// Replaces the whole run with one seeded from `raster`.
    ///
    /// The new context is fully built before the old one is dropped. On error the
    /// previous phase and state are kept as they were.
    pub fn reload(&mut self, raster: &SeedRaster) -> Result<()> {
        let previous = self.phase;
        self.phase = Phase::Reloading;
        match self.build_state(raster) {
            Ok(state) => {
                info!(
                    "Loaded {} agents on a {}x{} field ({} species, {} buffers).",
                    state.agent_count(),
                    self.params.width,
                    self.params.height,
                    self.params.species_count,
                    state.fields.len()
                );
                debug!(
                    "Agents per species: {:?}",
                    species_counts(&state.agents_in, self.params.species_count)
                );
                self.state = Some(state);
                self.phase = Phase::Loaded;
                self.current_tick = 0;
                self.sim_time = 0.0;
                self.last_clock = None;
                Ok(())
            }
            Err(e) => {
                self.phase = previous;
                Err(e)
            }
        }
    }

    fn build_state(&self, raster: &SeedRaster) -> Result<CpuState> {
        if raster.width() != self.params.width || raster.height() != self.params.height {
            anyhow::bail!(
                "Seed raster is {}x{}, the grid is {}x{}.",
                raster.width(), raster.height(), self.params.width, self.params.height
            );
        }
        let agents_cfg = &self.config.agents;
        let agents = seed_agents(raster, &self.palette, agents_cfg.spacing, agents_cfg.heading, agents_cfg.seed)?;
        CpuState::new(self.params.clone(), agents)
    }

    /// Drops the loaded run and returns to `Unloaded`.
    pub fn unload(&mut self) {
        if self.state.take().is_some() {
            info!("Simulation unloaded after {} ticks.", self.current_tick);
        }
        self.phase = Phase::Unloaded;
        self.current_tick = 0;
        self.sim_time = 0.0;
        self.last_clock = None;
    }

    /// Advances the simulation by `dt` and presents the newest field to `sink`.
    pub fn tick(&mut self, dt: f32, sink: &mut dyn FrameSink) -> TickOutcome {
        let tick = self.current_tick;
        let Some(state) = self.state.as_mut() else {
            return TickOutcome::Idle;
        };
        if self.phase != Phase::Loaded {
            return TickOutcome::Idle;
        }

        let start = Instant::now();
        let result = match &self.pool {
            Some(pool) => pool.install(|| run_passes(state, dt, tick)),
            None => run_passes(state, dt, tick),
        };
        if let Err(e) = result {
            warn!("Skipping tick {}: {}", tick + 1, e);
            return TickOutcome::Skipped { reason: e.to_string() };
        }

        // --- Commit: scratch outputs become the committed pair ---
        state.swap_buffers();
        self.current_tick += 1;
        self.sim_time += dt as f64;
        trace!("Tick {} committed in {:.3} ms", self.current_tick, start.elapsed().as_secs_f64() * 1000.0);

        let frame = FrameView {
            tick: self.current_tick,
            time: self.sim_time,
            field: state.fields.read(),
            agents: &state.agents_in,
        };
        if let Err(e) = sink.present(&frame) {
            warn!("Presentation failed at tick {}: {}", self.current_tick, e);
        }

        TickOutcome::Advanced { tick: self.current_tick }
    }

    /// Ticks with the step size given by the configured time source.
    pub fn tick_clock(&mut self, sink: &mut dyn FrameSink) -> TickOutcome {
        let dt = self.next_dt(Instant::now());
        self.tick(dt, sink)
    }

    /// Fixed: the configured `dt`. Wall clock: time since the previous call,
    /// capped at `max_dt`, with the configured `dt` for the first call.
    fn next_dt(&mut self, now: Instant) -> f32 {
        let timing = &self.config.timing;
        match timing.dt_source {
            DtSource::Fixed => timing.dt,
            DtSource::WallClock => {
                let dt = match self.last_clock {
                    Some(previous) => (now.duration_since(previous).as_secs_f32()).min(timing.max_dt),
                    None => timing.dt.min(timing.max_dt),
                };
                self.last_clock = Some(now);
                dt
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Provides access to the simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Provides access to the simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn palette(&self) -> &SpeciesPalette {
        &self.palette
    }

    /// Committed agents, when loaded.
    pub fn agents(&self) -> Option<&[Agent]> {
        self.state.as_ref().map(|s| s.agents_in.as_slice())
    }

    /// Committed (most recently presented) field, when loaded.
    pub fn field(&self) -> Option<&TrailField> {
        self.state.as_ref().map(|s| s.fields.read())
    }

    /// Current committed frame, for presenting state outside of a tick.
    pub fn frame(&self) -> Option<FrameView<'_>> {
        self.state.as_ref().map(|s| FrameView {
            tick: self.current_tick,
            time: self.sim_time,
            field: s.fields.read(),
            agents: &s.agents_in,
        })
    }

    pub fn agent_count(&self) -> usize {
        self.state.as_ref().map_or(0, CpuState::agent_count)
    }

    pub fn state(&self) -> Option<&CpuState> {
        self.state.as_ref()
    }

    /// Mutable access to the loaded context, for seeding fields by hand.
    pub fn state_mut(&mut self) -> Option<&mut CpuState> {
        self.state.as_mut()
    }
}

/// Runs every pass of one tick into scratch buffers. Nothing committed is
/// written before all preconditions have been checked.
fn run_passes(state: &mut CpuState, dt: f32, tick: u64) -> Result<()> {
    if !dt.is_finite() || dt < 0.0 {
        anyhow::bail!("time step must be finite and non-negative, got {}", dt);
    }
    state.check_shapes()?;

    // --- 1. Agent update: sense, steer, move, deposit (parallel over agents) ---
    state.deposits.reset();
    update_agents(
        &state.agents_in,
        &mut state.agents_out,
        state.fields.read(),
        &state.deposits,
        &state.params,
        dt,
        tick,
    )?;

    // --- 2. Merge deposits on top of the read field into the write field ---
    let weight = state.params.trail_weight;
    let max = state.params.max_intensity;
    let (read, write) = state.fields.read_and_write_mut()?;
    state.deposits.merge_into(read, write, weight, max)?;

    // --- 3. Diffuse and evaporate the write field into the next read field ---
    let (source, target) = state.fields.write_and_target_mut()?;
    diffuse_and_evaporate(source, target, &state.params, dt)?;

    Ok(())
}
