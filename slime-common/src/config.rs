use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::codec::{MAX_ENCODED, MAX_SPECIES};
use crate::palette::SpeciesPalette;
use crate::sim_params::SimParams;
use std::path::Path;

/// How positions and samples behave at the grid edges.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Toroidal domain: everything wraps modulo the grid size.
    #[default]
    Wrap,
    /// Positions are clamped inside the grid; off-grid samples read zero.
    Clamp,
    /// Positions bounce off the edges; off-grid samples read zero.
    Reflect,
}

/// Initial heading assigned to seeded agents.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeadingInit {
    #[default]
    Zero,
    Random,
}

/// Where the per-tick time delta comes from.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DtSource {
    #[default]
    Fixed,
    WallClock,
}

// Field resolution and edge behaviour
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default)]
    pub dt_source: DtSource,
    /// Fixed step, also used for the first wall-clock tick.
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Upper bound on a measured wall-clock step.
    #[serde(default = "default_max_dt")]
    pub max_dt: f32,
    #[serde(default = "default_total_ticks")]
    pub total_ticks: u64,
    #[serde(default = "default_record_interval")]
    pub record_interval_ticks: u64,
}

// Agent seeding and motion
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AgentConfig {
    /// Seed one agent every `spacing` pixels along each axis.
    #[serde(default = "default_spacing")]
    pub spacing: u32,
    #[serde(default)]
    pub heading: HeadingInit,
    #[serde(default = "default_agent_speed")]
    pub speed: f32,
    #[serde(default = "default_steer_speed")]
    pub steer_speed: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

// Sensor geometry
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SensingConfig {
    #[serde(default = "default_sensor_count")]
    pub sensor_count: u32,
    /// Offset of the outermost sensors from the heading, in radians.
    #[serde(default = "default_sense_angle")]
    pub angle: f32,
    #[serde(default = "default_sense_distance")]
    pub distance: f32,
    /// Side length of the square window summed at each sensor.
    #[serde(default = "default_sense_size")]
    pub window_size: u32,
}

// Trail deposit, diffusion and evaporation
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TrailConfig {
    #[serde(default = "default_diffuse_speed")]
    pub diffuse_speed: f32,
    /// Neighbourhood radius of the blur; 1 gives a 3x3 kernel.
    #[serde(default = "default_diffuse_radius")]
    pub diffuse_radius: u32,
    #[serde(default = "default_evaporate_speed")]
    pub evaporate_speed: f32,
    #[serde(default = "default_trail_weight")]
    pub deposit_weight: f32,
    #[serde(default = "default_max_intensity")]
    pub max_intensity: f32,
    /// Number of field buffers in the rotation (at least 2).
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,
}

/// One `[[species]]` entry: a name and its reference colour.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SpeciesConfig {
    pub name: String,
    pub color: [u8; 3],
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default = "default_true")]
    pub save_agents: bool,
    #[serde(default)]
    pub save_agents_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Execution settings
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct EngineConfig {
    /// Worker threads for a dedicated pool; 0 uses the global rayon pool.
    #[serde(default)]
    pub threads: usize,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub sensing: SensingConfig,
    #[serde(default)]
    pub trail: TrailConfig,
    #[serde(default = "default_species")]
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(text)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the kernels cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            anyhow::bail!("grid width and height must be greater than 0.");
        }
        let species = self.species.len() as u32;
        if species == 0 || species > MAX_SPECIES {
            anyhow::bail!("between 1 and {} species are supported, got {}.", MAX_SPECIES, species);
        }
        if self.sensing.sensor_count < 3 || self.sensing.sensor_count % 2 == 0 {
            anyhow::bail!("sensor_count must be an odd number of at least 3.");
        }
        if self.sensing.window_size == 0 {
            anyhow::bail!("sensing window_size must be at least 1.");
        }
        if self.trail.buffer_count < 2 {
            anyhow::bail!("trail buffer_count must be at least 2.");
        }
        if self.agents.spacing == 0 {
            anyhow::bail!("agent spacing must be at least 1.");
        }
        if self.timing.record_interval_ticks == 0 {
            anyhow::bail!("record_interval_ticks must be at least 1.");
        }
        if !(self.timing.dt.is_finite() && self.timing.dt > 0.0) {
            anyhow::bail!("dt must be positive and finite.");
        }
        if !(self.timing.max_dt.is_finite() && self.timing.max_dt > 0.0) {
            anyhow::bail!("max_dt must be positive and finite.");
        }
        if !(self.trail.max_intensity > 0.0 && self.trail.max_intensity <= MAX_ENCODED as f32) {
            anyhow::bail!("max_intensity must be in (0, {}].", MAX_ENCODED);
        }
        let rates = [
            ("agents.speed", self.agents.speed),
            ("agents.steer_speed", self.agents.steer_speed),
            ("sensing.angle", self.sensing.angle),
            ("sensing.distance", self.sensing.distance),
            ("trail.diffuse_speed", self.trail.diffuse_speed),
            ("trail.evaporate_speed", self.trail.evaporate_speed),
            ("trail.deposit_weight", self.trail.deposit_weight),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{} must be finite and non-negative, got {}.", name, value);
            }
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            // Grid
            width: self.grid.width,
            height: self.grid.height,
            boundary: self.grid.boundary,
            // Time
            dt: self.timing.dt,
            // Agents
            agent_speed: self.agents.speed,
            steer_speed: self.agents.steer_speed,
            seed: self.agents.seed,
            // Sensing
            sensor_count: self.sensing.sensor_count,
            sense_angle: self.sensing.angle,
            sense_distance: self.sensing.distance,
            sense_size: self.sensing.window_size,
            // Trail
            diffuse_speed: self.trail.diffuse_speed,
            diffuse_radius: self.trail.diffuse_radius,
            evaporate_speed: self.trail.evaporate_speed,
            trail_weight: self.trail.deposit_weight,
            max_intensity: self.trail.max_intensity,
            buffer_count: self.trail.buffer_count,
            species_count: self.species.len() as u32,
        }
    }

    /// Species palette in configuration order.
    pub fn palette(&self) -> Result<SpeciesPalette> {
        SpeciesPalette::from_config(&self.species)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            grid: GridConfig::default(),
            timing: TimingConfig::default(),
            agents: AgentConfig::default(),
            sensing: SensingConfig::default(),
            trail: TrailConfig::default(),
            species: default_species(),
            output: OutputConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { width: default_width(), height: default_height(), boundary: BoundaryPolicy::Wrap }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            dt_source: DtSource::Fixed,
            dt: default_dt(),
            max_dt: default_max_dt(),
            total_ticks: default_total_ticks(),
            record_interval_ticks: default_record_interval(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            spacing: default_spacing(),
            heading: HeadingInit::Zero,
            speed: default_agent_speed(),
            steer_speed: default_steer_speed(),
            seed: default_seed(),
        }
    }
}

impl Default for SensingConfig {
    fn default() -> Self {
        SensingConfig {
            sensor_count: default_sensor_count(),
            angle: default_sense_angle(),
            distance: default_sense_distance(),
            window_size: default_sense_size(),
        }
    }
}

impl Default for TrailConfig {
    fn default() -> Self {
        TrailConfig {
            diffuse_speed: default_diffuse_speed(),
            diffuse_radius: default_diffuse_radius(),
            evaporate_speed: default_evaporate_speed(),
            deposit_weight: default_trail_weight(),
            max_intensity: default_max_intensity(),
            buffer_count: default_buffer_count(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_stats: true,
            save_agents: true,
            save_agents_in_snapshot: false,
            format: None,
        }
    }
}

// Defaults mirror the reference slime parameters
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 960 }
fn default_dt() -> f32 { 1.0 }
fn default_max_dt() -> f32 { 0.1 }
fn default_total_ticks() -> u64 { 2000 }
fn default_record_interval() -> u64 { 50 }
fn default_spacing() -> u32 { 1 }
fn default_agent_speed() -> f32 { 0.5 }
fn default_steer_speed() -> f32 { 2.5 }
fn default_seed() -> u64 { 42 }
fn default_sensor_count() -> u32 { 3 }
fn default_sense_angle() -> f32 { 0.7 }
fn default_sense_distance() -> f32 { 5.0 }
fn default_sense_size() -> u32 { 5 }
fn default_diffuse_speed() -> f32 { 0.5 }
fn default_diffuse_radius() -> u32 { 1 }
fn default_evaporate_speed() -> f32 { 0.05 }
fn default_trail_weight() -> f32 { 1.0 }
fn default_max_intensity() -> f32 { MAX_ENCODED as f32 }
fn default_buffer_count() -> u32 { 2 }
fn default_base_filename() -> String { "slime".to_string() }
fn default_true() -> bool { true }

/// The eight reference colours, in species order.
pub fn default_species() -> Vec<SpeciesConfig> {
    [
        ("red", [255, 0, 0]),
        ("green", [0, 255, 0]),
        ("blue", [0, 0, 255]),
        ("white", [255, 255, 255]),
        ("black", [0, 0, 0]),
        ("magenta", [255, 0, 255]),
        ("cyan", [0, 255, 255]),
        ("yellow", [255, 255, 0]),
    ]
    .into_iter()
    .map(|(name, color)| SpeciesConfig { name: name.to_string(), color })
    .collect()
}
