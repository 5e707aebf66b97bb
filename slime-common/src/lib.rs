pub mod codec;
pub mod config;
pub mod palette;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use codec::{ChannelLayout, ChannelSlot, PackedCell, CHANNELS, MAX_ENCODED, MAX_SPECIES};
pub use config::{
    AgentConfig, BoundaryPolicy, DtSource, EngineConfig, GridConfig, HeadingInit, OutputConfig,
    SensingConfig, SimulationConfig, SpeciesConfig, TimingConfig, TrailConfig,
};
pub use palette::{Rgb, SpeciesPalette};
pub use sim_params::SimParams;
pub use snapshot::{AgentRecord, FieldSnapshot};
pub use vecmath::{angle_to_vec, clamp, normalize_angle, Vec2};
