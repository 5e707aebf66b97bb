//! Multi-species Physarum trail simulation on the CPU.
//!
//! Agents sense and steer on a shared trail field, deposit into it through an
//! atomic accumulation buffer, and the field is diffused and evaporated into a
//! rotating arena of buffers every tick.

pub mod agents;
pub mod cpu_state;
pub mod diffuse;
pub mod field;
pub mod grid;
pub mod output;
pub mod present;
pub mod raster;
pub mod simulation;
pub mod update;

pub use agents::{seed_agents, Agent};
pub use cpu_state::CpuState;
pub use field::{DepositAccumulator, FieldStore, SpeciesStats, TrailField};
pub use present::{FrameSink, FrameView, NullSink, SnapshotRecorder};
pub use raster::{load_seed_image, SeedRaster};
pub use simulation::{CpuSimulation, Phase, TickOutcome};
