use crate::config::BoundaryPolicy;
use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, read by both kernels every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    // Grid
    pub width: u32,
    pub height: u32,
    pub boundary: BoundaryPolicy,

    // Time
    pub dt: f32,

    // Agents
    pub agent_speed: f32,
    pub steer_speed: f32,
    pub seed: u64,

    // Sensing
    pub sensor_count: u32,
    pub sense_angle: f32,
    pub sense_distance: f32,
    pub sense_size: u32,

    // Trail
    pub diffuse_speed: f32,
    pub diffuse_radius: u32,
    pub evaporate_speed: f32,
    pub trail_weight: f32,
    pub max_intensity: f32,
    pub buffer_count: u32,
    pub species_count: u32,
}

impl SimParams {
    /// Number of grid cells.
    #[inline(always)]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of f32 intensities in one field buffer.
    #[inline(always)]
    pub fn field_len(&self) -> usize {
        self.cell_count() * self.species_count as usize
    }
}
