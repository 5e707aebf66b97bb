use crate::codec::{ChannelLayout, PackedCell};
use serde::{Deserialize, Serialize};

/// Position, heading and species of one agent at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub species: u32,
}

/// The trail field at a specific tick, packed with the species channel codec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Number of committed ticks when the snapshot was taken.
    pub tick: u64,
    /// Accumulated simulated time.
    pub time: f32,
    pub width: u32,
    pub height: u32,
    pub species_count: u32,
    pub layout: ChannelLayout,
    /// Row-major packed cells, `width * height` entries.
    pub cells: Vec<PackedCell>,
    /// Sum of each species' intensity over the whole field, before packing.
    pub species_totals: Vec<f32>,
    /// Agents at the same tick, present only when requested in the output config.
    pub agents: Option<Vec<AgentRecord>>,
}

impl FieldSnapshot {
    /// Decoded intensity of `species` at cell (`x`, `y`), or `None` outside the grid.
    pub fn intensity(&self, x: u32, y: u32, species: u32) -> Option<u16> {
        if x >= self.width || y >= self.height || species >= self.species_count {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.cells.get(idx).map(|cell| self.layout.decode(cell, species))
    }

    /// True when the cell vector matches the stated grid size.
    pub fn is_consistent(&self) -> bool {
        self.cells.len() == self.width as usize * self.height as usize
            && self.species_totals.len() == self.species_count as usize
    }
}
