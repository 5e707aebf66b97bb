use crate::agents::Agent;
use crate::field::TrailField;
use anyhow::Result;
use log::debug;
use slime_common::codec::pack_cells;
use slime_common::{ChannelLayout, FieldSnapshot};

/// The newest committed field, handed to the presentation stage after each tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub tick: u64,
    pub time: f64,
    pub field: &'a TrailField,
    pub agents: &'a [Agent],
}

/// Receives every committed frame. Errors are logged by the scheduler and never affect the simulation.
pub trait FrameSink {
    fn present(&mut self, frame: &FrameView<'_>) -> Result<()>;
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &FrameView<'_>) -> Result<()> {
        Ok(())
    }
}

/// Packs the field into a [`FieldSnapshot`] every `interval` ticks.
#[derive(Debug)]
pub struct SnapshotRecorder {
    interval: u64,
    layout: ChannelLayout,
    include_agents: bool,
    snapshots: Vec<FieldSnapshot>,
}

impl SnapshotRecorder {
    pub fn new(interval: u64, species_count: u32, include_agents: bool) -> Result<Self> {
        if interval == 0 {
            anyhow::bail!("Snapshot interval must be at least 1 tick.");
        }
        Ok(Self {
            interval,
            layout: ChannelLayout::for_species(species_count)?,
            include_agents,
            snapshots: Vec::new(),
        })
    }

    /// Records a frame regardless of the interval.
    pub fn record(&mut self, frame: &FrameView<'_>) -> Result<()> {
        let field = frame.field;
        let species_count = field.species_count();
        let species_totals = (0..species_count).map(|s| field.species_total(s) as f32).collect();
        let agents = if self.include_agents {
            Some(frame.agents.iter().map(Agent::record).collect())
        } else {
            None
        };
        debug!("Recording snapshot at tick {} (t = {:.2}).", frame.tick, frame.time);
        self.snapshots.push(FieldSnapshot {
            tick: frame.tick,
            time: frame.time as f32,
            width: field.width(),
            height: field.height(),
            species_count,
            layout: self.layout,
            cells: pack_cells(self.layout, field.data(), species_count),
            species_totals,
            agents,
        });
        Ok(())
    }

    /// True when the frame at `tick` falls on the recording interval.
    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    pub fn snapshots(&self) -> &[FieldSnapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<FieldSnapshot> {
        self.snapshots
    }
}

impl FrameSink for SnapshotRecorder {
    fn present(&mut self, frame: &FrameView<'_>) -> Result<()> {
        if self.is_due(frame.tick) {
            self.record(frame)?;
        }
        Ok(())
    }
}
