use crate::agents::Agent;
use crate::field::{DepositAccumulator, FieldStore};
use anyhow::Result;
use slime_common::SimParams;

/// Holds every buffer of one loaded run on the CPU.
#[derive(Debug)]
pub struct CpuState {
    pub params: SimParams,

    // --- Ping-Pong Agent Buffers ---
    // Committed agents (current tick's input)
    pub agents_in: Vec<Agent>,
    // Scratch agents (current tick's output, next tick's input after commit)
    pub agents_out: Vec<Agent>,

    // --- Trail Field Arena ---
    pub fields: FieldStore,

    // --- Deposit counts (reset every tick, merged before diffusion) ---
    pub deposits: DepositAccumulator,
}

impl CpuState {
    /// Builds a complete context. Every allocation is fallible, so a failure
    /// leaves nothing half-built behind.
    pub fn new(params: SimParams, agents: Vec<Agent>) -> Result<Self> {
        if let Some(bad) = agents.iter().find(|a| a.species >= params.species_count) {
            anyhow::bail!("Agent species {} outside the {} configured species.", bad.species, params.species_count);
        }
        if let Some(bad) = agents.iter().find(|a| !a.pos.is_finite() || !a.heading.is_finite()) {
            anyhow::bail!("Agent state must be finite, got {:?}.", bad);
        }

        let mut agents_out = Vec::new();
        agents_out
            .try_reserve_exact(agents.len())
            .map_err(|e| anyhow::anyhow!("Failed to allocate {} scratch agents: {}", agents.len(), e))?;
        agents_out.extend_from_slice(&agents);

        let fields = FieldStore::try_new(&params)?;
        let deposits = DepositAccumulator::try_new(params.cell_count(), params.species_count)?;

        Ok(Self { params, agents_in: agents, agents_out, fields, deposits })
    }

    pub fn agent_count(&self) -> usize {
        self.agents_in.len()
    }

    /// Verifies every buffer a tick touches before any of them is written.
    pub fn check_shapes(&self) -> Result<()> {
        if self.agents_out.len() != self.agents_in.len() {
            anyhow::bail!(
                "Scratch agent buffer holds {} agents, expected {}.",
                self.agents_out.len(), self.agents_in.len()
            );
        }
        if !self.fields.is_uniform() {
            anyhow::bail!("Field buffers differ in shape.");
        }
        let read = self.fields.read();
        if read.width() != self.params.width
            || read.height() != self.params.height
            || read.species_count() != self.params.species_count
        {
            anyhow::bail!("Field buffers do not match the configured grid.");
        }
        if self.deposits.len() != self.params.field_len() {
            anyhow::bail!(
                "Deposit buffer holds {} counters, expected {}.",
                self.deposits.len(), self.params.field_len()
            );
        }
        Ok(())
    }

    /// Commits a tick: scratch agents become current and the field arena rotates.
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.agents_in, &mut self.agents_out);
        self.fields.rotate();
    }
}
