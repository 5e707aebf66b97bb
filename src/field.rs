//! Trail field storage.
//!
//! A [`TrailField`] holds `species_count` f32 intensities per cell, cell-major.
//! [`FieldStore`] owns an index-rotated arena of N >= 2 such buffers, and
//! [`DepositAccumulator`] collects per-tick deposit counts with atomic adds so
//! that concurrent agents landing on one cell never lose a deposit.

use anyhow::Result;
use rayon::prelude::*;
use slime_common::SimParams;
use std::sync::atomic::{AtomicU32, Ordering};

/// Aggregate intensity of one species over the whole field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesStats {
    pub total: f64,
    pub mean: f64,
    pub max: f32,
}

/// One field buffer: `width * height` cells of `species_count` intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailField {
    width: u32,
    height: u32,
    species_count: u32,
    data: Vec<f32>,
}

impl TrailField {
    /// Allocates a zeroed field, reporting allocation failure instead of aborting.
    pub fn try_new(width: u32, height: u32, species_count: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|cells| cells.checked_mul(species_count as usize))
            .ok_or_else(|| anyhow::anyhow!("Field size {}x{}x{} overflows.", width, height, species_count))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| anyhow::anyhow!("Failed to allocate trail field of {} values: {}", len, e))?;
        data.resize(len, 0.0);
        Ok(Self { width, height, species_count, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn species_count(&self) -> u32 {
        self.species_count
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Intensity of `species` in cell `cell`.
    #[inline(always)]
    pub fn at(&self, cell: usize, species: u32) -> f32 {
        self.data[cell * self.species_count as usize + species as usize]
    }

    pub fn get(&self, x: u32, y: u32, species: u32) -> Option<f32> {
        if x >= self.width || y >= self.height || species >= self.species_count {
            return None;
        }
        Some(self.at(y as usize * self.width as usize + x as usize, species))
    }

    pub fn set(&mut self, x: u32, y: u32, species: u32, value: f32) -> Result<()> {
        if x >= self.width || y >= self.height || species >= self.species_count {
            anyhow::bail!(
                "Cell ({}, {}) species {} outside {}x{} field with {} species.",
                x, y, species, self.width, self.height, self.species_count
            );
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.species_count as usize
            + species as usize;
        self.data[idx] = value;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.par_iter_mut().for_each(|v| *v = 0.0);
    }

    /// Cell-major intensities.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// True when both buffers have the same grid and species count.
    pub fn same_shape(&self, other: &TrailField) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.species_count == other.species_count
            && self.data.len() == other.data.len()
    }

    /// Sum of all intensities, every species included.
    pub fn total(&self) -> f64 {
        self.data.par_iter().map(|&v| v as f64).sum()
    }

    pub fn species_total(&self, species: u32) -> f64 {
        self.stats(species).total
    }

    pub fn stats(&self, species: u32) -> SpeciesStats {
        let stride = self.species_count as usize;
        if species >= self.species_count || stride == 0 {
            return SpeciesStats { total: 0.0, mean: 0.0, max: 0.0 };
        }
        let (total, max) = self
            .data
            .par_chunks(stride)
            .map(|cell| cell[species as usize])
            .fold(|| (0.0f64, 0.0f32), |(sum, max), v| (sum + v as f64, max.max(v)))
            .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1.max(b.1)));
        let cells = self.cell_count().max(1) as f64;
        SpeciesStats { total, mean: total / cells, max }
    }
}

/// Selects two distinct buffers of the arena, one shared and one mutable.
fn split_pair(buffers: &mut [TrailField], src: usize, dst: usize) -> Result<(&TrailField, &mut TrailField)> {
    if src == dst {
        anyhow::bail!("Field buffer {} cannot be both source and target.", src);
    }
    if src >= buffers.len() || dst >= buffers.len() {
        anyhow::bail!("Field buffer pair ({}, {}) outside arena of {}.", src, dst, buffers.len());
    }
    if src < dst {
        let (head, tail) = buffers.split_at_mut(dst);
        Ok((&head[src], &mut tail[0]))
    } else {
        let (head, tail) = buffers.split_at_mut(src);
        Ok((&tail[0], &mut head[dst]))
    }
}

/// Index-rotated arena of N >= 2 trail field buffers.
///
/// Per tick, deposits land in `write`, diffusion reads `write` and fills
/// `target = (write + 1) % N`, and [`FieldStore::rotate`] then makes `target`
/// the new read buffer.
#[derive(Debug)]
pub struct FieldStore {
    buffers: Vec<TrailField>,
    read: usize,
    write: usize,
}

impl FieldStore {
    pub fn try_new(params: &SimParams) -> Result<Self> {
        let count = params.buffer_count as usize;
        if count < 2 {
            anyhow::bail!("At least 2 field buffers are required, got {}.", count);
        }
        let mut buffers = Vec::new();
        buffers
            .try_reserve_exact(count)
            .map_err(|e| anyhow::anyhow!("Failed to allocate field arena: {}", e))?;
        for _ in 0..count {
            buffers.push(TrailField::try_new(params.width, params.height, params.species_count)?);
        }
        Ok(Self { buffers, read: 0, write: 1 })
    }

    /// Number of buffers in the rotation.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    /// Buffer the diffusion pass fills this tick.
    pub fn target_index(&self) -> usize {
        (self.write + 1) % self.buffers.len()
    }

    /// The committed field: agents sense it and it is presented after a tick.
    pub fn read(&self) -> &TrailField {
        &self.buffers[self.read]
    }

    pub fn write(&self) -> &TrailField {
        &self.buffers[self.write]
    }

    pub fn buffer(&self, index: usize) -> Option<&TrailField> {
        self.buffers.get(index)
    }

    pub fn read_mut(&mut self) -> &mut TrailField {
        &mut self.buffers[self.read]
    }

    /// Read buffer for the deposit merge source, write buffer as its destination.
    pub fn read_and_write_mut(&mut self) -> Result<(&TrailField, &mut TrailField)> {
        split_pair(&mut self.buffers, self.read, self.write)
    }

    /// Write buffer as the diffusion source, target buffer as its destination.
    pub fn write_and_target_mut(&mut self) -> Result<(&TrailField, &mut TrailField)> {
        let target = self.target_index();
        split_pair(&mut self.buffers, self.write, target)
    }

    /// Commits a tick: the diffusion target becomes the read buffer.
    pub fn rotate(&mut self) {
        let target = self.target_index();
        self.read = target;
        self.write = (target + 1) % self.buffers.len();
    }

    /// True when every buffer has the same shape as the read buffer.
    pub fn is_uniform(&self) -> bool {
        let first = &self.buffers[self.read];
        self.buffers.iter().all(|b| b.same_shape(first))
    }
}

/// Per-tick deposit counts, one atomic counter per cell and species.
#[derive(Debug)]
pub struct DepositAccumulator {
    species_count: u32,
    counts: Vec<AtomicU32>,
}

impl DepositAccumulator {
    pub fn try_new(cell_count: usize, species_count: u32) -> Result<Self> {
        let len = cell_count
            .checked_mul(species_count as usize)
            .ok_or_else(|| anyhow::anyhow!("Deposit buffer size overflows."))?;
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(len)
            .map_err(|e| anyhow::anyhow!("Failed to allocate deposit buffer of {} counters: {}", len, e))?;
        counts.extend((0..len).map(|_| AtomicU32::new(0)));
        Ok(Self { species_count, counts })
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn reset(&self) {
        self.counts.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
    }

    /// Records one deposit. Safe to call from many threads at once.
    #[inline(always)]
    pub fn add(&self, cell: usize, species: u32) {
        debug_assert!(species < self.species_count, "species {} out of range", species);
        let idx = cell * self.species_count as usize + species as usize;
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, cell: usize, species: u32) -> u32 {
        self.counts[cell * self.species_count as usize + species as usize].load(Ordering::Relaxed)
    }

    /// Writes `min(read + count * weight, max)` into every value of `write`.
    pub fn merge_into(&self, read: &TrailField, write: &mut TrailField, weight: f32, max: f32) -> Result<()> {
        if !read.same_shape(write) || read.data.len() != self.counts.len() {
            anyhow::bail!(
                "Deposit merge shape mismatch: read {}, write {}, counts {}.",
                read.data.len(), write.data.len(), self.counts.len()
            );
        }
        let stride = self.species_count as usize;
        write
            .data
            .par_chunks_mut(stride)
            .zip(read.data.par_chunks(stride))
            .zip(self.counts.par_chunks(stride))
            .for_each(|((out, prev), counts)| {
                for ((o, &p), c) in out.iter_mut().zip(prev).zip(counts) {
                    let added = c.load(Ordering::Relaxed) as f32 * weight;
                    *o = (p + added).min(max);
                }
            });
        Ok(())
    }
}
