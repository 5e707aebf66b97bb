use crate::raster::SeedRaster;
use anyhow::Result;
use rand::distr::Uniform;
use rand::prelude::*;
use slime_common::{AgentRecord, HeadingInit, SpeciesPalette, Vec2};

/// A single moving point on the trail field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    pub pos: Vec2,
    /// Radians, kept in `[0, 2π)` after every steer.
    pub heading: f32,
    pub species: u32,
}

impl Agent {
    pub fn new(x: f32, y: f32, heading: f32, species: u32) -> Self {
        Self { pos: Vec2::new(x, y), heading, species }
    }

    pub fn record(&self) -> AgentRecord {
        AgentRecord { x: self.pos.x, y: self.pos.y, heading: self.heading, species: self.species }
    }
}

/// Seeds one agent per `spacing`-th raster pixel along each axis, classified to the nearest palette colour.
pub fn seed_agents(
    raster: &SeedRaster,
    palette: &SpeciesPalette,
    spacing: u32,
    heading: HeadingInit,
    seed: u64,
) -> Result<Vec<Agent>> {
    if spacing == 0 {
        anyhow::bail!("Agent spacing must be at least 1.");
    }
    let cols = raster.width().div_ceil(spacing) as usize;
    let rows = raster.height().div_ceil(spacing) as usize;
    let count = cols * rows;

    let mut agents = Vec::new();
    agents
        .try_reserve_exact(count)
        .map_err(|e| anyhow::anyhow!("Failed to allocate {} agents: {}", count, e))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let angle_dist = Uniform::new(0.0f32, std::f32::consts::TAU)?;

    for y in (0..raster.height()).step_by(spacing as usize) {
        for x in (0..raster.width()).step_by(spacing as usize) {
            let pixel = raster
                .pixel(x, y)
                .ok_or_else(|| anyhow::anyhow!("Seed pixel ({}, {}) out of range.", x, y))?;
            let angle = match heading {
                HeadingInit::Zero => 0.0,
                HeadingInit::Random => rng.sample(angle_dist),
            };
            agents.push(Agent::new(x as f32, y as f32, angle, palette.classify(pixel)));
        }
    }
    Ok(agents)
}

/// Number of agents of each species.
pub fn species_counts(agents: &[Agent], species_count: u32) -> Vec<usize> {
    let mut counts = vec![0usize; species_count as usize];
    for agent in agents {
        if let Some(c) = counts.get_mut(agent.species as usize) {
            *c += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_blue() -> SpeciesPalette {
        SpeciesPalette::new(vec![("red".into(), [255, 0, 0]), ("blue".into(), [0, 0, 255])]).unwrap()
    }

    #[test]
    fn two_pixel_raster_seeds_red_and_blue_agents() {
        let raster = SeedRaster::new(2, 1, vec![[255, 0, 0], [0, 0, 255]]).unwrap();
        let agents = seed_agents(&raster, &red_blue(), 1, HeadingInit::Zero, 7).unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0], Agent::new(0.0, 0.0, 0.0, 0));
        assert_eq!(agents[1], Agent::new(1.0, 0.0, 0.0, 1));
        assert_eq!(species_counts(&agents, 2), vec![1, 1]);
    }

    #[test]
    fn spacing_skips_pixels_in_both_axes() {
        let raster = SeedRaster::new(5, 3, vec![[250, 10, 10]; 15]).unwrap();
        let agents = seed_agents(&raster, &red_blue(), 2, HeadingInit::Zero, 0).unwrap();
        let positions: Vec<(f32, f32)> = agents.iter().map(|a| (a.pos.x, a.pos.y)).collect();
        assert_eq!(
            positions,
            vec![(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (0.0, 2.0), (2.0, 2.0), (4.0, 2.0)]
        );
        assert!(agents.iter().all(|a| a.species == 0));
    }

    #[test]
    fn random_headings_are_in_range_and_reproducible() {
        let raster = SeedRaster::new(8, 8, vec![[0, 0, 255]; 64]).unwrap();
        let a = seed_agents(&raster, &red_blue(), 1, HeadingInit::Random, 99).unwrap();
        let b = seed_agents(&raster, &red_blue(), 1, HeadingInit::Random, 99).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|agent| (0.0..std::f32::consts::TAU).contains(&agent.heading)));
        assert!(a.iter().any(|agent| agent.heading != 0.0));
    }
}
