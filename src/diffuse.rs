use crate::field::TrailField;
use crate::grid::stencil_cell;
use anyhow::Result;
use rayon::prelude::*;
use slime_common::{clamp, SimParams};

/// Blurs `input` toward its neighbourhood mean, evaporates it, and writes the result to `output`.
///
/// Per species: `out = clamp(lerp(v, mean, diffuse * dt) - evaporate * dt, 0, max)`,
/// with the mean taken over a `(2r + 1)^2` stencil.
pub fn diffuse_and_evaporate(input: &TrailField, output: &mut TrailField, params: &SimParams, dt: f32) -> Result<()> {
    if !input.same_shape(output) {
        anyhow::bail!("Diffusion source and target differ in shape.");
    }
    if input.width() != params.width || input.height() != params.height || input.species_count() != params.species_count {
        anyhow::bail!("Diffusion buffers do not match the configured grid.");
    }

    let width = params.width as usize;
    let species = params.species_count as usize;
    let radius = params.diffuse_radius as i64;
    let taps = ((2 * radius + 1) * (2 * radius + 1)) as f32;
    let blend = clamp(params.diffuse_speed * dt, 0.0, 1.0);
    let decay = params.evaporate_speed * dt;
    let max = params.max_intensity;

    output
        .data_mut()
        .par_chunks_mut(width * species)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, out_cell) in row.chunks_mut(species).enumerate() {
                let x = x as i64;
                let center = y as usize * width + x as usize;
                for (s, out) in out_cell.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for dy in -radius..=radius {
                        for dx in -radius..=radius {
                            sum += input.at(stencil_cell(x + dx, y + dy, params), s as u32);
                        }
                    }
                    let value = input.at(center, s as u32);
                    let blended = value + (sum / taps - value) * blend;
                    *out = clamp(blended - decay, 0.0, max);
                }
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slime_common::{BoundaryPolicy, SimulationConfig};

    fn params(diffuse: f32, evaporate: f32) -> SimParams {
        let mut config = SimulationConfig::default();
        config.grid.width = 6;
        config.grid.height = 5;
        config.species.truncate(2);
        config.trail.diffuse_speed = diffuse;
        config.trail.evaporate_speed = evaporate;
        config.get_sim_params()
    }

    fn run(field: &TrailField, p: &SimParams, dt: f32) -> TrailField {
        let mut out = TrailField::try_new(field.width(), field.height(), field.species_count()).unwrap();
        diffuse_and_evaporate(field, &mut out, p, dt).unwrap();
        out
    }

    #[test]
    fn wrap_diffusion_conserves_total_intensity() {
        let p = params(0.8, 0.0);
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(0, 0, 0, 100.0).unwrap();
        field.set(5, 4, 1, 40.0).unwrap();
        field.set(2, 3, 0, 7.5).unwrap();
        let before = field.total();
        for _ in 0..25 {
            field = run(&field, &p, 1.0);
            assert!((field.total() - before).abs() < 1e-2, "total drifted to {}", field.total());
        }
        assert!(field.get(3, 2, 0).unwrap() > 0.0);
    }

    #[test]
    fn evaporation_alone_decays_monotonically_to_zero() {
        let p = params(0.0, 0.25);
        let dt = 1.0;
        let initial = 2.0f32;
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(1, 1, 0, initial).unwrap();
        let limit = (initial / (p.evaporate_speed * dt)).ceil() as usize;
        let mut previous = initial;
        for _ in 0..limit {
            field = run(&field, &p, dt);
            let now = field.get(1, 1, 0).unwrap();
            assert!(now <= previous);
            previous = now;
        }
        assert_eq!(previous, 0.0);
        assert_eq!(field.total(), 0.0);
    }

    #[test]
    fn full_blend_replaces_value_with_neighbourhood_mean() {
        let p = params(1.0, 0.0);
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(2, 2, 1, 9.0).unwrap();
        let out = run(&field, &p, 1.0);
        for y in 1..=3 {
            for x in 1..=3 {
                assert!((out.get(x, y, 1).unwrap() - 1.0).abs() < 1e-6);
            }
        }
        assert_eq!(out.get(0, 0, 1), Some(0.0));
        assert_eq!(out.get(2, 2, 0), Some(0.0));
    }

    #[test]
    fn clamp_policy_samples_edge_cells() {
        let mut p = params(1.0, 0.0);
        p.boundary = BoundaryPolicy::Clamp;
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(0, 0, 0, 9.0).unwrap();
        let out = run(&field, &p, 1.0);
        // Corner stencil reads (0,0) four times
        assert!((out.get(0, 0, 0).unwrap() - 4.0).abs() < 1e-6);
        assert_eq!(out.get(5, 4, 0), Some(0.0));
    }

    #[test]
    fn output_is_clamped_to_max_intensity() {
        let mut p = params(0.0, 0.0);
        p.max_intensity = 10.0;
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(3, 3, 0, 50.0).unwrap();
        let out = run(&field, &p, 1.0);
        assert_eq!(out.get(3, 3, 0), Some(10.0));
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let p = params(0.5, 0.05);
        let mut field = TrailField::try_new(6, 5, 2).unwrap();
        field.set(4, 1, 1, 33.0).unwrap();
        assert_eq!(run(&field, &p, 0.7), run(&field, &p, 0.7));
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let p = params(0.5, 0.05);
        let field = TrailField::try_new(6, 5, 2).unwrap();
        let mut wrong = TrailField::try_new(5, 5, 2).unwrap();
        assert!(diffuse_and_evaporate(&field, &mut wrong, &p, 1.0).is_err());
    }
}
