use slime_common::{angle_to_vec, normalize_angle, BoundaryPolicy, SimParams, Vec2};

// Calculates the 1D row-major index of cell (x, y)
#[inline(always)]
pub fn cell_index(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Wraps an integer coordinate into `[0, size)`.
#[inline(always)]
pub fn wrap_coord(v: i64, size: u32) -> u32 {
    v.rem_euclid(size as i64) as u32
}

/// Wraps a continuous coordinate into `[0, size)`.
#[inline(always)]
pub fn wrap_position(v: f32, size: u32) -> f32 {
    let size = size as f32;
    let wrapped = v.rem_euclid(size);
    // rem_euclid can land exactly on `size` for tiny negative inputs
    if wrapped >= size { 0.0 } else { wrapped }
}

/// Largest representable coordinate strictly below `size`.
#[inline(always)]
fn inside_limit(size: u32) -> f32 {
    let size = size as f32;
    size - size * f32::EPSILON
}

/// Resolves a sensing sample at integer cell coordinates.
/// Wrap maps the cell onto the torus; Clamp and Reflect treat off-grid cells as absent.
#[inline(always)]
pub fn resolve_cell(x: i64, y: i64, params: &SimParams) -> Option<usize> {
    match params.boundary {
        BoundaryPolicy::Wrap => Some(cell_index(
            wrap_coord(x, params.width),
            wrap_coord(y, params.height),
            params.width,
        )),
        BoundaryPolicy::Clamp | BoundaryPolicy::Reflect => {
            if x < 0 || y < 0 || x >= params.width as i64 || y >= params.height as i64 {
                None
            } else {
                Some(cell_index(x as u32, y as u32, params.width))
            }
        }
    }
}

/// Resolves a diffusion stencil tap: toroidal for Wrap, clamp-to-edge otherwise.
#[inline(always)]
pub fn stencil_cell(x: i64, y: i64, params: &SimParams) -> usize {
    match params.boundary {
        BoundaryPolicy::Wrap => cell_index(
            wrap_coord(x, params.width),
            wrap_coord(y, params.height),
            params.width,
        ),
        BoundaryPolicy::Clamp | BoundaryPolicy::Reflect => cell_index(
            x.clamp(0, params.width as i64 - 1) as u32,
            y.clamp(0, params.height as i64 - 1) as u32,
            params.width,
        ),
    }
}

/// Cell containing an in-grid position.
#[inline(always)]
pub fn position_to_cell(pos: Vec2, params: &SimParams) -> usize {
    let x = (pos.x.floor().max(0.0) as u32).min(params.width - 1);
    let y = (pos.y.floor().max(0.0) as u32).min(params.height - 1);
    cell_index(x, y, params.width)
}

/// Brings a moved position back inside the grid according to the boundary policy.
/// Reflect mirrors the heading component normal to each crossed edge.
pub fn apply_boundary(pos: Vec2, heading: f32, params: &SimParams) -> (Vec2, f32) {
    match params.boundary {
        BoundaryPolicy::Wrap => (
            Vec2::new(wrap_position(pos.x, params.width), wrap_position(pos.y, params.height)),
            heading,
        ),
        BoundaryPolicy::Clamp => (
            Vec2::new(
                pos.x.clamp(0.0, inside_limit(params.width)),
                pos.y.clamp(0.0, inside_limit(params.height)),
            ),
            heading,
        ),
        BoundaryPolicy::Reflect => {
            let width = params.width as f32;
            let height = params.height as f32;
            let mut reflected = pos;
            let mut dir = angle_to_vec(heading);
            let mut flipped = false;

            if reflected.x < 0.0 {
                reflected.x = -reflected.x;
                dir.x = -dir.x;
                flipped = true;
            } else if reflected.x >= width {
                reflected.x = 2.0 * width - reflected.x;
                dir.x = -dir.x;
                flipped = true;
            }
            if reflected.y < 0.0 {
                reflected.y = -reflected.y;
                dir.y = -dir.y;
                flipped = true;
            } else if reflected.y >= height {
                reflected.y = 2.0 * height - reflected.y;
                dir.y = -dir.y;
                flipped = true;
            }

            // A step longer than the grid can still overshoot after one mirror
            reflected.x = reflected.x.clamp(0.0, inside_limit(params.width));
            reflected.y = reflected.y.clamp(0.0, inside_limit(params.height));

            let new_heading = if flipped {
                normalize_angle(dir.y.atan2(dir.x))
            } else {
                heading
            };
            (reflected, new_heading)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slime_common::SimulationConfig;
    use std::f32::consts::PI;

    fn params(boundary: BoundaryPolicy) -> SimParams {
        let mut config = SimulationConfig::default();
        config.grid.width = 10;
        config.grid.height = 4;
        config.grid.boundary = boundary;
        config.get_sim_params()
    }

    #[test]
    fn wrap_moves_across_the_right_edge() {
        let p = params(BoundaryPolicy::Wrap);
        let moved = Vec2::new(10.0 - 0.1 + 0.2, 1.0);
        let (pos, heading) = apply_boundary(moved, 0.0, &p);
        assert!((pos.x - 0.1).abs() < 1e-4, "x = {}", pos.x);
        assert_eq!(heading, 0.0);

        let (pos, _) = apply_boundary(Vec2::new(-0.5, -0.25), 0.0, &p);
        assert!((pos.x - 9.5).abs() < 1e-5);
        assert!((pos.y - 3.75).abs() < 1e-5);
    }

    #[test]
    fn wrap_position_never_returns_size() {
        assert!(wrap_position(-1e-9, 10) < 10.0);
        assert_eq!(wrap_position(10.0, 10), 0.0);
    }

    #[test]
    fn clamp_keeps_positions_strictly_inside() {
        let p = params(BoundaryPolicy::Clamp);
        let (pos, _) = apply_boundary(Vec2::new(12.0, -3.0), 1.0, &p);
        assert!(pos.x < 10.0 && pos.x > 9.99);
        assert_eq!(pos.y, 0.0);
        assert_eq!(position_to_cell(pos, &p), cell_index(9, 0, 10));
    }

    #[test]
    fn reflect_mirrors_position_and_heading() {
        let p = params(BoundaryPolicy::Reflect);
        let (pos, heading) = apply_boundary(Vec2::new(10.5, 2.0), 0.0, &p);
        assert!((pos.x - 9.5).abs() < 1e-5);
        assert!((heading - PI).abs() < 1e-5);

        let (pos, heading) = apply_boundary(Vec2::new(3.0, -0.5), 3.0 * PI / 2.0, &p);
        assert!((pos.y - 0.5).abs() < 1e-5);
        assert!((heading - PI / 2.0).abs() < 1e-4);
    }

    #[test]
    fn sensing_outside_is_absent_unless_wrapping() {
        let wrap = params(BoundaryPolicy::Wrap);
        assert_eq!(resolve_cell(-1, 0, &wrap), Some(cell_index(9, 0, 10)));
        assert_eq!(resolve_cell(10, 4, &wrap), Some(0));

        let clamp = params(BoundaryPolicy::Clamp);
        assert_eq!(resolve_cell(-1, 0, &clamp), None);
        assert_eq!(resolve_cell(3, 3, &clamp), Some(cell_index(3, 3, 10)));
    }

    #[test]
    fn stencil_clamps_to_edge_for_non_wrapping_policies() {
        let reflect = params(BoundaryPolicy::Reflect);
        assert_eq!(stencil_cell(-1, -1, &reflect), 0);
        assert_eq!(stencil_cell(10, 4, &reflect), cell_index(9, 3, 10));
        let wrap = params(BoundaryPolicy::Wrap);
        assert_eq!(stencil_cell(10, 4, &wrap), 0);
    }
}
