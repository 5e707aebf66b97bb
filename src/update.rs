//! Agent update kernel: sense, steer, move and deposit, in parallel over agents.

use crate::agents::Agent;
use crate::field::{DepositAccumulator, TrailField};
use crate::grid::{apply_boundary, position_to_cell, resolve_cell};
use anyhow::Result;
use rand::prelude::*;
use rayon::prelude::*;
use slime_common::{angle_to_vec, normalize_angle, SimParams, Vec2};

/// Best reading on each side of the heading plus the forward reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub left: f32,
    pub forward: f32,
    pub right: f32,
}

/// Steering decision derived from one set of readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Straight,
    Left,
    Right,
    /// Left and right tie above forward; the side is drawn at random.
    EitherSide,
}

/// Angular offsets of the sensors relative to the heading, evenly spread over
/// `[-angle, +angle]`. The middle entry is forward.
pub fn sensor_offsets(sensor_count: u32, angle: f32) -> Vec<f32> {
    let center = (sensor_count / 2) as i32;
    if center == 0 {
        return vec![0.0];
    }
    (0..sensor_count as i32)
        .map(|i| angle * (i - center) as f32 / center as f32)
        .collect()
}

/// Sums the agent's species channel over the square window centred on `point`'s cell.
pub fn sample_window(field: &TrailField, point: Vec2, species: u32, params: &SimParams) -> f32 {
    let cx = point.x.floor() as i64;
    let cy = point.y.floor() as i64;
    let size = params.sense_size as i64;
    let lo = -(size / 2);
    let hi = lo + size - 1;

    let mut sum = 0.0;
    for dy in lo..=hi {
        for dx in lo..=hi {
            if let Some(cell) = resolve_cell(cx + dx, cy + dy, params) {
                sum += field.at(cell, species);
            }
        }
    }
    sum
}

/// Evaluates every sensor and reduces them to left/forward/right readings.
/// Positive offsets are on the left, negative on the right.
pub fn sense(field: &TrailField, agent: &Agent, offsets: &[f32], params: &SimParams) -> SensorReadings {
    let mut readings = SensorReadings { left: f32::MIN, forward: 0.0, right: f32::MIN };
    for &offset in offsets {
        let dir = angle_to_vec(agent.heading + offset);
        let point = agent.pos + dir * params.sense_distance;
        let value = sample_window(field, point, agent.species, params);
        if offset > 0.0 {
            readings.left = readings.left.max(value);
        } else if offset < 0.0 {
            readings.right = readings.right.max(value);
        } else {
            readings.forward = value;
        }
    }
    readings
}

pub fn choose_turn(r: SensorReadings) -> Turn {
    if r.forward > r.left && r.forward > r.right {
        return Turn::Straight;
    }
    if r.left == r.right {
        // Sides tie: turn only when both beat forward
        return if r.left > r.forward { Turn::EitherSide } else { Turn::Straight };
    }
    if r.left > r.right {
        Turn::Left
    } else {
        Turn::Right
    }
}

/// Applies a turn of `steer_speed * dt` radians (left is positive) and normalises the heading.
/// `pick_left` is only consulted for [`Turn::EitherSide`].
pub fn steer<F: FnOnce() -> bool>(heading: f32, turn: Turn, params: &SimParams, dt: f32, pick_left: F) -> f32 {
    let step = params.steer_speed * dt;
    let turned = match turn {
        Turn::Straight => heading,
        Turn::Left => heading + step,
        Turn::Right => heading - step,
        Turn::EitherSide => {
            if pick_left() { heading + step } else { heading - step }
        }
    };
    normalize_angle(turned)
}

/// Moves the agent along its heading and applies the boundary policy.
pub fn advance(agent: &Agent, params: &SimParams, dt: f32) -> Agent {
    let moved = agent.pos + angle_to_vec(agent.heading) * (params.agent_speed * dt);
    let (pos, heading) = apply_boundary(moved, agent.heading, params);
    Agent { pos, heading, species: agent.species }
}

/// Seed of the tie-break generator for agent `idx` at `tick`.
#[inline(always)]
pub fn tie_break_seed(seed: u64, idx: usize, tick: u64) -> u64 {
    seed.wrapping_add(idx as u64).wrapping_add(tick)
}

/// Runs the kernel: reads `agents_in` and `read`, fills `agents_out` and records deposits.
pub fn update_agents(
    agents_in: &[Agent],
    agents_out: &mut [Agent],
    read: &TrailField,
    deposits: &DepositAccumulator,
    params: &SimParams,
    dt: f32,
    tick: u64,
) -> Result<()> {
    if agents_in.len() != agents_out.len() {
        anyhow::bail!(
            "Agent buffer length mismatch: {} in, {} out.",
            agents_in.len(), agents_out.len()
        );
    }
    if read.width() != params.width || read.height() != params.height || read.species_count() != params.species_count {
        anyhow::bail!("Read field does not match the configured grid.");
    }
    if deposits.len() != params.field_len() {
        anyhow::bail!("Deposit buffer has {} counters, expected {}.", deposits.len(), params.field_len());
    }

    let offsets = sensor_offsets(params.sensor_count, params.sense_angle);

    agents_out
        .par_iter_mut()
        .zip(agents_in.par_iter())
        .enumerate()
        .for_each(|(idx, (out, agent))| {
            debug_assert!(agent.species < params.species_count);

            let readings = sense(read, agent, &offsets, params);
            let turn = choose_turn(readings);
            let heading = steer(agent.heading, turn, params, dt, || {
                let mut rng = StdRng::seed_from_u64(tie_break_seed(params.seed, idx, tick));
                rng.random::<bool>()
            });

            let steered = Agent { heading, ..*agent };
            let moved = advance(&steered, params, dt);
            deposits.add(position_to_cell(moved.pos, params), moved.species);
            *out = moved;
        });

    Ok(())
}
