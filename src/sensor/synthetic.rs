// Generated silhouettes for running without a depth camera

use na::DMatrix;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::sensor::{FrameSource, SensorError, SensorFrame};

/// Sway period of a figure, in ticks
const SWAY_PERIOD: f32 = 120.;

/// One or more swaying stick figures, each tagged with its own user label.
/// Edges jitter by up to one pixel per tick to mimic depth noise.
pub struct SyntheticSource {
    n: usize,
    users: usize,
    tick: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(n: usize, users: usize, seed: u64) -> Self {
        SyntheticSource {
            n,
            users: users.max(1),
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Paint one figure into the frame: a torso with a raised, swinging arm.
    fn paint_figure(
        &mut self,
        occupancy: &mut DMatrix<u8>,
        labels: &mut DMatrix<u8>,
        user: usize,
    ) {
        let n = self.n as f32;
        let phase = self.tick as f32 / SWAY_PERIOD * std::f32::consts::TAU + user as f32;

        let slot_width = n / (self.users as f32 + 1.);
        let center_x = slot_width * (user as f32 + 1.) + phase.sin() * n * 0.05;
        let half_width = (n * 0.06).max(1.);
        let top = n * 0.55 + (phase * 2.).sin() * n * 0.05;
        let arm_reach = n * 0.15 * (phase * 1.5).cos();

        let label = (user + 1) as u8;

        for y in 0..self.n {
            for x in 0..self.n {
                let (fx, fy) = (x as f32, y as f32);
                let jitter = self.rng.random_range(-1.0..=1.0);

                let torso = (fx - center_x).abs() <= half_width + jitter && fy <= top + jitter;
                let arm = fy >= top * 0.8
                    && fy <= top * 0.8 + half_width
                    && (fx - center_x) * arm_reach.signum() >= 0.
                    && (fx - center_x).abs() <= arm_reach.abs() + half_width;

                if torso || arm {
                    occupancy[(x, y)] = 255;
                    labels[(x, y)] = label;
                }
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<SensorFrame, SensorError> {
        let mut occupancy = DMatrix::zeros(self.n, self.n);
        let mut labels = DMatrix::zeros(self.n, self.n);

        for user in 0..self.users {
            self.paint_figure(&mut occupancy, &mut labels, user);
        }
        self.tick += 1;

        SensorFrame::new(occupancy, Some(labels))
    }
}
