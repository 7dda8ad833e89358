// Motion estimation between consecutive occupancy frames

use na::DMatrix;

/// Per-pixel motion `[u, v]`, in pixels per tick, indexed `(x, y)` like the
/// frames it was computed from. Unlike solver fields it has no halo.
pub type FlowField = [DMatrix<f32>; 2];

pub fn zero_flow(n: usize) -> FlowField {
    [DMatrix::zeros(n, n), DMatrix::zeros(n, n)]
}

/// Dense motion between two frames of the same size
pub trait MotionEstimator {
    fn estimate(&mut self, previous: &DMatrix<u8>, current: &DMatrix<u8>) -> FlowField;
}

/// Normal-flow estimate: the temporal change at a pixel divided by the
/// spatial gradient, along the gradient. Only edges move; flat regions read
/// as still.
pub struct GradientFlow {
    /// Added to the squared gradient magnitude to keep flat regions at zero
    pub regularization: f32,

    /// Largest speed reported, in pixels per tick
    pub max_speed: f32,
}

impl Default for GradientFlow {
    fn default() -> Self {
        GradientFlow {
            regularization: 0.01,
            max_speed: 4.,
        }
    }
}

/// Central difference along one axis, one-sided at the edges.
fn gradient(image: &DMatrix<f32>, x: usize, y: usize, along_x: bool) -> f32 {
    let (rows, cols) = image.shape();
    let (len, at) = if along_x { (rows, x) } else { (cols, y) };
    let sample = |k: usize| if along_x { image[(k, y)] } else { image[(x, k)] };

    if len < 2 {
        return 0.;
    }
    match at {
        0 => sample(1) - sample(0),
        k if k == len - 1 => sample(k) - sample(k - 1),
        k => 0.5 * (sample(k + 1) - sample(k - 1)),
    }
}

impl MotionEstimator for GradientFlow {
    fn estimate(&mut self, previous: &DMatrix<u8>, current: &DMatrix<u8>) -> FlowField {
        let (rows, cols) = current.shape();
        let mut flow = [DMatrix::zeros(rows, cols), DMatrix::zeros(rows, cols)];
        if previous.shape() != current.shape() {
            return flow;
        }

        let prev = previous.map(|p| p as f32 / 255.);
        let cur = current.map(|p| p as f32 / 255.);
        let mean = (&prev + &cur) * 0.5;

        for y in 0..cols {
            for x in 0..rows {
                let ix = gradient(&mean, x, y, true);
                let iy = gradient(&mean, x, y, false);
                let it = cur[(x, y)] - prev[(x, y)];

                let scale = -it / (ix * ix + iy * iy + self.regularization);
                let (mut u, mut v) = (scale * ix, scale * iy);

                let speed = (u * u + v * v).sqrt();
                if speed > self.max_speed {
                    u *= self.max_speed / speed;
                    v *= self.max_speed / speed;
                }

                flow[0][(x, y)] = u;
                flow[1][(x, y)] = v;
            }
        }

        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid below row `top`
    fn block(n: usize, top: usize) -> DMatrix<u8> {
        DMatrix::from_fn(n, n, |_, y| if y < top { 255 } else { 0 })
    }

    #[test]
    fn test_still_frames_have_no_flow() {
        let frame = block(16, 8);
        let flow = GradientFlow::default().estimate(&frame, &frame);

        assert!(flow.iter().all(|f| f.iter().all(|&v| v == 0.)));
    }

    #[test]
    fn test_rising_edge_moves_up() {
        let flow = GradientFlow::default().estimate(&block(16, 8), &block(16, 9));

        assert!(flow[1][(5, 8)] > 0.);
        assert!(flow[0][(5, 8)].abs() < 1e-6);
        assert_eq!(flow[1][(5, 2)], 0.);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut estimator = GradientFlow {
            regularization: 1e-6,
            max_speed: 1.5,
        };
        let flow = estimator.estimate(&block(16, 4), &block(16, 12));

        for (u, v) in flow[0].iter().zip(flow[1].iter()) {
            assert!((u * u + v * v).sqrt() <= 1.5 + 1e-4);
        }
    }

    #[test]
    fn test_mismatched_frames_give_zero_flow() {
        let flow = GradientFlow::default().estimate(&block(8, 4), &block(16, 4));
        assert_eq!(flow[0].shape(), (16, 16));
        assert!(flow[0].iter().all(|&v| v == 0.));
    }
}
