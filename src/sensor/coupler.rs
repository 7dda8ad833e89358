// Turns silhouettes and motion into obstacles, impulses and splashes

use na::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    sensor::{
        SensorFrame,
        flow::{FlowField, MotionEstimator, zero_flow},
    },
    sim::{ActiveField, SolverKind, emitter::EmitterSystem},
};

/// Empirically tuned coupling constants. The flow-mode and fallback-mode
/// constants are tuned separately and are not meant to agree.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CouplingParams {
    /// Scale from sensor flow (pixels per tick) to velocity impulse
    pub flow_scalar: f32,

    /// Splashes are only searched for in rows `1..splash_rows`
    pub splash_rows: usize,

    /// Vertical flow below this value at an edge creates a splash
    pub emission_threshold: f32,

    /// Scale from edge flow to splash force
    pub splash_force_scale: f32,

    /// Lifespan of a splash emitter, in ticks
    pub splash_lifespan: u32,

    /// Radius of a splash emitter, in cells
    pub splash_radius: u32,

    /// `(sideways, upward)` push at silhouette edges when flow is off
    pub fallback_impulse: (f32, f32),

    /// Scale applied to fallback and pointer impulses
    pub force: f32,

    /// Slot splashes belong to when users are not tracked, or the silhouette
    /// carries no label
    pub default_user_slot: usize,
}

impl Default for CouplingParams {
    fn default() -> Self {
        CouplingParams {
            flow_scalar: 0.1,
            splash_rows: 80,
            emission_threshold: -0.05,
            splash_force_scale: 0.8,
            splash_lifespan: 6,
            splash_radius: 3,
            fallback_impulse: (0.05, 0.1),
            force: 5.,
            default_user_slot: 1,
        }
    }
}

/// Couples one sensor frame per tick into the active field.
pub struct SensorCoupler {
    params: CouplingParams,

    /// Occupancy of the last frame flow was computed against
    previous: Option<DMatrix<u8>>,
}

impl SensorCoupler {
    pub fn new(params: CouplingParams) -> Self {
        SensorCoupler {
            params,
            previous: None,
        }
    }

    pub fn params(&self) -> &CouplingParams {
        &self.params
    }

    /// Forget the previous frame, so the next flow computation is skipped.
    pub fn forget_history(&mut self) {
        self.previous = None;
    }

    /// Mark every grid cell solid or open from the frame's occupancy. This
    /// is the only way silhouettes become obstacles.
    pub fn define_bounds_from_image(&self, field: &mut ActiveField, frame: &SensorFrame) {
        let solver = field.solver_mut();
        for (x, y) in solver.grid().interior() {
            solver.set_bound_at(x, y, frame.is_solid(x, y));
        }
    }

    /// Estimate motion against the previous frame and push the fluid along
    /// it. On the first frame there is nothing to diff against: no impulse is
    /// added and the returned flow is zero.
    ///
    /// Parameters
    /// - `field` - The field receiving velocity impulses
    /// - `frame` - The frame just acquired
    /// - `estimator` - The motion estimator
    ///
    /// Returns
    /// - The flow, per pixel, for splash detection
    pub fn compute_optical_flow(
        &mut self,
        field: &mut ActiveField,
        frame: &SensorFrame,
        estimator: &mut dyn MotionEstimator,
    ) -> FlowField {
        let n = frame.occupancy.nrows();

        let flow = match self.previous.replace(frame.occupancy.clone()) {
            Some(previous) => estimator.estimate(&previous, &frame.occupancy),
            None => return zero_flow(n),
        };

        let solver = field.solver_mut();
        for (x, y) in solver.grid().interior() {
            if let (Some(u), Some(v)) = (flow[0].get((x - 1, y - 1)), flow[1].get((x - 1, y - 1))) {
                solver.add_horz_velocity_at(x, y, self.params.flow_scalar * u);
                solver.add_vert_velocity_at(x, y, self.params.flow_scalar * v);
            }
        }

        flow
    }

    /// React to silhouette edges.
    ///
    /// With flow enabled, rows `1..splash_rows` are scanned for open cells
    /// directly below a solid one; where the flow there points down past the
    /// emission threshold, a splash emitter is created just below the edge,
    /// owned by the user labelled above it (multi-user) or the default slot.
    ///
    /// Without flow, every row is scanned for horizontal open/solid edges and
    /// each gets a small fixed push away from the body and upward.
    pub fn emit_splashes(
        &self,
        field: &mut ActiveField,
        emitters: &mut EmitterSystem,
        flow: &FlowField,
        frame: &SensorFrame,
        use_flow: bool,
    ) {
        if use_flow {
            self.emit_from_flow(field, emitters, flow, frame);
        } else {
            self.push_from_edges(field);
        }
    }

    fn emit_from_flow(
        &self,
        field: &ActiveField,
        emitters: &mut EmitterSystem,
        flow: &FlowField,
        frame: &SensorFrame,
    ) {
        let p = &self.params;
        let solver = field.solver();
        let n = solver.grid().n();

        for y in 1..p.splash_rows.min(n + 1) {
            for x in 1..=n {
                let edge_above = !solver.is_bound_at(x, y) && solver.is_bound_at(x, y + 1);
                if !edge_above {
                    continue;
                }

                let Some((&fu, &fv)) = flow[0].get((x - 1, y - 1)).zip(flow[1].get((x - 1, y - 1)))
                else {
                    continue;
                };
                if fv >= p.emission_threshold {
                    continue;
                }

                // label 0 is the background slot
                let slot = match (field.kind(), frame.label_at(x, y + 1)) {
                    (SolverKind::MultiUser, label) if label > 0 => label as usize,
                    _ => p.default_user_slot,
                };

                emitters.create_emitter_at(
                    (x as i32, y as i32 - 1),
                    (p.splash_force_scale * fu, p.splash_force_scale * fv),
                    p.splash_lifespan,
                    p.splash_radius,
                    slot,
                );
            }
        }
    }

    fn push_from_edges(&self, field: &mut ActiveField) {
        let (side, up) = self.params.fallback_impulse;
        let force = self.params.force;
        let solver = field.solver_mut();
        let n = solver.grid().n();

        for y in 1..=n {
            for x in 1..=n {
                let here = solver.is_bound_at(x, y);
                let right = solver.is_bound_at(x + 1, y);

                if !here && right {
                    // open cell left of a body: push left
                    solver.add_horz_velocity_at(x, y, -force * side);
                    solver.add_vert_velocity_at(x, y, force * up);
                } else if here && !right && x < n {
                    // open cell right of a body: push right
                    solver.add_horz_velocity_at(x + 1, y, force * side);
                    solver.add_vert_velocity_at(x + 1, y, force * up);
                }
            }
        }
    }
}
