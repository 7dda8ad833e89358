// Single-density stable-fluids field

use serde::{Deserialize, Serialize};

use crate::{
    BoundaryMask, ScalarField, VectorField,
    sim::{
        grid::Grid,
        numeric::{self, FieldKind},
    },
};

/// Parameters of the solver. Fixed once a field is built.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SolverParams {
    /// Time step per tick
    pub dt: f32,

    /// Diffusion rate of density
    pub diffusion: f32,

    /// Viscosity of the fluid
    pub viscosity: f32,

    /// Gauss-Seidel sweeps per diffusion or pressure solve
    pub relaxation_iterations: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            dt: 0.1,
            diffusion: 0.,
            viscosity: 0.,
            relaxation_iterations: 20,
        }
    }
}

/// Velocity and obstacle state shared by every density carried on top of it.
/// Runs the diffuse, project, advect, project half of a tick.
pub struct VelocitySolver {
    grid: Grid,
    params: SolverParams,

    /// Current velocity `[u, v]`
    u: VectorField,

    /// Previous velocity, also used as scratch by the projection
    u_prev: VectorField,

    /// Cells occupied by a solid
    bounds: BoundaryMask,
}

impl VelocitySolver {
    pub fn new(grid: Grid, params: SolverParams) -> Self {
        VelocitySolver {
            grid,
            params,
            u: grid.vector_field(),
            u_prev: grid.vector_field(),
            bounds: grid.boundary_mask(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn velocity(&self) -> &VectorField {
        &self.u
    }

    pub fn bounds(&self) -> &BoundaryMask {
        &self.bounds
    }

    /// Add a horizontal velocity impulse; impulses accumulate until `update`.
    pub fn add_horz_velocity_at(&mut self, x: usize, y: usize, du: f32) {
        if let Some(cell) = self.u[0].get_mut((x, y)) {
            *cell += du;
        }
    }

    /// Add a vertical velocity impulse; impulses accumulate until `update`.
    pub fn add_vert_velocity_at(&mut self, x: usize, y: usize, dv: f32) {
        if let Some(cell) = self.u[1].get_mut((x, y)) {
            *cell += dv;
        }
    }

    pub fn horz_velocity_at(&self, x: usize, y: usize) -> f32 {
        self.u[0].get((x, y)).copied().unwrap_or(0.)
    }

    pub fn vert_velocity_at(&self, x: usize, y: usize) -> f32 {
        self.u[1].get((x, y)).copied().unwrap_or(0.)
    }

    pub fn set_bound_at(&mut self, x: usize, y: usize, solid: bool) {
        if let Some(cell) = self.bounds.get_mut((x, y)) {
            *cell = solid;
        }
    }

    pub fn is_bound_at(&self, x: usize, y: usize) -> bool {
        self.bounds.get((x, y)).copied().unwrap_or(false)
    }

    /// Advance the velocity field by one time step
    pub fn step(&mut self) {
        let SolverParams {
            dt,
            viscosity,
            relaxation_iterations: iterations,
            ..
        } = self.params;

        std::mem::swap(&mut self.u, &mut self.u_prev);
        numeric::diffuse(
            FieldKind::HorzVelocity,
            &mut self.u[0],
            &self.u_prev[0],
            viscosity,
            dt,
            iterations,
            &self.bounds,
        );
        numeric::diffuse(
            FieldKind::VertVelocity,
            &mut self.u[1],
            &self.u_prev[1],
            viscosity,
            dt,
            iterations,
            &self.bounds,
        );

        let [pressure, div] = &mut self.u_prev;
        numeric::project(&mut self.u, pressure, div, iterations, &self.bounds);

        // the projected field becomes the one traced through
        std::mem::swap(&mut self.u, &mut self.u_prev);
        numeric::advect(
            FieldKind::HorzVelocity,
            &mut self.u[0],
            &self.u_prev[0],
            &self.u_prev,
            dt,
            &self.bounds,
        );
        numeric::advect(
            FieldKind::VertVelocity,
            &mut self.u[1],
            &self.u_prev[1],
            &self.u_prev,
            dt,
            &self.bounds,
        );

        let [pressure, div] = &mut self.u_prev;
        numeric::project(&mut self.u, pressure, div, iterations, &self.bounds);
    }

    /// Zero velocity; obstacles and parameters are kept.
    pub fn reset(&mut self) {
        self.u.iter_mut().for_each(|f| f.fill(0.));
        self.u_prev.iter_mut().for_each(|f| f.fill(0.));
    }
}

/// A density carried by a velocity field
pub struct DensityLayer {
    current: ScalarField,
    previous: ScalarField,
}

impl DensityLayer {
    pub fn new(grid: Grid) -> Self {
        DensityLayer {
            current: grid.scalar_field(),
            previous: grid.scalar_field(),
        }
    }

    pub fn field(&self) -> &ScalarField {
        &self.current
    }

    pub fn add_at(&mut self, x: usize, y: usize, amount: f32) {
        if let Some(cell) = self.current.get_mut((x, y)) {
            *cell += amount;
        }
    }

    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.current.get((x, y)).copied().unwrap_or(0.)
    }

    /// Diffuse, then advect through the solver's current velocity.
    pub fn step(&mut self, solver: &VelocitySolver) {
        let params = solver.params();

        std::mem::swap(&mut self.current, &mut self.previous);
        numeric::diffuse(
            FieldKind::Density,
            &mut self.current,
            &self.previous,
            params.diffusion,
            params.dt,
            params.relaxation_iterations,
            solver.bounds(),
        );

        std::mem::swap(&mut self.current, &mut self.previous);
        numeric::advect(
            FieldKind::Density,
            &mut self.current,
            &self.previous,
            solver.velocity(),
            params.dt,
            solver.bounds(),
        );
    }

    pub fn reset(&mut self) {
        self.current.fill(0.);
        self.previous.fill(0.);
    }
}

/// Incompressible fluid carrying a single density
pub struct FluidField {
    solver: VelocitySolver,
    density: DensityLayer,
}

impl FluidField {
    pub fn new(grid: Grid, params: SolverParams) -> Self {
        FluidField {
            solver: VelocitySolver::new(grid, params),
            density: DensityLayer::new(grid),
        }
    }

    pub fn solver(&self) -> &VelocitySolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut VelocitySolver {
        &mut self.solver
    }

    pub fn density(&self) -> &ScalarField {
        self.density.field()
    }

    pub fn add_horz_velocity_at(&mut self, x: usize, y: usize, du: f32) {
        self.solver.add_horz_velocity_at(x, y, du);
    }

    pub fn add_vert_velocity_at(&mut self, x: usize, y: usize, dv: f32) {
        self.solver.add_vert_velocity_at(x, y, dv);
    }

    pub fn add_density_at(&mut self, x: usize, y: usize, amount: f32) {
        self.density.add_at(x, y, amount);
    }

    pub fn set_bound_at(&mut self, x: usize, y: usize, solid: bool) {
        self.solver.set_bound_at(x, y, solid);
    }

    pub fn is_bound_at(&self, x: usize, y: usize) -> bool {
        self.solver.is_bound_at(x, y)
    }

    pub fn density_at(&self, x: usize, y: usize) -> f32 {
        self.density.at(x, y)
    }

    pub fn horz_velocity_at(&self, x: usize, y: usize) -> f32 {
        self.solver.horz_velocity_at(x, y)
    }

    pub fn vert_velocity_at(&self, x: usize, y: usize) -> f32 {
        self.solver.vert_velocity_at(x, y)
    }

    /// Advance one tick: velocity first, then density through the new velocity.
    pub fn update(&mut self) {
        self.solver.step();
        self.density.step(&self.solver);
    }

    pub fn reset(&mut self) {
        self.solver.reset();
        self.density.reset();
    }
}
