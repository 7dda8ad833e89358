// One shared velocity field carrying an independent density per user

use tracing::debug;

use crate::{
    ScalarField,
    sim::{
        fluid::{DensityLayer, SolverParams, VelocitySolver},
        grid::Grid,
    },
};

/// A fluid whose velocity and obstacles are shared, but whose density is kept
/// per user slot. Slot 0 is the background. Densities are only ever combined
/// at read-out time; the solver never mixes two slots.
pub struct MultiUserField {
    solver: VelocitySolver,
    users: Vec<DensityLayer>,
}

impl MultiUserField {
    pub fn new(grid: Grid, params: SolverParams, max_users: usize) -> Self {
        MultiUserField {
            solver: VelocitySolver::new(grid, params),
            users: (0..max_users).map(|_| DensityLayer::new(grid)).collect(),
        }
    }

    pub fn solver(&self) -> &VelocitySolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut VelocitySolver {
        &mut self.solver
    }

    /// Number of user slots, background included
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Density of one user slot, if the slot exists
    pub fn user_density(&self, slot: usize) -> Option<&ScalarField> {
        self.users.get(slot).map(DensityLayer::field)
    }

    /// Add density to exactly one user slot. Writes to unknown slots are dropped.
    pub fn add_density_at(&mut self, slot: usize, x: usize, y: usize, amount: f32) {
        match self.users.get_mut(slot) {
            Some(layer) => layer.add_at(x, y, amount),
            None => debug!("Dropped density for unknown user slot {slot}"),
        }
    }

    /// Density of one user slot; zero for unknown slots
    pub fn density_at(&self, slot: usize, x: usize, y: usize) -> f32 {
        self.users.get(slot).map_or(0., |layer| layer.at(x, y))
    }

    pub fn add_horz_velocity_at(&mut self, x: usize, y: usize, du: f32) {
        self.solver.add_horz_velocity_at(x, y, du);
    }

    pub fn add_vert_velocity_at(&mut self, x: usize, y: usize, dv: f32) {
        self.solver.add_vert_velocity_at(x, y, dv);
    }

    pub fn set_bound_at(&mut self, x: usize, y: usize, solid: bool) {
        self.solver.set_bound_at(x, y, solid);
    }

    pub fn is_bound_at(&self, x: usize, y: usize) -> bool {
        self.solver.is_bound_at(x, y)
    }

    /// Advance one tick: the shared velocity once, then every user density
    /// through it.
    pub fn update(&mut self) {
        self.solver.step();
        for layer in self.users.iter_mut() {
            layer.step(&self.solver);
        }
    }

    pub fn reset(&mut self) {
        self.solver.reset();
        self.users.iter_mut().for_each(DensityLayer::reset);
    }
}
