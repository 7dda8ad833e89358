// Grid fluid solvers and the transient sources that drive them

pub mod emitter;
pub mod fluid;
pub mod grid;
pub mod multi_user;
pub mod numeric;

use serde::{Deserialize, Serialize};

use fluid::{FluidField, VelocitySolver};
use multi_user::MultiUserField;

/// Which field variant a tick drives
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverKind {
    SingleUser,
    MultiUser,
}

/// Mutable view of whichever field is active for this tick. Routes density
/// writes to a user slot only in the multi-user variant.
pub enum ActiveField<'a> {
    SingleUser(&'a mut FluidField),
    MultiUser(&'a mut MultiUserField),
}

impl<'a> ActiveField<'a> {
    /// Borrow the field selected by `kind`
    pub fn select(
        kind: SolverKind,
        single: &'a mut FluidField,
        multi: &'a mut MultiUserField,
    ) -> Self {
        match kind {
            SolverKind::SingleUser => ActiveField::SingleUser(single),
            SolverKind::MultiUser => ActiveField::MultiUser(multi),
        }
    }
}

impl ActiveField<'_> {
    pub fn kind(&self) -> SolverKind {
        match self {
            ActiveField::SingleUser(_) => SolverKind::SingleUser,
            ActiveField::MultiUser(_) => SolverKind::MultiUser,
        }
    }

    pub fn solver(&self) -> &VelocitySolver {
        match self {
            ActiveField::SingleUser(field) => field.solver(),
            ActiveField::MultiUser(field) => field.solver(),
        }
    }

    pub fn solver_mut(&mut self) -> &mut VelocitySolver {
        match self {
            ActiveField::SingleUser(field) => field.solver_mut(),
            ActiveField::MultiUser(field) => field.solver_mut(),
        }
    }

    /// Add density for `slot`. The single-user field has one density, so the
    /// slot is ignored there.
    pub fn add_density_at(&mut self, slot: usize, x: usize, y: usize, amount: f32) {
        match self {
            ActiveField::SingleUser(field) => field.add_density_at(x, y, amount),
            ActiveField::MultiUser(field) => field.add_density_at(slot, x, y, amount),
        }
    }

    pub fn update(&mut self) {
        match self {
            ActiveField::SingleUser(field) => field.update(),
            ActiveField::MultiUser(field) => field.update(),
        }
    }
}
