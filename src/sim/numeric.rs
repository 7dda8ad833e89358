// Stable-fluids kernels over halo-bordered grids

use crate::{BoundaryMask, ScalarField, VectorField};

/// The quantity a field holds; decides how boundary cells are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Density,
    Pressure,
    HorzVelocity,
    VertVelocity,
}

/// Number of interior cells per axis of a halo-bordered field
fn interior_size(field: &ScalarField) -> usize {
    field.nrows() - 2
}

/// Negated value of the first open cell out of `a` and `b`, or zero if both
/// are solid.
fn mirror(field: &ScalarField, bounds: &BoundaryMask, a: (usize, usize), b: (usize, usize)) -> f32 {
    if !bounds[a] {
        -field[a]
    } else if !bounds[b] {
        -field[b]
    } else {
        0.
    }
}

/// Mean of the open neighbours of `(x, y)`, or zero if it is enclosed.
fn open_neighbour_mean(field: &ScalarField, bounds: &BoundaryMask, x: usize, y: usize) -> f32 {
    let (sum, count) = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
        .into_iter()
        .filter(|&cell| !bounds[cell])
        .fold((0f32, 0usize), |(sum, count), cell| (sum + field[cell], count + 1));

    if count == 0 { 0. } else { sum / count as f32 }
}

/// Set the boundary values of a field, both on the obstacle cells flagged in
/// `bounds` and on the outer halo.
///
/// Velocity components are reflected: the wall (or obstacle) cell takes the
/// negated value of its neighbour along the component's own axis. Density is
/// zero inside obstacles and copied outward into the halo. Pressure inside
/// obstacles is the mean of the open neighbours, so no gradient drives flow
/// into a solid. Halo corners average their two halo neighbours.
///
/// Parameters:
/// - `kind` - What the field represents
/// - `field` - The `(n+2) x (n+2)` field to update in place
/// - `bounds` - The obstacle mask of the same shape
pub fn set_bnd(kind: FieldKind, field: &mut ScalarField, bounds: &BoundaryMask) {
    let n = interior_size(field);

    // obstacle cells
    for y in 1..=n {
        for x in 1..=n {
            if !bounds[(x, y)] {
                continue;
            }

            field[(x, y)] = match kind {
                FieldKind::Density => 0.,
                FieldKind::Pressure => open_neighbour_mean(field, bounds, x, y),
                FieldKind::HorzVelocity => mirror(field, bounds, (x - 1, y), (x + 1, y)),
                FieldKind::VertVelocity => mirror(field, bounds, (x, y - 1), (x, y + 1)),
            };
        }
    }

    // outer walls
    for k in 1..=n {
        let horz_sign = if kind == FieldKind::HorzVelocity { -1. } else { 1. };
        let vert_sign = if kind == FieldKind::VertVelocity { -1. } else { 1. };

        field[(0, k)] = horz_sign * field[(1, k)];
        field[(n + 1, k)] = horz_sign * field[(n, k)];
        field[(k, 0)] = vert_sign * field[(k, 1)];
        field[(k, n + 1)] = vert_sign * field[(k, n)];
    }

    // corners
    field[(0, 0)] = 0.5 * (field[(1, 0)] + field[(0, 1)]);
    field[(0, n + 1)] = 0.5 * (field[(1, n + 1)] + field[(0, n)]);
    field[(n + 1, 0)] = 0.5 * (field[(n, 0)] + field[(n + 1, 1)]);
    field[(n + 1, n + 1)] = 0.5 * (field[(n, n + 1)] + field[(n + 1, n)]);
}

/// Solve `c * f[x,y] - a * (sum of the four neighbours) = f0[x,y]` with a
/// fixed number of Gauss-Seidel sweeps. No convergence check is made.
///
/// Parameters:
/// - `kind` - What the field represents, for boundary handling
/// - `field` - The unknown; its contents are used as the initial guess
/// - `rhs` - The right-hand side `f0`
/// - `a` - The neighbour coefficient
/// - `c` - The centre coefficient
/// - `iterations` - The number of relaxation sweeps
/// - `bounds` - The obstacle mask
pub fn lin_solve(
    kind: FieldKind,
    field: &mut ScalarField,
    rhs: &ScalarField,
    a: f32,
    c: f32,
    iterations: usize,
    bounds: &BoundaryMask,
) {
    let n = interior_size(field);
    let c_inv = 1. / c;

    for _ in 0..iterations {
        for y in 1..=n {
            for x in 1..=n {
                let neighbours = field[(x - 1, y)]
                    + field[(x + 1, y)]
                    + field[(x, y - 1)]
                    + field[(x, y + 1)];
                field[(x, y)] = (rhs[(x, y)] + a * neighbours) * c_inv;
            }
        }
        set_bnd(kind, field, bounds);
    }
}

/// Implicitly diffuse `prev` into `field`. Stable for any `rate * dt`.
///
/// Parameters:
/// - `kind` - What the field represents
/// - `field` - Receives the diffused field
/// - `prev` - The field before diffusion
/// - `rate` - The diffusion rate (viscosity for velocity components)
/// - `dt` - The time step
/// - `iterations` - The number of relaxation sweeps
/// - `bounds` - The obstacle mask
pub fn diffuse(
    kind: FieldKind,
    field: &mut ScalarField,
    prev: &ScalarField,
    rate: f32,
    dt: f32,
    iterations: usize,
    bounds: &BoundaryMask,
) {
    let n = interior_size(field) as f32;
    let a = dt * rate * n * n;

    field.copy_from(prev);
    lin_solve(kind, field, prev, a, 1. + 4. * a, iterations, bounds);
}

/// Semi-Lagrangian advection: each cell traces its velocity back by `dt` and
/// takes the bilinear interpolation of `prev` at the traced point. Density in
/// obstacle cells is held at zero.
///
/// Parameters:
/// - `kind` - What the field represents
/// - `field` - Receives the advected field
/// - `prev` - The field being transported
/// - `velocity` - The velocity field doing the transporting
/// - `dt` - The time step
/// - `bounds` - The obstacle mask
pub fn advect(
    kind: FieldKind,
    field: &mut ScalarField,
    prev: &ScalarField,
    velocity: &VectorField,
    dt: f32,
    bounds: &BoundaryMask,
) {
    let n = interior_size(field);
    let nf = n as f32;
    let dt0 = dt * nf;

    for y in 1..=n {
        for x in 1..=n {
            if kind == FieldKind::Density && bounds[(x, y)] {
                field[(x, y)] = 0.;
                continue;
            }

            let src_x = (x as f32 - dt0 * velocity[0][(x, y)]).clamp(0.5, nf + 0.5);
            let src_y = (y as f32 - dt0 * velocity[1][(x, y)]).clamp(0.5, nf + 0.5);

            let (x0, y0) = (src_x.floor() as usize, src_y.floor() as usize);
            let (x1, y1) = (x0 + 1, y0 + 1);

            let s1 = src_x - x0 as f32;
            let s0 = 1. - s1;
            let t1 = src_y - y0 as f32;
            let t0 = 1. - t1;

            field[(x, y)] = s0 * (t0 * prev[(x0, y0)] + t1 * prev[(x0, y1)])
                + s1 * (t0 * prev[(x1, y0)] + t1 * prev[(x1, y1)]);
        }
    }

    set_bnd(kind, field, bounds);
}

/// Make `velocity` approximately divergence free by solving a Poisson
/// equation for pressure and subtracting its gradient. Obstacle cells keep
/// the reflected values written by `set_bnd` instead of a pressure update.
///
/// Parameters:
/// - `velocity` - The velocity field to project in place
/// - `pressure` - Scratch field, receives the pressure
/// - `div` - Scratch field, receives the pre-projection divergence
/// - `iterations` - The number of relaxation sweeps for the pressure solve
/// - `bounds` - The obstacle mask
pub fn project(
    velocity: &mut VectorField,
    pressure: &mut ScalarField,
    div: &mut ScalarField,
    iterations: usize,
    bounds: &BoundaryMask,
) {
    let [u, v] = velocity;
    let n = interior_size(u);
    let h = 1. / n as f32;

    for y in 1..=n {
        for x in 1..=n {
            div[(x, y)] =
                -0.5 * h * (u[(x + 1, y)] - u[(x - 1, y)] + v[(x, y + 1)] - v[(x, y - 1)]);
            pressure[(x, y)] = 0.;
        }
    }
    set_bnd(FieldKind::Density, div, bounds);
    set_bnd(FieldKind::Pressure, pressure, bounds);

    lin_solve(FieldKind::Pressure, pressure, div, 1., 4., iterations, bounds);

    for y in 1..=n {
        for x in 1..=n {
            if bounds[(x, y)] {
                continue;
            }
            u[(x, y)] -= 0.5 * (pressure[(x + 1, y)] - pressure[(x - 1, y)]) / h;
            v[(x, y)] -= 0.5 * (pressure[(x, y + 1)] - pressure[(x, y - 1)]) / h;
        }
    }
    set_bnd(FieldKind::HorzVelocity, u, bounds);
    set_bnd(FieldKind::VertVelocity, v, bounds);
}

/// Central-difference divergence `du/dx + dv/dy` of the interior, in cell
/// units. The halo of the result is zero.
pub fn divergence(velocity: &VectorField) -> ScalarField {
    let [u, v] = velocity;
    let n = interior_size(u);
    let mut div = ScalarField::zeros(n + 2, n + 2);

    for y in 1..=n {
        for x in 1..=n {
            div[(x, y)] = 0.5 * (u[(x + 1, y)] - u[(x - 1, y)] + v[(x, y + 1)] - v[(x, y - 1)]);
        }
    }

    div
}

/// Sum of a field over the interior cells
pub fn interior_sum(field: &ScalarField) -> f32 {
    let n = interior_size(field);
    field.view((1, 1), (n, n)).sum()
}
