// Pointer input: drag to push fluid, middle click to draw obstacles, right click to pour

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::sim::ActiveField;

pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (512, 512);

/// User slot that pointer density is poured into in the multi-user variant
const POINTER_USER_SLOT: usize = 1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

/// Window events, in screen pixels with the origin at the top left
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Press { button: PointerButton, x: f32, y: f32 },
    Release { button: PointerButton, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Resize { width: u32, height: u32 },
}

/// Map a screen position to the grid cell under it. The screen y axis points
/// down, the grid's up.
///
/// Parameters
/// - `position` - Pointer position in screen pixels
/// - `window` - Window size in screen pixels
/// - `n` - Interior cells per axis
///
/// Returns
/// - The cell, or `None` if the pointer is outside `1..=n` on either axis
pub fn screen_to_grid(position: (f32, f32), window: (u32, u32), n: usize) -> Option<(usize, usize)> {
    let (w, h) = (window.0.to_f32()?, window.1.to_f32()?);
    if w <= 0. || h <= 0. {
        return None;
    }
    let cells = n.to_f32()?;

    let x = (position.0 / w * cells + 1.).to_i64()?;
    let y = ((h - position.1) / h * cells + 1.).to_i64()?;

    let inside = |k: i64| (1..=n as i64).contains(&k);
    if !inside(x) || !inside(y) {
        return None;
    }

    Some((x as usize, y as usize))
}

/// Button and position state between ticks
#[derive(Debug, Clone)]
pub struct PointerState {
    window: (u32, u32),
    down: [bool; 3],

    /// Latest position
    position: (f32, f32),

    /// Position at the last applied impulse
    previous: (f32, f32),
}

impl Default for PointerState {
    fn default() -> Self {
        PointerState::new(DEFAULT_WINDOW_SIZE)
    }
}

fn slot(button: PointerButton) -> usize {
    match button {
        PointerButton::Left => 0,
        PointerButton::Middle => 1,
        PointerButton::Right => 2,
    }
}

impl PointerState {
    pub fn new(window: (u32, u32)) -> Self {
        PointerState {
            window,
            down: [false; 3],
            position: (0., 0.),
            previous: (0., 0.),
        }
    }

    pub fn is_down(&self, button: PointerButton) -> bool {
        self.down[slot(button)]
    }

    pub fn handle(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Press { button, x, y } | PointerEvent::Release { button, x, y } => {
                self.position = (x, y);
                self.previous = (x, y);
                self.down[slot(button)] = matches!(event, PointerEvent::Press { .. });
            }
            PointerEvent::Move { x, y } => self.position = (x, y),
            PointerEvent::Resize { width, height } => self.window = (width, height),
        }
    }

    /// Add this tick's pointer impulses to the field.
    ///
    /// Parameters
    /// - `field` - The active field
    /// - `force` - Scale from dragged pixels to velocity
    /// - `source` - Density poured per tick with the right button
    pub fn apply(&mut self, field: &mut ActiveField, force: f32, source: f32) {
        if !self.down.iter().any(|&d| d) {
            return;
        }

        let n = field.solver().grid().n();
        let Some((x, y)) = screen_to_grid(self.position, self.window, n) else {
            return;
        };

        if self.is_down(PointerButton::Left) {
            let solver = field.solver_mut();
            solver.add_horz_velocity_at(x, y, force * (self.position.0 - self.previous.0));
            solver.add_vert_velocity_at(x, y, force * (self.previous.1 - self.position.1));
        }

        if self.is_down(PointerButton::Middle) {
            field.solver_mut().set_bound_at(x, y, true);
        }

        if self.is_down(PointerButton::Right) {
            field.add_density_at(POINTER_USER_SLOT, x, y, source);
        }

        self.previous = self.position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{
        SolverKind,
        fluid::{FluidField, SolverParams},
        grid::Grid,
        multi_user::MultiUserField,
    };

    fn fields(n: usize) -> (FluidField, MultiUserField) {
        let grid = Grid::new(n);
        (
            FluidField::new(grid, SolverParams::default()),
            MultiUserField::new(grid, SolverParams::default(), 4),
        )
    }

    #[test]
    fn test_screen_to_grid() {
        // top left of the window is the top left interior cell
        assert_eq!(screen_to_grid((0., 0.), (512, 512), 64), None);
        assert_eq!(screen_to_grid((0., 1.), (512, 512), 64), Some((1, 64)));
        assert_eq!(screen_to_grid((511., 511.), (512, 512), 64), Some((64, 1)));
        assert_eq!(screen_to_grid((256., 256.), (512, 512), 64), Some((33, 33)));

        assert_eq!(screen_to_grid((600., 10.), (512, 512), 64), None);
        assert_eq!(screen_to_grid((10., 10.), (0, 512), 64), None);
    }

    #[test]
    fn test_left_drag_pushes_fluid() {
        let (mut single, mut multi) = fields(16);
        let mut pointer = PointerState::new((160, 160));

        pointer.handle(PointerEvent::Press {
            button: PointerButton::Left,
            x: 50.,
            y: 100.,
        });
        pointer.handle(PointerEvent::Move { x: 55., y: 98. });

        let mut field = ActiveField::select(SolverKind::SingleUser, &mut single, &mut multi);
        pointer.apply(&mut field, 5., 20.);

        // (55, 98) on a 160 pixel window is cell (6, 7)
        assert_eq!(single.horz_velocity_at(6, 7), 25.);
        assert_eq!(single.vert_velocity_at(6, 7), 10.);

        // no further motion, no further impulse
        let mut field = ActiveField::select(SolverKind::SingleUser, &mut single, &mut multi);
        pointer.apply(&mut field, 5., 20.);
        assert_eq!(single.horz_velocity_at(6, 7), 25.);
    }

    #[test]
    fn test_middle_draws_bounds_and_right_pours_into_slot_one() {
        let (mut single, mut multi) = fields(16);
        let mut pointer = PointerState::new((160, 160));

        pointer.handle(PointerEvent::Press {
            button: PointerButton::Middle,
            x: 15.,
            y: 145.,
        });
        pointer.handle(PointerEvent::Press {
            button: PointerButton::Right,
            x: 15.,
            y: 145.,
        });

        let mut field = ActiveField::select(SolverKind::MultiUser, &mut single, &mut multi);
        pointer.apply(&mut field, 5., 20.);

        assert!(multi.is_bound_at(2, 2));
        assert_eq!(multi.density_at(1, 2, 2), 20.);
        assert_eq!(multi.density_at(2, 2, 2), 0.);
        assert!(!single.is_bound_at(2, 2));
    }

    #[test]
    fn test_release_stops_impulses() {
        let (mut single, mut multi) = fields(16);
        let mut pointer = PointerState::default();

        pointer.handle(PointerEvent::Press {
            button: PointerButton::Right,
            x: 100.,
            y: 100.,
        });
        pointer.handle(PointerEvent::Release {
            button: PointerButton::Right,
            x: 100.,
            y: 100.,
        });
        assert!(!pointer.is_down(PointerButton::Right));

        let mut field = ActiveField::select(SolverKind::SingleUser, &mut single, &mut multi);
        pointer.apply(&mut field, 5., 20.);
        assert!(single.density().iter().all(|&d| d == 0.));
    }
}
