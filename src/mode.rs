// Interaction presets and the optional auto-advance timer

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::sim::SolverKind;

/// Density deposited per impulse in every preset
pub const DEFAULT_SOURCE: f32 = 20.;

/// Ticks spent in a preset before auto-advance moves on
pub const DEFAULT_TICKS_PER_MODE: u32 = 500;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    SingleColor,
    VelocityDebug,
    MultiUser,
    WhiteBackground,
}

/// Behaviour switched by a mode. The display toggles are only read by the
/// frame observers; `use_flow` and `solver` change what a tick does.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ModeFlags {
    pub source: f32,
    pub display_velocity: bool,
    pub display_bounds: bool,
    pub display_users: bool,
    pub use_flow: bool,
    pub solver: SolverKind,
    pub white_background: bool,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::SingleColor,
        Mode::VelocityDebug,
        Mode::MultiUser,
        Mode::WhiteBackground,
    ];

    pub fn index(self) -> usize {
        match self {
            Mode::SingleColor => 0,
            Mode::VelocityDebug => 1,
            Mode::MultiUser => 2,
            Mode::WhiteBackground => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Mode> {
        Mode::ALL.get(index).copied()
    }

    /// The following preset, wrapping back to the first
    pub fn next(self) -> Mode {
        Mode::ALL[(self.index() + 1) % Mode::ALL.len()]
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::SingleColor => "Single color density",
            Mode::VelocityDebug => "Vectors without optical flow",
            Mode::MultiUser => "Multi-color user emission",
            Mode::WhiteBackground => "White background",
        }
    }

    pub fn flags(self) -> ModeFlags {
        let base = ModeFlags {
            source: DEFAULT_SOURCE,
            display_velocity: false,
            display_bounds: false,
            display_users: false,
            use_flow: true,
            solver: SolverKind::SingleUser,
            white_background: false,
        };

        match self {
            Mode::SingleColor => base,
            Mode::VelocityDebug => ModeFlags {
                display_velocity: true,
                use_flow: false,
                ..base
            },
            Mode::MultiUser => ModeFlags {
                display_users: true,
                solver: SolverKind::MultiUser,
                ..base
            },
            Mode::WhiteBackground => ModeFlags {
                solver: SolverKind::MultiUser,
                white_background: true,
                ..base
            },
        }
    }
}

/// Holds the current preset, the flags it set (which individual commands may
/// then toggle), and the auto-advance counter.
pub struct ModeController {
    mode: Mode,
    flags: ModeFlags,
    auto: bool,
    ticks_per_mode: u32,
    iterations: u32,
}

impl ModeController {
    pub fn new(initial: Mode, auto: bool, ticks_per_mode: u32) -> Self {
        ModeController {
            mode: initial,
            flags: initial.flags(),
            auto,
            ticks_per_mode,
            iterations: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn flags(&self) -> &ModeFlags {
        &self.flags
    }

    pub fn solver(&self) -> SolverKind {
        self.flags.solver
    }

    pub fn auto(&self) -> bool {
        self.auto
    }

    /// Switch to `mode`, replacing every flag with the preset's. Clearing the
    /// field state is the caller's job, since the controller owns no fields.
    pub fn change_mode(&mut self, mode: Mode) {
        info!("Changing to mode {}: {}", mode.index(), mode.description());
        self.mode = mode;
        self.flags = mode.flags();
    }

    pub fn toggle_flow(&mut self) -> bool {
        self.flags.use_flow = !self.flags.use_flow;
        info!("Optical flow: {}", self.flags.use_flow);
        self.flags.use_flow
    }

    pub fn toggle_auto(&mut self) -> bool {
        self.auto = !self.auto;
        info!("Auto change mode: {}", self.auto);
        self.auto
    }

    pub fn toggle_velocity(&mut self) {
        self.flags.display_velocity = !self.flags.display_velocity;
    }

    pub fn toggle_bounds(&mut self) {
        self.flags.display_bounds = !self.flags.display_bounds;
    }

    pub fn toggle_users(&mut self) {
        self.flags.display_users = !self.flags.display_users;
        info!("Draw users: {}", self.flags.display_users);
    }

    /// Count one tick while auto-advance is on. Once more than
    /// `ticks_per_mode` ticks have passed, the counter restarts and the next
    /// preset is returned; the caller applies it with a full mode change.
    pub fn advance_timer(&mut self) -> Option<Mode> {
        if !self.auto {
            return None;
        }

        if self.iterations > self.ticks_per_mode {
            self.iterations = 0;
            return Some(self.mode.next());
        }

        self.iterations = self.iterations.saturating_add(1);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let single = Mode::SingleColor.flags();
        assert!(single.use_flow);
        assert_eq!(single.solver, SolverKind::SingleUser);

        let debug = Mode::VelocityDebug.flags();
        assert!(!debug.use_flow && debug.display_velocity);

        let multi = Mode::MultiUser.flags();
        assert!(multi.use_flow && multi.display_users);
        assert_eq!(multi.solver, SolverKind::MultiUser);

        let white = Mode::WhiteBackground.flags();
        assert!(white.white_background && !white.display_users);
        assert_eq!(white.solver, SolverKind::MultiUser);

        assert!(Mode::ALL.iter().all(|m| m.flags().source == 20.));
    }

    #[test]
    fn test_index_round_trip_and_wrap() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_index(mode.index()), Some(mode));
        }
        assert_eq!(Mode::from_index(4), None);
        assert_eq!(Mode::WhiteBackground.next(), Mode::SingleColor);
        assert_eq!(Mode::SingleColor.next(), Mode::VelocityDebug);
    }

    #[test]
    fn test_change_mode_replaces_toggles() {
        let mut modes = ModeController::new(Mode::SingleColor, false, 10);
        modes.toggle_flow();
        modes.toggle_bounds();
        assert!(!modes.flags().use_flow);

        modes.change_mode(Mode::MultiUser);
        assert_eq!(modes.flags(), &Mode::MultiUser.flags());
        assert_eq!(modes.solver(), SolverKind::MultiUser);
    }

    #[test]
    fn test_timer_only_fires_when_auto() {
        let mut modes = ModeController::new(Mode::SingleColor, false, 3);
        for _ in 0..20 {
            assert_eq!(modes.advance_timer(), None);
        }

        modes.toggle_auto();
        let fired: Vec<usize> = (0..20)
            .filter_map(|tick| modes.advance_timer().map(|_| tick))
            .collect();

        // disabled ticks were not counted
        assert_eq!(fired[0], 4);
        // afterwards it fires every threshold + 2 ticks
        assert_eq!(fired[1] - fired[0], 5);
    }

    #[test]
    fn test_timer_counter_saturates() {
        let mut modes = ModeController::new(Mode::SingleColor, true, u32::MAX);
        modes.iterations = u32::MAX - 1;

        for _ in 0..3 {
            assert_eq!(modes.advance_timer(), None);
        }
        assert_eq!(modes.iterations, u32::MAX);
    }

    #[test]
    fn test_timer_wraps_through_all_modes() {
        let mut modes = ModeController::new(Mode::VelocityDebug, true, 0);
        let mut seen = Vec::new();

        while seen.len() < 4 {
            if let Some(next) = modes.advance_timer() {
                modes.change_mode(next);
                seen.push(next);
            }
        }

        assert_eq!(
            seen,
            vec![
                Mode::MultiUser,
                Mode::WhiteBackground,
                Mode::SingleColor,
                Mode::VelocityDebug
            ]
        );
    }
}
