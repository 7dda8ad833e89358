// One interactive installation: fields, emitters, coupling and mode state

use na::DMatrix;
use tracing::{debug, warn};

use crate::{
    config::{ConfigError, SessionInput},
    mode::{Mode, ModeController},
    observers::{
        imgstream::{DensitySnapshot, FramePacket},
        palette,
    },
    pointer::{PointerEvent, PointerState},
    sensor::{
        FrameSource, SensorError,
        coupler::SensorCoupler,
        flow::{GradientFlow, MotionEstimator, zero_flow},
    },
    sim::{
        ActiveField, SolverKind, emitter::EmitterSystem, fluid::FluidField, grid::Grid,
        multi_user::MultiUserField,
    },
};

/// Discrete operator commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ChangeMode(Mode),
    Clear,
    ToggleFlow,
    ToggleAutoMode,
    ToggleVelocity,
    ToggleBounds,
    ToggleUsers,
}

impl Command {
    /// The keyboard binding of each command; letters are case-insensitive
    pub fn from_key(key: char) -> Option<Command> {
        let command = match key.to_ascii_lowercase() {
            'c' => Command::Clear,
            'f' => Command::ToggleFlow,
            'v' => Command::ToggleVelocity,
            'b' => Command::ToggleBounds,
            'u' => Command::ToggleUsers,
            '0' => Command::ToggleAutoMode,
            '1'..='4' => {
                let index = key.to_digit(10)? as usize - 1;
                Command::ChangeMode(Mode::from_index(index)?)
            }
            _ => return None,
        };

        Some(command)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The field advanced one step
    Advanced,

    /// No usable frame; nothing changed this tick
    Skipped,

    /// The frame source has nothing more to give
    Exhausted,
}

pub struct Session {
    single: FluidField,
    multi: MultiUserField,
    emitters: EmitterSystem,
    coupler: SensorCoupler,
    modes: ModeController,
    estimator: Box<dyn MotionEstimator>,
    pointer: PointerState,

    /// User labels of the last frame, for drawing silhouettes
    last_labels: Option<DMatrix<u8>>,
    ticks: usize,
}

impl Session {
    pub fn new(input: &SessionInput) -> Result<Self, ConfigError> {
        Session::with_estimator(input, Box::new(GradientFlow::default()))
    }

    /// Build a session around `estimator`, rejecting inputs the solver
    /// cannot run with
    pub fn with_estimator(
        input: &SessionInput,
        estimator: Box<dyn MotionEstimator>,
    ) -> Result<Self, ConfigError> {
        input.validate()?;

        let grid = Grid::new(input.grid_size);
        let mut modes = ModeController::new(input.initial_mode, input.auto_mode, input.ticks_per_mode);
        if input.disable_flow {
            modes.toggle_flow();
        }

        Ok(Session {
            single: FluidField::new(grid, input.solver),
            multi: MultiUserField::new(grid, input.solver, input.max_users),
            emitters: EmitterSystem::new(input.max_emitters),
            coupler: SensorCoupler::new(input.coupling),
            modes,
            estimator,
            pointer: PointerState::default(),
            last_labels: None,
            ticks: 0,
        })
    }

    pub fn single(&self) -> &FluidField {
        &self.single
    }

    pub fn multi(&self) -> &MultiUserField {
        &self.multi
    }

    pub fn emitters(&self) -> &EmitterSystem {
        &self.emitters
    }

    pub fn modes(&self) -> &ModeController {
        &self.modes
    }

    pub fn last_labels(&self) -> Option<&DMatrix<u8>> {
        self.last_labels.as_ref()
    }

    /// Ticks that advanced the field
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn handle(&mut self, command: Command) {
        debug!("Handling {:?}", command);
        match command {
            Command::ChangeMode(mode) => self.change_mode(mode),
            Command::Clear => self.clear_data(),
            Command::ToggleFlow => {
                self.modes.toggle_flow();
                self.coupler.forget_history();
            }
            Command::ToggleAutoMode => {
                self.modes.toggle_auto();
            }
            Command::ToggleVelocity => self.modes.toggle_velocity(),
            Command::ToggleBounds => self.modes.toggle_bounds(),
            Command::ToggleUsers => self.modes.toggle_users(),
        }
    }

    /// Switch preset and start it from a clean slate. Flow restarts from the
    /// next frame, since the last one may be from before flow was enabled.
    pub fn change_mode(&mut self, mode: Mode) {
        self.modes.change_mode(mode);
        self.coupler.forget_history();
        self.clear_data();
    }

    /// Zero velocity and density in both fields and drop every emitter.
    /// Obstacles and parameters stay.
    pub fn clear_data(&mut self) {
        self.single.reset();
        self.multi.reset();
        self.emitters.clear();
    }

    pub fn pointer_event(&mut self, event: PointerEvent) {
        self.pointer.handle(event);
    }

    /// Run one tick against the next frame of `source`.
    pub fn tick(&mut self, source: &mut dyn FrameSource) -> TickOutcome {
        if let Some(next) = self.modes.advance_timer() {
            self.change_mode(next);
        }

        let n = self.single.solver().grid().n();
        let frame = match source.next_frame().and_then(|f| f.check_size(n).map(|_| f)) {
            Ok(frame) => frame,
            Err(SensorError::Exhausted) => return TickOutcome::Exhausted,
            Err(err) => {
                warn!("Skipping tick {}: {err}", self.ticks);
                return TickOutcome::Skipped;
            }
        };

        let flags = *self.modes.flags();
        let mut field = ActiveField::select(flags.solver, &mut self.single, &mut self.multi);

        self.coupler.define_bounds_from_image(&mut field, &frame);
        self.pointer.apply(&mut field, self.coupler.params().force, flags.source);

        let flow = if flags.use_flow {
            self.coupler.compute_optical_flow(&mut field, &frame, self.estimator.as_mut())
        } else {
            zero_flow(n)
        };
        self.coupler.emit_splashes(&mut field, &mut self.emitters, &flow, &frame, flags.use_flow);

        self.emitters.render_emitters(&mut field, flags.source);
        field.update();

        self.last_labels = frame.labels;
        self.ticks += 1;
        TickOutcome::Advanced
    }

    /// Copy the state the active mode draws
    pub fn snapshot(&self, i: usize) -> FramePacket {
        let flags = *self.modes.flags();
        let (density, solver) = match flags.solver {
            SolverKind::SingleUser => (
                DensitySnapshot::Single(self.single.density().clone()),
                self.single.solver(),
            ),
            SolverKind::MultiUser => (
                DensitySnapshot::Users(palette::user_layers(&self.multi)),
                self.multi.solver(),
            ),
        };

        FramePacket {
            i,
            density,
            velocity: solver.velocity().clone(),
            bounds: solver.bounds().clone(),
            labels: self.last_labels.clone(),
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pointer::PointerButton,
        sensor::{SensorFrame, synthetic::SyntheticSource},
        sim::numeric,
    };

    /// Plays a fixed list of results, then reports exhaustion
    struct Scripted(Vec<Result<SensorFrame, SensorError>>);

    impl FrameSource for Scripted {
        fn next_frame(&mut self) -> Result<SensorFrame, SensorError> {
            if self.0.is_empty() {
                return Err(SensorError::Exhausted);
            }
            self.0.remove(0)
        }
    }

    fn input(n: usize) -> SessionInput {
        SessionInput {
            grid_size: n,
            ..SessionInput::default()
        }
    }

    fn empty_frame(n: usize) -> SensorFrame {
        SensorFrame::new(DMatrix::zeros(n, n), None).unwrap()
    }

    #[test]
    fn test_key_map() {
        assert_eq!(Command::from_key('c'), Some(Command::Clear));
        assert_eq!(Command::from_key('F'), Some(Command::ToggleFlow));
        assert_eq!(Command::from_key('0'), Some(Command::ToggleAutoMode));
        assert_eq!(Command::from_key('1'), Some(Command::ChangeMode(Mode::SingleColor)));
        assert_eq!(Command::from_key('4'), Some(Command::ChangeMode(Mode::WhiteBackground)));
        assert_eq!(Command::from_key('5'), None);
        assert_eq!(Command::from_key('x'), None);
    }

    #[test]
    fn test_change_mode_to_multi_user_clears_fields() {
        let mut session = Session::new(&input(16)).unwrap();
        session.pointer_event(PointerEvent::Press {
            button: PointerButton::Right,
            x: 256.,
            y: 256.,
        });
        let mut source = Scripted((0..5).map(|_| Ok(empty_frame(16))).collect());
        for _ in 0..5 {
            assert_eq!(session.tick(&mut source), TickOutcome::Advanced);
        }
        assert!(numeric::interior_sum(session.single().density()) > 0.);

        session.handle(Command::ChangeMode(Mode::MultiUser));

        assert_eq!(session.modes().solver(), SolverKind::MultiUser);
        assert!(session.modes().flags().use_flow);
        assert!(session.emitters().is_empty());
        assert!(session.single().density().iter().all(|&d| d == 0.));
        assert!(session.single().solver().velocity().iter().all(|f| f.iter().all(|&u| u == 0.)));
        for slot in 0..session.multi().user_count() {
            assert!(session.multi().user_density(slot).unwrap().iter().all(|&d| d == 0.));
        }
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let result = Session::new(&SessionInput {
            grid_size: 1,
            ..SessionInput::default()
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let mut input = input(8);
        input.solver.dt = -0.1;
        assert!(Session::new(&input).is_err());
    }

    #[test]
    fn test_synthetic_run_stays_finite() {
        let mut session = Session::new(&SessionInput {
            initial_mode: Mode::MultiUser,
            ..input(24)
        })
        .unwrap();
        let mut source = SyntheticSource::new(24, 2, 11);

        for _ in 0..30 {
            assert_eq!(session.tick(&mut source), TickOutcome::Advanced);
        }

        assert!(session.last_labels().is_some());
        assert!(session.emitters().len() <= session.emitters().capacity());
        for slot in 0..session.multi().user_count() {
            let layer = session.multi().user_density(slot).unwrap();
            assert!(layer.iter().all(|d| d.is_finite()));
        }
    }

    #[test]
    fn test_unavailable_frame_skips_tick() {
        let mut session = Session::new(&input(8)).unwrap();
        let mut source = Scripted(vec![
            Ok(empty_frame(8)),
            Err(SensorError::Shape {
                expected: (8, 8),
                found: (0, 0),
            }),
            Ok(empty_frame(6)),
        ]);

        assert_eq!(session.tick(&mut source), TickOutcome::Advanced);
        assert_eq!(session.tick(&mut source), TickOutcome::Skipped);
        assert_eq!(session.tick(&mut source), TickOutcome::Skipped);
        assert_eq!(session.tick(&mut source), TickOutcome::Exhausted);
        assert_eq!(session.ticks(), 1);
    }

    #[test]
    fn test_frame_becomes_obstacles_in_active_field_only() {
        let mut session = Session::new(&input(8)).unwrap();
        let mut occupancy: DMatrix<u8> = DMatrix::zeros(8, 8);
        occupancy[(3, 4)] = 255;
        let mut source = Scripted(vec![Ok(SensorFrame::new(occupancy, None).unwrap())]);

        session.tick(&mut source);

        assert!(session.single().is_bound_at(4, 5));
        assert!(!session.multi().is_bound_at(4, 5));
    }

    #[test]
    fn test_pointer_density_reaches_active_field() {
        let mut session = Session::new(&input(16)).unwrap();
        session.change_mode(Mode::MultiUser);
        session.pointer_event(PointerEvent::Press {
            button: PointerButton::Right,
            x: 256.,
            y: 256.,
        });

        let mut source = Scripted(vec![Ok(empty_frame(16))]);
        session.tick(&mut source);

        let poured = session.multi().user_density(1).map(numeric::interior_sum);
        assert!(poured.is_some_and(|d| d > 0.));
        assert_eq!(numeric::interior_sum(session.single().density()), 0.);
    }

    #[test]
    fn test_auto_mode_advances_and_wraps() {
        let mut session = Session::new(&SessionInput {
            grid_size: 8,
            auto_mode: true,
            ticks_per_mode: 1,
            initial_mode: Mode::WhiteBackground,
            ..SessionInput::default()
        })
        .unwrap();
        let mut source = SyntheticSource::new(8, 1, 0);

        for _ in 0..3 {
            session.tick(&mut source);
        }
        assert_eq!(session.modes().mode(), Mode::SingleColor);
    }

    #[test]
    fn test_toggle_flow_switches_to_fallback() {
        let mut session = Session::new(&SessionInput {
            disable_flow: true,
            ..input(16)
        })
        .unwrap();
        assert!(!session.modes().flags().use_flow);

        session.handle(Command::ToggleFlow);
        assert!(session.modes().flags().use_flow);
    }

    #[test]
    fn test_snapshot_follows_mode() {
        let mut session = Session::new(&input(8)).unwrap();
        assert!(matches!(session.snapshot(0).density, DensitySnapshot::Single(_)));

        session.change_mode(Mode::WhiteBackground);
        let packet = session.snapshot(7);
        assert_eq!(packet.i, 7);
        assert!(packet.flags.white_background);
        match packet.density {
            DensitySnapshot::Users(layers) => assert_eq!(layers.len(), 6),
            DensitySnapshot::Single(_) => panic!("expected per-user layers"),
        }
    }
}
