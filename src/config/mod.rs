use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    mode::{DEFAULT_TICKS_PER_MODE, Mode},
    pointer::PointerEvent,
    sensor::{
        FrameSource, SensorError,
        coupler::CouplingParams,
        image_source::{ImageSequenceSource, StillMaskSource},
        synthetic::SyntheticSource,
    },
    sim::{emitter::DEFAULT_MAX_EMITTERS, fluid::SolverParams},
};

pub mod cli;

pub const DEFAULT_GRID_SIZE: usize = 128;
pub const DEFAULT_MAX_USERS: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid session input: {0}")]
    Invalid(String),
}

/// Where sensor frames come from
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SourceSettings {
    /// Generated swaying figures
    Synthetic { users: usize, seed: u64 },

    /// One PNG silhouette, dark on light, held for the whole run
    Still { mask_path: PathBuf },

    /// Numbered PNG depth frames, bright is near, with optional label frames
    Sequence {
        frames_in: PathBuf,
        labels_in: Option<PathBuf>,
        looping: bool,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutputSettings {
    pub frames_dir: PathBuf,

    /// Save a frame every this many ticks; 0 saves nothing
    pub save_every: usize,
}

/// Input replayed at a given tick, in place of a live window
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ScriptedAction {
    Key(char),
    Pointer(PointerEvent),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScriptedEvent {
    pub tick: usize,
    pub action: ScriptedAction,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionInput {
    pub grid_size: usize,
    pub max_users: usize,
    pub max_emitters: usize,
    pub ticks: usize,

    pub initial_mode: Mode,
    pub auto_mode: bool,
    pub ticks_per_mode: u32,

    /// Start with flow-based emission off, whatever the initial mode says
    #[serde(default)]
    pub disable_flow: bool,

    pub solver: SolverParams,
    pub coupling: CouplingParams,
    pub source: SourceSettings,
    pub output: OutputSettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ScriptedEvent>,
}

impl Default for SessionInput {
    fn default() -> Self {
        SessionInput {
            grid_size: DEFAULT_GRID_SIZE,
            max_users: DEFAULT_MAX_USERS,
            max_emitters: DEFAULT_MAX_EMITTERS,
            ticks: 600,
            initial_mode: Mode::default(),
            auto_mode: false,
            ticks_per_mode: DEFAULT_TICKS_PER_MODE,
            disable_flow: false,
            solver: SolverParams::default(),
            coupling: CouplingParams::default(),
            source: SourceSettings::Synthetic { users: 2, seed: 0 },
            output: OutputSettings {
                frames_dir: PathBuf::from("wall-frames"),
                save_every: 10,
            },
            events: Vec::new(),
        }
    }
}

impl SessionInput {
    /// Reject inputs the solver cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.grid_size < 2 {
            return invalid(format!("grid size must be at least 2, got {}", self.grid_size));
        }
        if self.max_users < 2 {
            return invalid(format!(
                "at least 2 user slots are needed (slot 0 is background), got {}",
                self.max_users
            ));
        }
        if !(self.solver.dt.is_finite() && self.solver.dt > 0.) {
            return invalid(format!("time step must be positive, got {}", self.solver.dt));
        }
        if self.solver.diffusion < 0. || self.solver.viscosity < 0. {
            return invalid("diffusion and viscosity must not be negative".to_string());
        }
        if self.solver.relaxation_iterations == 0 {
            return invalid("relaxation needs at least one iteration".to_string());
        }
        if self.coupling.default_user_slot >= self.max_users {
            return invalid(format!(
                "default user slot {} does not exist with {} slots",
                self.coupling.default_user_slot, self.max_users
            ));
        }
        if let SourceSettings::Synthetic { users, .. } = self.source {
            if users == 0 || users >= self.max_users {
                return invalid(format!(
                    "synthetic users must be in 1..{}, got {}",
                    self.max_users, users
                ));
            }
        }

        Ok(())
    }

    /// Open the configured frame source at the grid resolution
    pub fn build_source(&self) -> Result<Box<dyn FrameSource>, SensorError> {
        let n = self.grid_size;
        Ok(match &self.source {
            SourceSettings::Synthetic { users, seed } => {
                Box::new(SyntheticSource::new(n, *users, *seed))
            }
            SourceSettings::Still { mask_path } => Box::new(StillMaskSource::open(mask_path, n)?),
            SourceSettings::Sequence {
                frames_in,
                labels_in,
                looping,
            } => Box::new(ImageSequenceSource::open(
                frames_in,
                labels_in.as_deref(),
                n,
                *looping,
            )?),
        })
    }

    pub fn log(&self) {
        info!(
            "Session is shown below:\n\n\
        \t grid:        {} x {}\n\
        \t ticks:       {}\n\
        \t mode:        {:?} (auto: {}, every {} ticks)\n\
        \t dt:          {}\n\
        \t diffusion:   {}\n\
        \t viscosity:   {}\n\
        \t relaxation:  {} iterations\n\
        \t users:       {}\n\
        \t emitters:    {} (max)\n\
        \t events:      {}\n\n\
        ",
            self.grid_size,
            self.grid_size,
            self.ticks,
            self.initial_mode,
            self.auto_mode,
            self.ticks_per_mode,
            self.solver.dt,
            self.solver.diffusion,
            self.solver.viscosity,
            self.solver.relaxation_iterations,
            self.max_users,
            self.max_emitters,
            self.events.len(),
        );

        match serde_json::to_string_pretty(&self.source) {
            Ok(source) => info!("Frame source is:\n\n{}", source),
            Err(err) => info!("Frame source is {:?} ({err})", self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerButton;

    #[test]
    fn test_default_is_valid() {
        assert!(SessionInput::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_inputs() {
        let mut input = SessionInput::default();
        input.grid_size = 1;
        assert!(matches!(input.validate(), Err(ConfigError::Invalid(_))));

        let mut input = SessionInput::default();
        input.solver.dt = 0.;
        assert!(input.validate().is_err());

        let mut input = SessionInput::default();
        input.source = SourceSettings::Synthetic { users: 6, seed: 1 };
        assert!(input.validate().is_err());

        let mut input = SessionInput::default();
        input.max_users = 1;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_json_keeps_events_and_defaults_flags() {
        let mut input = SessionInput::default();
        input.events.push(ScriptedEvent {
            tick: 3,
            action: ScriptedAction::Pointer(PointerEvent::Press {
                button: PointerButton::Right,
                x: 10.,
                y: 20.,
            }),
        });
        input.events.push(ScriptedEvent {
            tick: 5,
            action: ScriptedAction::Key('3'),
        });

        let json = serde_json::to_string(&input).unwrap();
        let loaded: SessionInput = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, input);

        // older inputs without the optional fields still load
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("events");
        object.remove("disable_flow");
        let loaded: SessionInput = serde_json::from_value(value).unwrap();
        assert!(loaded.events.is_empty());
        assert!(!loaded.disable_flow);
    }

    #[test]
    fn test_build_synthetic_source() {
        let input = SessionInput {
            grid_size: 24,
            ..SessionInput::default()
        };
        let mut source = input.build_source().unwrap();
        let frame = source.next_frame().unwrap();
        assert!(frame.check_size(24).is_ok());
    }

    #[test]
    fn test_missing_mask_fails_to_open() {
        let input = SessionInput {
            source: SourceSettings::Still {
                mask_path: PathBuf::from("/nonexistent/mask.png"),
            },
            ..SessionInput::default()
        };
        assert!(input.build_source().is_err());
    }
}
