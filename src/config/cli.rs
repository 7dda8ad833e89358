use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use clap::{Parser, ValueEnum};
use tracing::info;

use crate::{
    config::{ConfigError, DEFAULT_GRID_SIZE, OutputSettings, SessionInput, SourceSettings},
    mode::{DEFAULT_TICKS_PER_MODE, Mode},
    sim::fluid::SolverParams,
};

static DEFAULT_FRAMES_PATH: LazyLock<&Path> = LazyLock::new(|| Path::new("wall-frames"));

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Still,
    Sequence,
}

// Raw, CLI input
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[arg(long, help = "An input file with pre-loaded parameters.")]
    input_json: Option<PathBuf>,

    #[arg(long, help = "Optional path to save the session input to.")]
    pub input_json_savepath: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "synthetic", help = "Where sensor frames come from.")]
    source: SourceKind,

    #[arg(long, help = "A PNG silhouette, dark on light, for the `still` source.")]
    mask_path: Option<PathBuf>,

    #[arg(long, help = "A directory of numbered PNG depth frames for the `sequence` source.")]
    frames_in: Option<PathBuf>,

    #[arg(long, help = "A directory of user label frames matching `--frames-in`.")]
    labels_in: Option<PathBuf>,

    #[arg(long, help = "Restart the frame sequence when it runs out.")]
    loop_frames: bool,

    #[arg(long, default_value = "2", help = "Number of generated figures for the `synthetic` source.")]
    users: usize,

    #[arg(long, default_value = "0", help = "Random seed for the `synthetic` source.")]
    seed: u64,

    #[arg(long, help = "Directory where rendered frames are saved.")]
    frames_dir: Option<PathBuf>,

    #[arg(long, default_value = "10", help = "Save a frame every this many ticks; 0 disables saving.")]
    save_every: usize,

    #[arg(short, long, default_value = "600", help = "Number of ticks to run.")]
    ticks: usize,

    #[arg(short, long, default_value_t = DEFAULT_GRID_SIZE, help = "Interior cells per axis.")]
    grid_size: usize,

    #[arg(
        short,
        long,
        default_value = "0",
        value_parser = clap::value_parser!(u8).range(0..4),
        help = "Initial mode: 0 single color, 1 velocity vectors, 2 multi-user, 3 white background."
    )]
    mode: u8,

    #[arg(long, help = "Cycle through the modes automatically.")]
    auto_mode: bool,

    #[arg(long, default_value_t = DEFAULT_TICKS_PER_MODE, help = "Ticks per mode when cycling.")]
    ticks_per_mode: u32,

    #[arg(long, help = "Start with optical-flow emission disabled.")]
    no_flow: bool,

    #[arg(long, default_value = "0.1", help = "Time step per tick.")]
    dt: f32,

    #[arg(long, default_value = "0.0", help = "Density diffusion rate.")]
    diffusion: f32,

    #[arg(long, default_value = "0.0", help = "Fluid viscosity.")]
    viscosity: f32,

    #[arg(short, long, help = "Log at debug level.")]
    pub verbose: bool,
}

impl CliArgs {
    pub fn create_input(&self) -> Result<SessionInput, ConfigError> {
        // if the input file is supplied, just use that
        if let Some(input_filepath) = &self.input_json {
            if input_filepath.is_dir() {
                return Err(ConfigError::Invalid(format!(
                    "input file {:?} is a directory",
                    input_filepath
                )));
            }

            info!("Using input file {:?}", input_filepath);

            let reader = BufReader::new(File::open(input_filepath)?);
            let loaded_input: SessionInput = serde_json::from_reader(reader)?;
            loaded_input.validate()?;

            return Ok(loaded_input);
        }

        // otherwise, build the input from the other arguments
        let source = match self.source {
            SourceKind::Synthetic => SourceSettings::Synthetic {
                users: self.users,
                seed: self.seed,
            },
            SourceKind::Still => SourceSettings::Still {
                mask_path: self.mask_path.clone().ok_or_else(|| {
                    ConfigError::Invalid(
                        "the `still` source needs a silhouette with `--mask-path <png>`".to_string(),
                    )
                })?,
            },
            SourceKind::Sequence => SourceSettings::Sequence {
                frames_in: self.frames_in.clone().ok_or_else(|| {
                    ConfigError::Invalid(
                        "the `sequence` source needs a directory with `--frames-in <dir>`"
                            .to_string(),
                    )
                })?,
                labels_in: self.labels_in.clone(),
                looping: self.loop_frames,
            },
        };

        let frames_dir = self
            .frames_dir
            .clone()
            .unwrap_or((*DEFAULT_FRAMES_PATH).into());

        let input = SessionInput {
            grid_size: self.grid_size,
            ticks: self.ticks,
            initial_mode: Mode::from_index(self.mode as usize).unwrap_or_default(),
            auto_mode: self.auto_mode,
            ticks_per_mode: self.ticks_per_mode,
            disable_flow: self.no_flow,
            solver: SolverParams {
                dt: self.dt,
                diffusion: self.diffusion,
                viscosity: self.viscosity,
                ..SolverParams::default()
            },
            source,
            output: OutputSettings {
                frames_dir,
                save_every: self.save_every,
            },
            ..SessionInput::default()
        };
        input.validate()?;

        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_synthetic_session() {
        let args = CliArgs::parse_from(["fluid-wall"]);
        let input = args.create_input().unwrap();

        assert_eq!(input.grid_size, 128);
        assert_eq!(input.initial_mode, Mode::SingleColor);
        assert!(matches!(input.source, SourceSettings::Synthetic { users: 2, .. }));
        assert_eq!(input.output.frames_dir, PathBuf::from("wall-frames"));
    }

    #[test]
    fn test_flags_reach_input() {
        let args = CliArgs::parse_from([
            "fluid-wall",
            "--mode",
            "2",
            "--auto-mode",
            "--no-flow",
            "--grid-size",
            "64",
            "--dt",
            "0.2",
            "--source",
            "sequence",
            "--frames-in",
            "depth",
        ]);
        let input = args.create_input().unwrap();

        assert_eq!(input.initial_mode, Mode::MultiUser);
        assert!(input.auto_mode && input.disable_flow);
        assert_eq!(input.grid_size, 64);
        assert_eq!(input.solver.dt, 0.2);
        assert_eq!(
            input.source,
            SourceSettings::Sequence {
                frames_in: PathBuf::from("depth"),
                labels_in: None,
                looping: false,
            }
        );
    }

    #[test]
    fn test_still_source_needs_mask() {
        let args = CliArgs::parse_from(["fluid-wall", "--source", "still"]);
        assert!(matches!(args.create_input(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_mode_out_of_range_is_rejected() {
        assert!(CliArgs::try_parse_from(["fluid-wall", "--mode", "4"]).is_err());
    }

    #[test]
    fn test_input_json_round_trip() {
        let path = std::env::temp_dir().join(format!("fluid-wall-input-{}.json", std::process::id()));
        let saved = SessionInput {
            ticks: 42,
            ..SessionInput::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&saved).unwrap()).unwrap();

        let args = CliArgs::parse_from(["fluid-wall", "--input-json", path.to_str().unwrap()]);
        assert_eq!(args.create_input().unwrap(), saved);

        std::fs::remove_file(&path).unwrap();
    }
}
