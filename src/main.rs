use std::{fs::File, io::BufWriter, process::exit};

extern crate nalgebra as na;

mod config;
mod mode;
mod observers;
mod pointer;
mod sensor;
mod session;
mod sim;
mod task;

use clap::Parser;
use na::DMatrix;
use tracing::{Level, error, info};

use config::cli::CliArgs;

type ScalarField = DMatrix<f32>;
type VectorField = [ScalarField; 2];
type BoundaryMask = DMatrix<bool>;

fn main() {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let session_input = match args.create_input() {
        Ok(input) => input,
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    };

    if let Some(savepath) = &args.input_json_savepath {
        let saved = File::create(savepath)
            .map(BufWriter::new)
            .map_err(|err| err.to_string())
            .and_then(|writer| {
                serde_json::to_writer_pretty(writer, &session_input).map_err(|err| err.to_string())
            });

        match saved {
            Ok(()) => info!("Saved session input to {:?}", savepath),
            Err(err) => error!("Failed to save session input: {err}"),
        }
    }

    session_input.log();

    match task::run_session(&session_input) {
        Ok(summary) => summary.log(),
        Err(err) => {
            error!("Session failed: {err}");
            exit(1);
        }
    }
}
