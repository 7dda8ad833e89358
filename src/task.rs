/// Task runner for a whole session
use std::{
    error::Error,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::{
    config::{ScriptedAction, ScriptedEvent, SessionInput},
    mode::Mode,
    observers::imgstream,
    session::{Command, Session, TickOutcome},
};

pub struct RunSummary {
    pub advanced: usize,
    pub skipped: usize,
    pub frames_saved: usize,
    pub exhausted: bool,
    pub final_mode: Mode,
    pub auto_mode: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "Session finished in {:.2?}:\n\n\
        \t advanced:   {} ticks\n\
        \t skipped:    {} ticks\n\
        \t saved:      {} frames\n\
        \t final mode: {:?} (auto: {})\n\
        \t exhausted:  {}\n\n\
        ",
            self.elapsed,
            self.advanced,
            self.skipped,
            self.frames_saved,
            self.final_mode,
            self.auto_mode,
            self.exhausted,
        );
    }
}

/// Replay every scripted input due at `tick`
fn apply_events(session: &mut Session, events: &[ScriptedEvent], tick: usize) {
    for event in events.iter().filter(|e| e.tick == tick) {
        match event.action {
            ScriptedAction::Key(key) => match Command::from_key(key) {
                Some(command) => session.handle(command),
                None => warn!("Key {:?} at tick {} is not bound to anything", key, tick),
            },
            ScriptedAction::Pointer(pointer) => session.pointer_event(pointer),
        }
    }
}

/// Run `input.ticks` ticks on this thread, handing every `save_every`-th
/// frame to an image IO thread.
pub fn run_session(input: &SessionInput) -> Result<RunSummary, Box<dyn Error>> {
    let mut source = input.build_source()?;
    let mut session = Session::new(input)?;
    let start = Instant::now();

    let bar = ProgressBar::new(input.ticks as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "[Elapsed: {elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks (Remaining: {eta_precise})",
        )?
        .progress_chars("##-"),
    );

    let save_every = input.output.save_every;
    let (sender, receiver) = mpsc::channel();

    // spawn image io thread
    let io_thread = (save_every > 0).then(|| {
        let frames_dir = input.output.frames_dir.clone();
        thread::spawn(move || {
            imgstream::image_io_loop(receiver, &frames_dir).map_err(|err| err.to_string())
        })
    });

    let mut summary = RunSummary {
        advanced: 0,
        skipped: 0,
        frames_saved: 0,
        exhausted: false,
        final_mode: input.initial_mode,
        auto_mode: input.auto_mode,
        elapsed: Duration::ZERO,
    };
    let mut saving = io_thread.is_some();

    for i in 0..input.ticks {
        apply_events(&mut session, &input.events, i);

        match session.tick(source.as_mut()) {
            TickOutcome::Advanced => summary.advanced += 1,
            TickOutcome::Skipped => summary.skipped += 1,
            TickOutcome::Exhausted => {
                info!("Frame source ran out after {} ticks", i);
                summary.exhausted = true;
                break;
            }
        }

        if saving && i % save_every == 0 {
            if sender.send(session.snapshot(i)).is_ok() {
                summary.frames_saved += 1;
            } else {
                warn!("Image IO thread stopped; no further frames are saved");
                saving = false;
            }
        }

        bar.inc(1);
    }
    bar.finish();

    // hang up so the io thread drains and exits
    drop(sender);
    if let Some(handle) = io_thread {
        handle
            .join()
            .map_err(|_| "Image IO thread panicked")?
            .map_err(|err| format!("Failed to save frames: {err}"))?;
    }

    summary.final_mode = session.modes().mode();
    summary.auto_mode = session.modes().auto();
    summary.elapsed = start.elapsed();

    Ok(summary)
}
