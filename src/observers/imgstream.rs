use na::DMatrix;
use plotters::prelude::*;
use std::{error::Error, fs, path::Path, sync::mpsc};
use tracing::{debug, info};

use crate::{
    BoundaryMask, ScalarField, VectorField,
    mode::ModeFlags,
    observers::palette::{self, BOUND_COLOR, Rgb, UserPalette},
};

/// Density as it was at the end of a tick
#[derive(Clone)]
pub enum DensitySnapshot {
    Single(ScalarField),
    Users(Vec<ScalarField>),
}

/// Copy of everything needed to draw one tick, sent to the IO thread
#[derive(Clone)]
pub struct FramePacket {
    pub i: usize,
    pub density: DensitySnapshot,
    pub velocity: VectorField,
    pub bounds: BoundaryMask,
    pub labels: Option<DMatrix<u8>>,
    pub flags: ModeFlags,
}

/// Velocity magnitude over the interior, normalized to its maximum
fn velocity_view(velocity: &VectorField, n: usize) -> DMatrix<Rgb> {
    let magnitude = velocity[0]
        .zip_map(&velocity[1], |u, v| (u * u + v * v).sqrt())
        .view((1, 1), (n, n))
        .into_owned();

    let max = magnitude.max();

    magnitude.map(|m| {
        let k = if max > 0. { m / max } else { 0. };
        Rgb::new(k, k, k)
    })
}

/// Colour every interior cell of a packet, indexed `(x - 1, y - 1)`.
pub fn compose_frame(packet: &FramePacket) -> DMatrix<Rgb> {
    let n = packet.bounds.nrows() - 2;
    let flags = &packet.flags;
    let palette = UserPalette::for_background(flags.white_background);

    let mut pixels = if flags.display_velocity {
        velocity_view(&packet.velocity, n)
    } else {
        DMatrix::from_fn(n, n, |x, y| {
            let (x, y) = (x + 1, y + 1);
            match &packet.density {
                DensitySnapshot::Single(density) => {
                    palette::density_color(density[(x, y)], packet.bounds[(x, y)])
                }
                DensitySnapshot::Users(layers) => palette::weighted_color(layers, x, y, &palette),
            }
        })
    };

    if flags.display_bounds {
        for (x, y) in (0..n).flat_map(|y| (0..n).map(move |x| (x, y))) {
            if packet.bounds[(x + 1, y + 1)] {
                pixels[(x, y)] = BOUND_COLOR;
            }
        }
    }

    let show_users = flags.display_users && matches!(packet.density, DensitySnapshot::Users(_));
    if let (true, Some(labels)) = (show_users, &packet.labels) {
        let silhouettes = UserPalette::dark();
        for (pixel, &label) in pixels.iter_mut().zip(labels.iter()) {
            if label != 0 {
                *pixel = silhouettes.color(label as usize);
            }
        }
    }

    pixels
}

/// Write a frame to `frames_dir/filename`. Row 0 of the frame is the bottom
/// of the grid, so it is drawn last.
pub fn image_save(
    pixels: &DMatrix<Rgb>,
    filename: &str,
    frames_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let (width, height) = pixels.shape();

    let filename = frames_dir.join(filename);

    let root = BitMapBackend::new(&filename, (width as u32, height as u32)).into_drawing_area();
    root.fill(&BLACK)?;

    for y in 0..height {
        for x in 0..width {
            let [r, g, b] = pixels
                .get((x, y))
                .ok_or("Pixel not on frame")?
                .to_bytes();

            root.draw_pixel((x as i32, (height - 1 - y) as i32), &RGBColor(r, g, b))?;
        }
    }
    root.present()?;

    Ok(())
}

/// Receive packets until the sender hangs up, saving each as `<i>.png`.
pub fn image_io_loop(
    inbound_frames: mpsc::Receiver<FramePacket>,
    frames_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    if frames_dir.exists() {
        fs::remove_dir_all(frames_dir)?;
    }
    fs::create_dir_all(frames_dir)?;

    let mut saved = 0;
    for inbound in inbound_frames {
        let pixels = compose_frame(&inbound);
        image_save(&pixels, &format!("{}.png", inbound.i), frames_dir)?;
        debug!("Saved frame {}", inbound.i);
        saved += 1;
    }

    info!("Saved {} frames to {:?}", saved, frames_dir);
    Ok(())
}
