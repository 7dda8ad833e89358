/// Frame sources backed by PNG images on disk
use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{DynamicImage, GenericImageView, ImageReader, Pixel, imageops::FilterType};
use na::DMatrix;
use tracing::info;

use crate::sensor::{FrameSource, SensorError, SensorFrame};

const THRESHOLD_LUMA: u8 = 127;

/// Which side of the luma threshold counts as solid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    /// Dark shapes on a light background (drawn masks)
    DarkIsSolid,

    /// Bright pixels are near objects (thresholded depth frames)
    BrightIsSolid,
}

/// Flip an image vertically so row 0 is the bottom of the grid, then resample
/// it to `n x n` and return its luma indexed `(x, y)`.
fn resample_luma(image: &DynamicImage, n: usize, filter: FilterType) -> DMatrix<u8> {
    let resized = image.flipv().resize_exact(n as u32, n as u32, filter);

    let mut luma: DMatrix<u8> = DMatrix::zeros(n, n);
    resized.pixels().for_each(|(x, y, color)| {
        luma[(x as usize, y as usize)] = color.to_luma().0[0];
    });

    luma
}

/// Build an occupancy image (0 open, 255 solid) from a picture.
///
/// Parameters
/// - `image` - The decoded picture
/// - `n` - The grid resolution to resample to
/// - `polarity` - Which pixels count as solid
///
/// Returns
/// - The `n x n` occupancy, indexed `(x, y)`
pub fn occupancy_from_image(image: &DynamicImage, n: usize, polarity: Polarity) -> DMatrix<u8> {
    resample_luma(image, n, FilterType::CatmullRom).map(|luma| {
        let solid = match polarity {
            Polarity::DarkIsSolid => luma < THRESHOLD_LUMA,
            Polarity::BrightIsSolid => luma > THRESHOLD_LUMA,
        };
        if solid { 255 } else { 0 }
    })
}

/// Build a user-label image from a picture whose luma is the user id.
/// Resampled with nearest neighbour so ids never blend.
pub fn labels_from_image(image: &DynamicImage, n: usize) -> DMatrix<u8> {
    resample_luma(image, n, FilterType::Nearest)
}

/// Returns the same silhouette, loaded once from a PNG, on every tick.
pub struct StillMaskSource {
    frame: SensorFrame,
}

impl StillMaskSource {
    pub fn open(path: &Path, n: usize) -> Result<Self, SensorError> {
        let image = ImageReader::open(path)?.decode()?;
        info!("Loaded still mask {:?} ({}x{})", path, image.width(), image.height());

        let occupancy = occupancy_from_image(&image, n, Polarity::DarkIsSolid);
        Ok(StillMaskSource {
            frame: SensorFrame::new(occupancy, None)?,
        })
    }
}

impl FrameSource for StillMaskSource {
    fn next_frame(&mut self) -> Result<SensorFrame, SensorError> {
        Ok(self.frame.clone())
    }
}

/// Plays back a directory of numbered depth frames (`0.png`, `1.png`, ...),
/// with an optional directory of label frames sharing the same file names.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    labels_dir: Option<PathBuf>,
    n: usize,
    cursor: usize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn open(
        frames_dir: &Path,
        labels_dir: Option<&Path>,
        n: usize,
        looping: bool,
    ) -> Result<Self, SensorError> {
        let mut frames: Vec<PathBuf> = fs::read_dir(frames_dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();

        frames.sort_by_key(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0)
        });

        if frames.is_empty() {
            return Err(SensorError::Exhausted);
        }
        info!("Found {} frames in {:?}", frames.len(), frames_dir);

        Ok(ImageSequenceSource {
            frames,
            labels_dir: labels_dir.map(Path::to_path_buf),
            n,
            cursor: 0,
            looping,
        })
    }

    fn load(&self, path: &Path) -> Result<SensorFrame, SensorError> {
        let depth = ImageReader::open(path)?.decode()?;
        let occupancy = occupancy_from_image(&depth, self.n, Polarity::BrightIsSolid);

        let labels = match (&self.labels_dir, path.file_name()) {
            (Some(dir), Some(name)) => {
                let image = ImageReader::open(dir.join(name))?.decode()?;
                Some(labels_from_image(&image, self.n))
            }
            _ => None,
        };

        SensorFrame::new(occupancy, labels)
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<SensorFrame, SensorError> {
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Err(SensorError::Exhausted);
            }
            self.cursor = 0;
        }

        let path = self.frames[self.cursor].clone();
        self.cursor += 1;
        self.load(&path)
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    /// A 4x4 picture, dark in its top-left quadrant
    fn quadrant_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(4, 4, Luma([255]));
        for y in 0..2 {
            for x in 0..2 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_occupancy_is_flipped_vertically() {
        let occupancy = occupancy_from_image(&quadrant_image(), 4, Polarity::DarkIsSolid);

        // the top of the picture lands on the highest grid rows
        assert_eq!(occupancy[(0, 3)], 255);
        assert_eq!(occupancy[(1, 2)], 255);
        assert_eq!(occupancy[(0, 0)], 0);
        assert_eq!(occupancy[(3, 3)], 0);
    }

    #[test]
    fn test_polarity() {
        let dark = occupancy_from_image(&quadrant_image(), 4, Polarity::DarkIsSolid);
        let bright = occupancy_from_image(&quadrant_image(), 4, Polarity::BrightIsSolid);

        assert!(dark.iter().zip(bright.iter()).all(|(d, b)| d != b));
    }

    #[test]
    fn test_labels_keep_ids() {
        let mut img = GrayImage::from_pixel(8, 8, Luma([0]));
        for y in 6..8 {
            for x in 0..4 {
                img.put_pixel(x, y, Luma([2]));
            }
        }
        let labels = labels_from_image(&DynamicImage::ImageLuma8(img), 4);

        assert!(labels.iter().all(|&l| l == 0 || l == 2));
        assert_eq!(labels[(0, 0)], 2);
        assert_eq!(labels[(3, 3)], 0);
    }

    #[test]
    fn test_sequence_plays_then_exhausts() {
        let dir = std::env::temp_dir().join(format!("fluid-wall-seq-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..2 {
            quadrant_image().save(dir.join(format!("{i}.png"))).unwrap();
        }

        let mut source = ImageSequenceSource::open(&dir, None, 4, false).unwrap();
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(matches!(source.next_frame(), Err(SensorError::Exhausted)));

        let mut looping = ImageSequenceSource::open(&dir, None, 4, true).unwrap();
        for _ in 0..5 {
            let frame = looping.next_frame().unwrap();
            assert!(frame.check_size(4).is_ok());
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
