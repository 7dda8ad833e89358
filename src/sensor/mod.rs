// Depth-sensor side: frame acquisition and coupling into the solver

pub mod coupler;
pub mod flow;
pub mod image_source;
pub mod synthetic;

use na::DMatrix;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("frame source has no more frames")]
    Exhausted,

    #[error("failed to decode frame: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to read frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame is {found:?} pixels, expected {expected:?}")]
    Shape {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// One acquired frame, already flipped and resampled to the grid resolution.
/// Pixel `(x, y)` covers grid cell `(x + 1, y + 1)`.
#[derive(Clone, Debug)]
pub struct SensorFrame {
    /// Occupancy; any positive pixel is solid
    pub occupancy: DMatrix<u8>,

    /// Per-pixel user label, when the sensor tracks users
    pub labels: Option<DMatrix<u8>>,
}

impl SensorFrame {
    pub fn new(occupancy: DMatrix<u8>, labels: Option<DMatrix<u8>>) -> Result<Self, SensorError> {
        if let Some(labels) = &labels {
            if labels.shape() != occupancy.shape() {
                return Err(SensorError::Shape {
                    expected: occupancy.shape(),
                    found: labels.shape(),
                });
            }
        }

        Ok(SensorFrame { occupancy, labels })
    }

    /// Check the frame matches an `n x n` grid
    pub fn check_size(&self, n: usize) -> Result<(), SensorError> {
        if self.occupancy.shape() != (n, n) {
            return Err(SensorError::Shape {
                expected: (n, n),
                found: self.occupancy.shape(),
            });
        }
        Ok(())
    }

    /// Whether the pixel under grid cell `(x, y)` is solid
    pub fn is_solid(&self, x: usize, y: usize) -> bool {
        pixel(&self.occupancy, x, y).is_some_and(|p| p > 0)
    }

    /// User label under grid cell `(x, y)`; 0 (background) without labels
    pub fn label_at(&self, x: usize, y: usize) -> u8 {
        self.labels
            .as_ref()
            .and_then(|labels| pixel(labels, x, y))
            .unwrap_or(0)
    }
}

/// Pixel under a 1-based grid cell
fn pixel(image: &DMatrix<u8>, x: usize, y: usize) -> Option<u8> {
    if x == 0 || y == 0 {
        return None;
    }
    image.get((x - 1, y - 1)).copied()
}

/// Produces one frame per tick. Acquisition blocks; a failure means the tick
/// runs without new sensor input.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<SensorFrame, SensorError>;
}

#[cfg(test)]
mod tests {
    use na::dmatrix;

    use super::*;

    #[test]
    fn test_cell_to_pixel_offset() {
        let occupancy = dmatrix![
            0, 200;
            0, 0;
        ];
        let labels = dmatrix![
            0, 3;
            0, 0;
        ];
        let frame = SensorFrame::new(occupancy, Some(labels)).unwrap();

        assert!(frame.is_solid(1, 2));
        assert!(!frame.is_solid(2, 1));
        assert_eq!(frame.label_at(1, 2), 3);

        // halo and out-of-range cells read as open background
        assert!(!frame.is_solid(0, 1));
        assert!(!frame.is_solid(3, 3));
        assert_eq!(frame.label_at(0, 0), 0);
    }

    #[test]
    fn test_shape_checks() {
        let occupancy = DMatrix::from_element(4, 4, 0u8);
        let labels = DMatrix::from_element(3, 4, 0u8);

        assert!(matches!(
            SensorFrame::new(occupancy.clone(), Some(labels)),
            Err(SensorError::Shape { .. })
        ));

        let frame = SensorFrame::new(occupancy, None).unwrap();
        assert!(frame.check_size(4).is_ok());
        assert!(frame.check_size(5).is_err());
        assert_eq!(frame.label_at(1, 1), 0);
    }
}
