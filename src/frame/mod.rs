//! Frame acquisition.
//!
//! A [`FrameSource`] hands out the most recent frame on demand. The detector
//! never holds on to frames beyond a single inference call.

mod image_dir;

use std::path::PathBuf;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;

pub use image_dir::ImageDirSource;

/// One captured frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Monotonic index assigned by the source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Errors raised while acquiring a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The device has not produced a frame yet.
    #[error("Frame source is not ready: {reason}")]
    NotReady { reason: String },
    /// The device failed or went away.
    #[error("Frame device error: {reason}")]
    Device { reason: String },
    /// A recorded frame could not be decoded.
    #[error("Failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Supplier of the current frame.
pub trait FrameSource: Send {
    /// Capture the frame that is current right now.
    fn current_frame(&mut self) -> Result<Frame, FrameError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}
