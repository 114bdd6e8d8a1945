use image::imageops::{self, FilterType};

use super::{EmbedError, Embedder, Embedding, normalize_l2_in_place};
use crate::frame::Frame;

/// Centred values below this are rounding noise from a flat frame.
const FLAT_TOLERANCE: f32 = 1e-5;

/// Embeds a frame as a mean-centred RGB thumbnail.
///
/// Cheap and fully deterministic. Good enough to separate a hand on the face
/// from an empty frame when the camera does not move.
#[derive(Debug, Clone)]
pub struct ThumbnailEmbedder {
    side: u32,
}

impl ThumbnailEmbedder {
    pub fn new(side: u32) -> Self {
        Self { side: side.max(1) }
    }
}

impl Embedder for ThumbnailEmbedder {
    fn infer(&self, frame: &Frame) -> Result<Embedding, EmbedError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(EmbedError::EmptyFrame);
        }
        let thumb = imageops::resize(frame.image(), self.side, self.side, FilterType::Triangle);
        let mut values: Vec<f32> = thumb
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|channel| channel as f32 / 255.0)
            .collect();
        // Centre so global brightness shifts do not dominate similarity.
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        for value in &mut values {
            *value -= mean;
        }
        if values.iter().all(|value| value.abs() < FLAT_TOLERANCE) {
            values.fill(0.0);
        }
        normalize_l2_in_place(&mut values);
        Ok(Embedding::new(values))
    }

    fn dim(&self) -> usize {
        (self.side * self.side * 3) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_frame() -> Frame {
        let image = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 128]));
        Frame::new(image, 0)
    }

    #[test]
    fn produces_unit_vector_of_expected_dim() {
        let embedder = ThumbnailEmbedder::new(8);
        let embedding = embedder.infer(&gradient_frame()).unwrap();
        assert_eq!(embedding.dim(), embedder.dim());
        assert_eq!(embedding.dim(), 8 * 8 * 3);
        assert!((embedding.l2_norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn identical_frames_embed_identically() {
        let embedder = ThumbnailEmbedder::new(6);
        let a = embedder.infer(&gradient_frame()).unwrap();
        let b = embedder.infer(&gradient_frame()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_frame_maps_to_zero_vector() {
        let embedder = ThumbnailEmbedder::new(4);
        let frame = Frame::new(RgbImage::from_pixel(10, 10, Rgb([90, 90, 90])), 0);
        let embedding = embedder.infer(&frame).unwrap();
        assert!(embedding.as_slice().iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let embedder = ThumbnailEmbedder::new(4);
        let frame = Frame::new(RgbImage::new(0, 0), 0);
        assert!(matches!(embedder.infer(&frame), Err(EmbedError::EmptyFrame)));
    }
}
