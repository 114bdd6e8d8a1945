//! Frame embeddings.
//!
//! An [`Embedder`] maps a frame to a fixed-length feature vector. Vectors are
//! L2-normalised so the classifier can compare them with a dot product.

mod thumbnail;

use thiserror::Error;

use crate::frame::Frame;

pub use thumbnail::ThumbnailEmbedder;

/// Feature vector for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn l2_norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Copy scaled to unit length. Zero vectors stay zero.
    pub fn normalized(&self) -> Self {
        let mut values = self.0.clone();
        normalize_l2_in_place(&mut values);
        Self(values)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Errors raised by an embedder.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Frame has no pixels")]
    EmptyFrame,
    #[error("Embedding model failed: {0}")]
    Model(String),
}

/// Maps frames to embeddings. Must be deterministic for identical frames.
pub trait Embedder: Send + Sync {
    fn infer(&self, frame: &Frame) -> Result<Embedding, EmbedError>;

    /// Length of every vector produced by [`Embedder::infer`].
    fn dim(&self) -> usize;
}

pub(crate) fn normalize_l2_in_place(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        let scale = 1.0 / norm;
        for value in values {
            *value *= scale;
        }
    }
}
