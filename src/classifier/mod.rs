//! Labelled examples and nearest-neighbour classification.

pub mod dataset;
mod knn;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LabelSettings;
use crate::embedding::Embedding;

pub use dataset::{DatasetError, DatasetSnapshot, ExampleRecord};
pub use knn::KnnClassifier;

/// Class tag attached to training examples.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed labels of a session plus the one that raises alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<Label>,
    positive: Label,
}

impl LabelSet {
    /// Build a set; the positive label is added if `names` lacks it.
    pub fn new<I, S>(names: I, positive: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let positive = Label::new(positive);
        let mut labels: Vec<Label> = Vec::new();
        for name in names {
            let label = Label::new(name);
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        if !labels.contains(&positive) {
            labels.push(positive.clone());
        }
        Self { labels, positive }
    }

    pub fn from_settings(settings: &LabelSettings) -> Self {
        Self::new(settings.names.iter().cloned(), settings.positive.clone())
    }

    pub fn positive(&self) -> &Label {
        &self.positive
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.as_str() == name)
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }
}

/// Classifier output for one embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Share of neighbour votes per label, each in `[0, 1]`.
    pub confidences: BTreeMap<Label, f32>,
}

impl Prediction {
    /// Confidence for `label`; labels the classifier never saw score zero.
    pub fn confidence(&self, label: &Label) -> f32 {
        self.confidences.get(label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    /// Prediction was requested before any example was added.
    #[error("No training examples have been added yet")]
    NoExamples,
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding is empty")]
    EmptyEmbedding,
}

/// Append-only store of labelled examples that can classify new embeddings.
pub trait ExampleStore: Send {
    fn add_example(&mut self, embedding: Embedding, label: Label) -> Result<(), ClassifyError>;

    /// Fails with [`ClassifyError::NoExamples`] while the store is empty.
    fn predict(&self, embedding: &Embedding) -> Result<Prediction, ClassifyError>;

    fn example_count(&self, label: &Label) -> usize;

    fn total_examples(&self) -> usize;

    /// Embedding dimension the store is fixed to, once known.
    fn dim(&self) -> Option<usize> {
        None
    }

    /// Serializable copy of the stored examples, when the store supports it.
    fn snapshot(&self) -> Option<DatasetSnapshot> {
        None
    }
}
