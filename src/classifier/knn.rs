use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1};

use super::dataset::{DATASET_VERSION, DatasetSnapshot, ExampleRecord};
use super::{ClassifyError, ExampleStore, Label, Prediction};
use crate::embedding::Embedding;

/// Brute-force k-nearest-neighbour classifier over cosine similarity.
///
/// Examples are stored L2-normalised, one per row, so similarity against every
/// stored example is a single matrix-vector product. Confidence for a label is
/// its share of the top-k votes. Vote ties go to the label seen first.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    examples: Option<Array2<f32>>,
    row_labels: Vec<usize>,
    classes: Vec<Label>,
    class_counts: Vec<usize>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            examples: None,
            row_labels: Vec::new(),
            classes: Vec::new(),
            class_counts: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Labels in the order they were first seen.
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    /// Rebuild a classifier from a saved snapshot, preserving example order.
    pub fn from_snapshot(k: usize, snapshot: DatasetSnapshot) -> Result<Self, ClassifyError> {
        let mut classifier = Self::new(k);
        for record in snapshot.examples {
            if record.embedding.len() != snapshot.dim {
                return Err(ClassifyError::DimensionMismatch {
                    expected: snapshot.dim,
                    actual: record.embedding.len(),
                });
            }
            classifier.add_example(Embedding::new(record.embedding), record.label)?;
        }
        Ok(classifier)
    }

    fn class_index(&mut self, label: Label) -> usize {
        if let Some(index) = self.classes.iter().position(|known| *known == label) {
            return index;
        }
        self.classes.push(label);
        self.class_counts.push(0);
        self.classes.len() - 1
    }

    fn check_dim(&self, actual: usize) -> Result<(), ClassifyError> {
        if actual == 0 {
            return Err(ClassifyError::EmptyEmbedding);
        }
        match self.dim() {
            Some(expected) if expected != actual => {
                Err(ClassifyError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl ExampleStore for KnnClassifier {
    fn add_example(&mut self, embedding: Embedding, label: Label) -> Result<(), ClassifyError> {
        self.check_dim(embedding.dim())?;
        let dim = embedding.dim();
        let row = embedding.normalized().into_vec();
        let matrix = self
            .examples
            .get_or_insert_with(|| Array2::zeros((0, dim)));
        let expected = matrix.ncols();
        matrix
            .push_row(ArrayView1::from(row.as_slice()))
            .map_err(|_| ClassifyError::DimensionMismatch {
                expected,
                actual: dim,
            })?;
        let class = self.class_index(label);
        self.row_labels.push(class);
        self.class_counts[class] += 1;
        Ok(())
    }

    fn predict(&self, embedding: &Embedding) -> Result<Prediction, ClassifyError> {
        let Some(matrix) = self.examples.as_ref().filter(|m| m.nrows() > 0) else {
            return Err(ClassifyError::NoExamples);
        };
        self.check_dim(embedding.dim())?;

        let query = Array1::from(embedding.normalized().into_vec());
        let similarities = matrix.dot(&query);
        let mut order: Vec<usize> = (0..similarities.len()).collect();
        order.sort_by(|&a, &b| similarities[b].total_cmp(&similarities[a]));

        let k = self.k.min(order.len());
        let mut votes = vec![0usize; self.classes.len()];
        for &row in order.iter().take(k) {
            votes[self.row_labels[row]] += 1;
        }

        let mut winner = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[winner] {
                winner = class;
            }
        }
        let confidences = self
            .classes
            .iter()
            .zip(&votes)
            .map(|(label, &count)| (label.clone(), count as f32 / k as f32))
            .collect::<BTreeMap<_, _>>();
        Ok(Prediction {
            label: self.classes[winner].clone(),
            confidences,
        })
    }

    fn example_count(&self, label: &Label) -> usize {
        self.classes
            .iter()
            .position(|known| known == label)
            .map(|index| self.class_counts[index])
            .unwrap_or(0)
    }

    /// Fixed by the first example.
    fn dim(&self) -> Option<usize> {
        self.examples.as_ref().map(|matrix| matrix.ncols())
    }

    fn total_examples(&self) -> usize {
        self.row_labels.len()
    }

    fn snapshot(&self) -> Option<DatasetSnapshot> {
        let matrix = self.examples.as_ref()?;
        let examples = matrix
            .rows()
            .into_iter()
            .zip(&self.row_labels)
            .map(|(row, &class)| ExampleRecord {
                label: self.classes[class].clone(),
                embedding: row.to_vec(),
            })
            .collect();
        Some(DatasetSnapshot {
            version: DATASET_VERSION,
            dim: matrix.ncols(),
            examples,
        })
    }
}
