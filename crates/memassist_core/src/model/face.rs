//! Face feature vectors and identification results.
//!
//! # Invariants
//! - A vector is compared only against vectors of the same length.
//! - Identification confidence is `1 - tolerance`, not a measured score.

use serde::{Deserialize, Serialize};

/// Default maximum Euclidean distance for two faces to be the same person.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Fixed-length numeric encoding of one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEncoding {
    pub values: Vec<f64>,
}

impl FaceEncoding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance, or `None` when the vectors differ in length.
    pub fn distance(&self, other: &FaceEncoding) -> Option<f64> {
        if self.values.len() != other.values.len() {
            return None;
        }
        let sum = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
        Some(sum.sqrt())
    }

    /// Returns whether `other` lies within `tolerance` of this vector.
    pub fn matches(&self, other: &FaceEncoding, tolerance: f64) -> bool {
        self.distance(other)
            .is_some_and(|distance| distance <= tolerance)
    }
}

/// Which detected face becomes the subject when an image holds several.
///
/// Only the first face reported by the encoder is ever used; the encoder's
/// ordering decides which face that is.
pub fn first_detected_face(mut faces: Vec<FaceEncoding>) -> Option<FaceEncoding> {
    if faces.is_empty() {
        None
    } else {
        Some(faces.swap_remove(0))
    }
}

/// Outcome of a successful identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub name: String,
    /// Always `1 - tolerance`.
    pub match_confidence: f64,
    /// Relation of the first person record carrying `name`, if any.
    pub relation: Option<String>,
    /// Description of the first person record carrying `name`, if any.
    pub description: Option<String>,
}
