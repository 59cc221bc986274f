//! Failure categories shared by every use-case service.
//!
//! Callers (CLI, future transports) branch on [`ErrorCategory`] instead of
//! matching each service's error enum.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Coarse failure class reported by service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad or missing input; the caller can correct it.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// The image holds no detectable face.
    NoFaceDetected,
    /// No registered face lies within tolerance.
    PersonNotRecognized,
    /// Backing store (database, vector files, photos, encoder) failed.
    Persistence,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::NoFaceDetected => "no_face_detected",
            Self::PersonNotRecognized => "person_not_recognized",
            Self::Persistence => "persistence",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
