//! Face identity: the persisted name → vector registry and the encoder seam.
//!
//! # Responsibility
//! - Keep one feature vector per registered name on disk and in memory.
//! - Abstract the face detection/encoding capability behind [`FaceEncoder`].
//!
//! # Invariants
//! - The registry is loaded once from its directory and kept consistent with
//!   every successful insert/remove.
//! - Matching is a linear scan returning the first vector within tolerance.

pub mod encoder;
pub mod registry;

pub use encoder::{CommandFaceEncoder, EncoderError, FaceEncoder};
pub use registry::{FaceRegistry, FaceStoreError};
