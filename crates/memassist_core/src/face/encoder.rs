//! Face detection/encoding capability.
//!
//! The encoding algorithm is external to this crate. Implementations receive
//! raw image bytes and return one vector per detected face, in the order the
//! detector reports them.

use crate::model::face::FaceEncoding;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Max stderr characters kept from a failing encoder process.
const MAX_STDERR_CHARS: usize = 400;

/// Error raised by a face encoder.
#[derive(Debug)]
pub enum EncoderError {
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    Io(std::io::Error),
    /// Encoder ran but exited unsuccessfully.
    Failed { status: String, stderr: String },
    /// Encoder output is not a list of equal-length, non-empty vectors.
    InvalidOutput(String),
}

impl Display for EncoderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "cannot start face encoder `{}`: {source}", program.display())
            }
            Self::Io(err) => write!(f, "face encoder I/O failed: {err}"),
            Self::Failed { status, stderr } => {
                write!(f, "face encoder exited with {status}: {stderr}")
            }
            Self::InvalidOutput(message) => write!(f, "invalid face encoder output: {message}"),
        }
    }
}

impl Error for EncoderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Produces zero or more face vectors for an image.
pub trait FaceEncoder {
    fn encode_faces(&self, image: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError>;
}

impl<E: FaceEncoder + ?Sized> FaceEncoder for &E {
    fn encode_faces(&self, image: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError> {
        (**self).encode_faces(image)
    }
}

impl<E: FaceEncoder + ?Sized> FaceEncoder for Box<E> {
    fn encode_faces(&self, image: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError> {
        (**self).encode_faces(image)
    }
}

/// Encoder delegating to an external program.
///
/// The program receives the image bytes on stdin and must print a JSON array
/// of vectors (`[[0.1, ...], ...]`) on stdout, one per detected face. An
/// empty array means no face was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFaceEncoder {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandFaceEncoder {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a whitespace-separated command line; `None` when blank.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl FaceEncoder for CommandFaceEncoder {
    fn encode_faces(&self, image: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError> {
        let started_at = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).map_err(EncoderError::Io)?;
        }

        let output = child.wait_with_output().map_err(EncoderError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect::<String>();
            return Err(EncoderError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let faces = parse_encoder_output(&output.stdout)?;
        debug!(
            "event=face_encode module=face status=ok faces={} duration_ms={}",
            faces.len(),
            started_at.elapsed().as_millis()
        );
        Ok(faces)
    }
}

/// Decodes the JSON vector list printed by an external encoder.
pub fn parse_encoder_output(stdout: &[u8]) -> Result<Vec<FaceEncoding>, EncoderError> {
    let raw: Vec<Vec<f64>> = serde_json::from_slice(stdout)
        .map_err(|err| EncoderError::InvalidOutput(err.to_string()))?;

    if let Some(first) = raw.first() {
        if first.is_empty() {
            return Err(EncoderError::InvalidOutput("empty face vector".to_string()));
        }
        if raw.iter().any(|values| values.len() != first.len()) {
            return Err(EncoderError::InvalidOutput(
                "face vectors differ in length".to_string(),
            ));
        }
    }

    Ok(raw.into_iter().map(FaceEncoding::new).collect())
}
