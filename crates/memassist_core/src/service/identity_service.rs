//! Person registration and face identification use-cases.
//!
//! # Responsibility
//! - Register people: validate the photo, encode the face, store the photo,
//!   the face vector and the person row.
//! - Identify a photo against the registry with first-match semantics.
//! - Remove people and their vectors.
//!
//! # Invariants
//! - When `register` fails, the registry is left as it was before the call
//!   and the stored photo (if any) is deleted.
//! - Only the first detected face of an image is used.
//! - `identify` never mutates the registry.
//! - A vector is removed only when no person row carries its name anymore.

use crate::error::ErrorCategory;
use crate::face::{EncoderError, FaceEncoder, FaceRegistry, FaceStoreError};
use crate::media::{validate_image, ImageRejection, PhotoStore};
use crate::model::face::{first_detected_face, FaceEncoding, Identification};
use crate::model::person::{NewPerson, Person, PersonId};
use crate::repo::person_repo::PersonRepository;
use crate::repo::{RepoError, RepoResult};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for registration and identification.
#[derive(Debug)]
pub enum IdentityError {
    InvalidImage(ImageRejection),
    MissingName,
    InvalidTolerance(f64),
    NoFaceDetected,
    PersonNotRecognized,
    PersonNotFound(PersonId),
    Encoder(EncoderError),
    FaceStore(FaceStoreError),
    Photo(std::io::Error),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl IdentityError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidImage(_) | Self::MissingName | Self::InvalidTolerance(_) => {
                ErrorCategory::Validation
            }
            Self::NoFaceDetected => ErrorCategory::NoFaceDetected,
            Self::PersonNotRecognized => ErrorCategory::PersonNotRecognized,
            Self::PersonNotFound(_) => ErrorCategory::NotFound,
            Self::Encoder(_)
            | Self::FaceStore(_)
            | Self::Photo(_)
            | Self::Repo(_)
            | Self::InconsistentState(_) => ErrorCategory::Persistence,
        }
    }
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidImage(reason) => write!(f, "{reason}"),
            Self::MissingName => write!(f, "name is required"),
            Self::InvalidTolerance(value) => {
                write!(f, "tolerance must be a non-negative number, got {value}")
            }
            Self::NoFaceDetected => write!(f, "no face detected in the image"),
            Self::PersonNotRecognized => write!(f, "person not recognized"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::Encoder(err) => write!(f, "{err}"),
            Self::FaceStore(err) => write!(f, "{err}"),
            Self::Photo(err) => write!(f, "photo storage failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent person state: {details}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidImage(err) => Some(err),
            Self::Encoder(err) => Some(err),
            Self::FaceStore(err) => Some(err),
            Self::Photo(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageRejection> for IdentityError {
    fn from(value: ImageRejection) -> Self {
        Self::InvalidImage(value)
    }
}

impl From<EncoderError> for IdentityError {
    fn from(value: EncoderError) -> Self {
        Self::Encoder(value)
    }
}

impl From<FaceStoreError> for IdentityError {
    fn from(value: FaceStoreError) -> Self {
        Self::FaceStore(value)
    }
}

impl From<RepoError> for IdentityError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::PersonNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Identity service over a person repository, a face encoder, the photo
/// store and a registry owned by the caller.
pub struct IdentityService<'reg, R: PersonRepository, E: FaceEncoder> {
    repo: R,
    encoder: E,
    photos: PhotoStore,
    registry: &'reg mut FaceRegistry,
}

impl<'reg, R: PersonRepository, E: FaceEncoder> IdentityService<'reg, R, E> {
    pub fn new(repo: R, encoder: E, photos: PhotoStore, registry: &'reg mut FaceRegistry) -> Self {
        Self {
            repo,
            encoder,
            photos,
            registry,
        }
    }

    pub fn registry(&self) -> &FaceRegistry {
        self.registry
    }

    /// Registers a person from a photo.
    ///
    /// Re-registering an existing name replaces that name's vector.
    pub fn register(
        &mut self,
        image: &[u8],
        name: &str,
        relation: &str,
        description: &str,
    ) -> Result<Person, IdentityError> {
        let format = validate_image(image).inspect_err(|reason| {
            warn!("event=person_register module=identity status=rejected reason=\"{reason}\"");
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::MissingName);
        }

        let encoding = self.subject_encoding(image)?;
        let photo_path = self.photos.save(image, format).map_err(IdentityError::Photo)?;

        let previous = match self.registry.insert(name, encoding) {
            Ok(previous) => previous,
            Err(err) => {
                self.discard_photo(&photo_path);
                return Err(err.into());
            }
        };

        let person = NewPerson::normalized(name, relation, description, photo_path.as_str())
            .ok_or(IdentityError::MissingName)
            .and_then(|person| self.repo.create_person(&person).map_err(IdentityError::from));

        let person_id = match person {
            Ok(id) => id,
            Err(err) => {
                if let Err(restore_err) = self.registry.restore(name, previous) {
                    error!(
                        "event=person_register module=identity status=error stage=restore_vector error={restore_err}"
                    );
                }
                self.discard_photo(&photo_path);
                return Err(err);
            }
        };

        info!(
            "event=person_register module=identity status=ok person_id={person_id} replaced_vector={}",
            previous.is_some()
        );
        self.repo
            .get_person(person_id)?
            .ok_or(IdentityError::InconsistentState(
                "registered person not found in read-back",
            ))
    }

    /// Identifies the first face in `image` against the registry.
    ///
    /// Returns the first registered name (in registry order) within
    /// `tolerance`, with confidence `1 - tolerance`.
    pub fn identify(&self, image: &[u8], tolerance: f64) -> Result<Identification, IdentityError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(IdentityError::InvalidTolerance(tolerance));
        }
        validate_image(image)?;

        let probe = self.subject_encoding(image)?;
        let Some(name) = self.registry.find_first_match(&probe, tolerance) else {
            info!(
                "event=person_identify module=identity status=not_recognized known={}",
                self.registry.len()
            );
            return Err(IdentityError::PersonNotRecognized);
        };

        let person = self.repo.find_first_by_name(name)?;
        info!(
            "event=person_identify module=identity status=ok has_record={}",
            person.is_some()
        );
        Ok(Identification {
            name: name.to_string(),
            match_confidence: 1.0 - tolerance,
            relation: person.as_ref().map(|p| p.relation.clone()),
            description: person.map(|p| p.description),
        })
    }

    /// Drops the stored vector for `name`; absence is a no-op.
    pub fn remove(&mut self, name: &str) -> Result<bool, IdentityError> {
        let removed = self.registry.remove(name)?;
        info!("event=face_remove module=identity status=ok removed={removed}");
        Ok(removed)
    }

    /// Deletes a person row, its photo and, when it was the last row with
    /// that name, the name's face vector.
    pub fn delete_person(&mut self, person_id: PersonId) -> Result<Person, IdentityError> {
        let person = self.repo.delete_person(person_id)?;
        self.discard_photo(&person.photo_path);

        if self.repo.count_by_name(&person.name)? == 0 {
            self.remove(&person.name)?;
        }
        info!("event=person_delete module=identity status=ok person_id={person_id}");
        Ok(person)
    }

    /// Lists people, newest first.
    pub fn list_people(&self) -> RepoResult<Vec<Person>> {
        self.repo.list_people()
    }

    fn subject_encoding(&self, image: &[u8]) -> Result<FaceEncoding, IdentityError> {
        let faces = self.encoder.encode_faces(image)?;
        if faces.len() > 1 {
            info!(
                "event=face_encode module=identity status=multiple faces={} used=first",
                faces.len()
            );
        }
        first_detected_face(faces).ok_or(IdentityError::NoFaceDetected)
    }

    fn discard_photo(&self, photo_path: &str) {
        if let Err(err) = self.photos.remove(photo_path) {
            warn!(
                "event=photo_remove module=identity status=error file={photo_path} error={err}"
            );
        }
    }
}
