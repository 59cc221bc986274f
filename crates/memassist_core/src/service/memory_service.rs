//! Memory log use-case service.
//!
//! # Invariants
//! - Title and content are both required; surrounding whitespace is trimmed.
//! - Lists are newest first.

use crate::error::ErrorCategory;
use crate::model::memory::MemoryLog;
use crate::repo::memory_repo::MemoryRepository;
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for memory log use-cases.
#[derive(Debug)]
pub enum MemoryServiceError {
    /// Title or content missing/blank.
    MissingField,
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl MemoryServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField => ErrorCategory::Validation,
            Self::Repo(RepoError::NotFound { .. }) => ErrorCategory::NotFound,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorCategory::Persistence,
        }
    }
}

impl Display for MemoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField => write!(f, "title and content are required"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent memory state: {details}"),
        }
    }
}

impl Error for MemoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MemoryServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Memory log service facade.
pub struct MemoryService<R: MemoryRepository> {
    repo: R,
}

impl<R: MemoryRepository> MemoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn add_memory(&self, title: &str, content: &str) -> Result<MemoryLog, MemoryServiceError> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(MemoryServiceError::MissingField);
        }

        let id = self.repo.create_memory(title, content)?;
        info!("event=memory_add module=memory status=ok memory_id={id}");
        self.repo
            .get_memory(id)?
            .ok_or(MemoryServiceError::InconsistentState(
                "created memory not found in read-back",
            ))
    }

    /// Newest first; `limit` caps the number of entries returned.
    pub fn list_memories(&self, limit: Option<u32>) -> RepoResult<Vec<MemoryLog>> {
        self.repo.list_memories(limit)
    }
}
