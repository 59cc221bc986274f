//! Core domain logic for the memory-assist companion.
//! People and their face vectors, reminder tasks, memory logs and the
//! memory chatbot live here; transports stay outside this crate.

pub mod db;
pub mod error;
pub mod face;
pub mod logging;
pub mod media;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::ErrorCategory;
pub use face::{CommandFaceEncoder, EncoderError, FaceEncoder, FaceRegistry, FaceStoreError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use media::{validate_image, ImageRejection, PhotoStore};
pub use model::face::{FaceEncoding, Identification, DEFAULT_TOLERANCE};
pub use model::memory::{MemoryId, MemoryLog};
pub use model::person::{NewPerson, Person, PersonId};
pub use model::task::{
    CreateTaskInput, RepeatDays, RepeatKind, Task, TaskId, TaskValidationError, Weekday,
};
pub use repo::memory_repo::{MemoryRepository, SqliteMemoryRepository};
pub use repo::person_repo::{PersonRepository, SqlitePersonRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use repo::{RepoError, RepoResult};
pub use service::chat_service::{ChatError, MemoryChatbot};
pub use service::identity_service::{IdentityError, IdentityService};
pub use service::memory_service::{MemoryService, MemoryServiceError};
pub use service::task_service::{TaskService, TaskServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
