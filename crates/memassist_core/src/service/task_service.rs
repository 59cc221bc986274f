//! Reminder task use-case service.
//!
//! # Responsibility
//! - Validate creation payloads and persist tasks with their weekday tags.
//! - Toggle completion, the only mutation allowed after creation.
//!
//! # Invariants
//! - Creation is all-or-nothing, weekday tags included.
//! - `set_completion` on an unknown id mutates nothing.
//! - Every returned record is read back from storage.

use crate::error::ErrorCategory;
use crate::model::task::{CreateTaskInput, Task, TaskId, TaskValidationError};
use crate::repo::task_repo::TaskRepository;
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    Validation(TaskValidationError),
    TaskNotFound(TaskId),
    Repo(RepoError),
    /// A write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl TaskServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::TaskNotFound(_) => ErrorCategory::NotFound,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorCategory::Persistence,
        }
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::TaskNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Task service facade over repository implementations.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates `input` and persists the task atomically.
    pub fn create_task(&mut self, input: &CreateTaskInput) -> Result<Task, TaskServiceError> {
        let new_task = input.validate().inspect_err(|err| {
            warn!("event=task_create module=task status=rejected reason=\"{err}\"");
        })?;

        let task_id = self.repo.create_task(&new_task)?;
        info!(
            "event=task_create module=task status=ok task_id={task_id} repeat_type={} repeat_days={}",
            new_task.repeat_type.as_str(),
            new_task.repeat_days.len()
        );

        self.repo
            .get_task(task_id)?
            .ok_or(TaskServiceError::InconsistentState(
                "created task not found in read-back",
            ))
    }

    /// Sets the completion flag exactly to `completed`. Idempotent.
    pub fn set_completion(
        &self,
        task_id: TaskId,
        completed: bool,
    ) -> Result<Task, TaskServiceError> {
        self.repo.set_task_completion(task_id, completed)?;
        info!("event=task_completion module=task status=ok task_id={task_id} completed={completed}");

        self.repo
            .get_task(task_id)?
            .ok_or(TaskServiceError::InconsistentState(
                "updated task not found in read-back",
            ))
    }

    pub fn get_task(&self, task_id: TaskId) -> RepoResult<Option<Task>> {
        self.repo.get_task(task_id)
    }

    /// Lists all tasks, newest first.
    pub fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        self.repo.list_tasks()
    }
}
