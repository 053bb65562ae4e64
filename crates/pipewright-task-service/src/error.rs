use pipewright_config::{ConfigOwner, JobLocation, Task, TaskErrors};
use pipewright_task_registry::{PluginError, RegistryError};

use crate::cipher::CipherError;

/// Errors returned by [`crate::TaskService`].
///
/// Field-level problems never show up here on their own: they are collected
/// on the task and surface as [`TaskServiceError::ValidationFailed`].
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
  #[error("unknown task type '{name}'")]
  UnknownTaskType { name: String },

  #[error("task at index {index} is of type '{stored}', submission is '{submitted}'")]
  TypeMismatch {
    index: usize,
    stored: String,
    submitted: String,
  },

  /// The task is echoed back with its error maps filled in.
  #[error("task failed validation")]
  ValidationFailed {
    task: Box<Task>,
    errors: TaskErrors,
  },

  #[error("config was modified (expected digest {expected}, current {current})")]
  ConfigConflict { expected: String, current: String },

  #[error("{what} not found")]
  NotFound { what: String },

  #[error("task {index} not found in {location}")]
  TaskNotFound { location: JobLocation, index: usize },

  #[error("user '{user}' may not edit {owner}")]
  Forbidden { user: String, owner: ConfigOwner },

  #[error(transparent)]
  PluginFailure(#[from] PluginError),

  #[error("cipher error: {0}")]
  Cipher(#[from] CipherError),

  #[error("registry error: {0}")]
  Registry(RegistryError),

  #[error("store error: {0}")]
  Store(#[from] pipewright_store::Error),
}

impl From<RegistryError> for TaskServiceError {
  fn from(err: RegistryError) -> Self {
    match err {
      RegistryError::UnknownTaskType { name } => TaskServiceError::UnknownTaskType { name },
      other => TaskServiceError::Registry(other),
    }
  }
}

impl TaskServiceError {
  pub(crate) fn validation_failed(task: Task) -> Self {
    let errors = task.error_report();
    TaskServiceError::ValidationFailed {
      task: Box::new(task),
      errors,
    }
  }

  /// HTTP-style status code for the error.
  pub fn status_code(&self) -> u16 {
    match self {
      TaskServiceError::UnknownTaskType { .. }
      | TaskServiceError::TypeMismatch { .. }
      | TaskServiceError::ValidationFailed { .. } => 400,
      TaskServiceError::Forbidden { .. } => 403,
      TaskServiceError::NotFound { .. } | TaskServiceError::TaskNotFound { .. } => 404,
      TaskServiceError::ConfigConflict { .. } => 409,
      TaskServiceError::PluginFailure(_)
      | TaskServiceError::Cipher(_)
      | TaskServiceError::Registry(_)
      | TaskServiceError::Store(_) => 500,
    }
  }

  /// Whether the caller can fix the request and try again.
  pub fn is_recoverable(&self) -> bool {
    self.status_code() < 500
  }
}
