use std::sync::Arc;

use pipewright_config::{JobLocation, Task};
use pipewright_resolver::{TaskBuilder, TaskValidator, ValidationContext};
use pipewright_store::ConfigRepository;
use pipewright_task_registry::TaskRegistry;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cipher::SecretCipher;
use crate::error::TaskServiceError;
use crate::events::{NoopNotifier, TaskEvent, TaskNotifier};
use crate::save::{ConfigSavePipeline, EditSnapshot, SaveResult, TaskEdit};
use crate::submission::TaskSubmission;

/// A stored task prepared for the edit form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
  pub task: Task,
  pub digest: String,
}

/// A task as persisted by a create, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTask {
  pub task: Task,
  pub task_index: usize,
  pub digest: String,
}

/// Create, edit and delete tasks of pipeline and template jobs.
///
/// Every write is checked against the digest the caller read. A stale digest
/// yields [`TaskServiceError::ConfigConflict`] and nothing is written.
pub struct TaskService<R, N: TaskNotifier = NoopNotifier> {
  registry: Arc<TaskRegistry>,
  pipeline: ConfigSavePipeline<R>,
  cipher: Arc<dyn SecretCipher>,
  notifier: N,
}

impl<R: ConfigRepository> TaskService<R, NoopNotifier> {
  pub fn new(registry: Arc<TaskRegistry>, repository: R, cipher: Arc<dyn SecretCipher>) -> Self {
    Self::with_notifier(registry, repository, cipher, NoopNotifier)
  }
}

impl<R: ConfigRepository, N: TaskNotifier> TaskService<R, N> {
  pub fn with_notifier(
    registry: Arc<TaskRegistry>,
    repository: R,
    cipher: Arc<dyn SecretCipher>,
    notifier: N,
  ) -> Self {
    Self {
      registry,
      pipeline: ConfigSavePipeline::new(repository),
      cipher,
      notifier,
    }
  }

  pub fn registry(&self) -> &TaskRegistry {
    &self.registry
  }

  pub fn repository(&self) -> &R {
    self.pipeline.repository()
  }

  /// A default task of `task_type` for the "new task" form.
  pub fn new_task(&self, task_type: &str) -> Result<Task, TaskServiceError> {
    Ok(self.registry.task_instance_for(task_type)?)
  }

  pub fn task_types(&self) -> Vec<String> {
    self.registry.task_types()
  }

  /// The task at `index` of the job, with the digest to send back on save.
  #[instrument(skip(self, location), fields(location = %location))]
  pub async fn edit_task(
    &self,
    location: &JobLocation,
    index: usize,
    user: &str,
  ) -> Result<TaskView, TaskServiceError> {
    let snapshot = self.pipeline.load_for_edit(&location.owner, user).await?;
    let mut task = stored_task(&snapshot, location, index)?.clone();
    self.registry.attach_schemas(&mut task);
    Ok(TaskView {
      task,
      digest: snapshot.digest,
    })
  }

  /// Build a task from `submission` and append it to the job.
  #[instrument(
    skip(self, location, submission),
    fields(location = %location, task_type = %submission.task_type)
  )]
  pub async fn create_task(
    &self,
    location: &JobLocation,
    submission: &TaskSubmission,
    expected_digest: &str,
    user: &str,
  ) -> Result<SavedTask, TaskServiceError> {
    let snapshot = self.checked_snapshot(location, user, expected_digest).await?;
    job_tasks(&snapshot, location)?;

    let builder = TaskBuilder::new(&self.registry);
    let task = builder.build(&submission.task_type, &submission.merged_attributes())?;
    let task = self.prepare(task, location)?;

    let (task_index, digest) = self
      .commit(TaskEdit::Add(Box::new(task.clone())), location, expected_digest)
      .await?;
    info!(index = task_index, digest = %digest, "task created");
    self.notifier.notify(TaskEvent::TaskCreated {
      location: location.clone(),
      index: task_index,
      digest: digest.clone(),
    });
    Ok(SavedTask {
      task,
      task_index,
      digest,
    })
  }

  /// Merge `submission` into the stored task at `index` and save it.
  #[instrument(skip(self, location, submission), fields(location = %location))]
  pub async fn update_task(
    &self,
    location: &JobLocation,
    index: usize,
    submission: &TaskSubmission,
    expected_digest: &str,
    user: &str,
  ) -> Result<SavedTask, TaskServiceError> {
    let snapshot = self.checked_snapshot(location, user, expected_digest).await?;
    let mut task = stored_task(&snapshot, location, index)?.clone();

    if !submission.task_type.is_empty() && submission.task_type != task.type_name() {
      return Err(TaskServiceError::TypeMismatch {
        index,
        stored: task.type_name().to_string(),
        submitted: submission.task_type.clone(),
      });
    }

    self.registry.attach_schemas(&mut task);
    TaskBuilder::new(&self.registry).merge(&mut task, &submission.merged_attributes())?;
    let task = self.prepare(task, location)?;

    let edit = TaskEdit::Replace {
      index,
      task: Box::new(task.clone()),
    };
    let (task_index, digest) = self.commit(edit, location, expected_digest).await?;
    info!(index = task_index, digest = %digest, "task updated");
    self.notifier.notify(TaskEvent::TaskUpdated {
      location: location.clone(),
      index: task_index,
      digest: digest.clone(),
    });
    Ok(SavedTask {
      task,
      task_index,
      digest,
    })
  }

  /// Remove the task at `index`. Returns the removed task.
  #[instrument(skip(self, location), fields(location = %location))]
  pub async fn delete_task(
    &self,
    location: &JobLocation,
    index: usize,
    expected_digest: &str,
    user: &str,
  ) -> Result<SavedTask, TaskServiceError> {
    let snapshot = self.checked_snapshot(location, user, expected_digest).await?;
    let task = stored_task(&snapshot, location, index)?.clone();

    let (task_index, digest) = self
      .commit(TaskEdit::Delete { index }, location, expected_digest)
      .await?;
    info!(index = task_index, digest = %digest, "task deleted");
    self.notifier.notify(TaskEvent::TaskDeleted {
      location: location.clone(),
      index: task_index,
      digest: digest.clone(),
    });
    Ok(SavedTask {
      task,
      task_index,
      digest,
    })
  }

  async fn checked_snapshot(
    &self,
    location: &JobLocation,
    user: &str,
    expected_digest: &str,
  ) -> Result<EditSnapshot, TaskServiceError> {
    let snapshot = self.pipeline.load_for_edit(&location.owner, user).await?;
    if snapshot.digest != expected_digest {
      return Err(TaskServiceError::ConfigConflict {
        expected: expected_digest.to_string(),
        current: snapshot.digest,
      });
    }
    Ok(snapshot)
  }

  /// Validate a merged task and seal its secure values.
  fn prepare(&self, mut task: Task, location: &JobLocation) -> Result<Task, TaskServiceError> {
    let ctx = ValidationContext::for_location(location);
    let outcome = TaskValidator::new(&self.registry).validate(&mut task, &ctx);
    if let Some(failure) = outcome.plugin_failures.into_iter().next() {
      return Err(failure.into());
    }
    if !task.is_valid() {
      warn!(errors = ?task.error_report(), "task failed validation");
      let mut current = Some(&mut task);
      while let Some(task) = current {
        if let Some(pluggable) = task.pluggable_mut() {
          pluggable.mask_secure_values();
        }
        current = task.on_cancel_mut();
      }
      return Err(TaskServiceError::validation_failed(task));
    }

    let mut current = Some(&mut task);
    while let Some(task) = current {
      if let Some(pluggable) = task.pluggable_mut() {
        pluggable.seal_secure_values(|plain| self.cipher.encrypt(plain))?;
      }
      current = task.on_cancel_mut();
    }
    Ok(task)
  }

  async fn commit(
    &self,
    edit: TaskEdit,
    location: &JobLocation,
    expected_digest: &str,
  ) -> Result<(usize, String), TaskServiceError> {
    match self.pipeline.save(edit, location, expected_digest).await? {
      SaveResult::Saved { digest, task_index } => Ok((task_index, digest)),
      SaveResult::Conflict { current_digest } => {
        warn!(expected = %expected_digest, current = %current_digest, "config changed during save");
        Err(TaskServiceError::ConfigConflict {
          expected: expected_digest.to_string(),
          current: current_digest,
        })
      }
      SaveResult::ValidationFailed(task) => Err(TaskServiceError::validation_failed(*task)),
    }
  }
}

fn job_tasks<'a>(
  snapshot: &'a EditSnapshot,
  location: &JobLocation,
) -> Result<&'a [Task], TaskServiceError> {
  snapshot
    .config
    .job(location)
    .map(|job| job.tasks.as_slice())
    .ok_or_else(|| TaskServiceError::NotFound {
      what: format!("job {location}"),
    })
}

fn stored_task<'a>(
  snapshot: &'a EditSnapshot,
  location: &JobLocation,
  index: usize,
) -> Result<&'a Task, TaskServiceError> {
  job_tasks(snapshot, location)?
    .get(index)
    .ok_or_else(|| TaskServiceError::TaskNotFound {
      location: location.clone(),
      index,
    })
}
