use pipewright_config::{
  ConfigOwner, CruiseConfig, ErrorMap, FetchTask, JobLocation, Task, TaskKind,
};
use pipewright_store::{ConfigRepository, SwapOutcome};
use tracing::{debug, instrument};

use crate::error::TaskServiceError;

/// The config as read for an edit.
#[derive(Debug, Clone)]
pub struct EditSnapshot {
  pub config: CruiseConfig,
  /// `config` with templates expanded into their pipelines.
  pub processed: CruiseConfig,
  pub digest: String,
}

/// A change to the task list of one job.
#[derive(Debug, Clone)]
pub enum TaskEdit {
  Add(Box<Task>),
  Replace { index: usize, task: Box<Task> },
  Delete { index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
  /// `task_index` is the position of the added, replaced or deleted task.
  Saved { digest: String, task_index: usize },
  Conflict { current_digest: String },
  /// The edited task failed config-level checks. It carries its errors.
  ValidationFailed(Box<Task>),
}

/// Applies task edits to the live config through the repository's
/// compare-and-swap.
pub struct ConfigSavePipeline<R> {
  repository: R,
}

impl<R: ConfigRepository> ConfigSavePipeline<R> {
  pub fn new(repository: R) -> Self {
    Self { repository }
  }

  pub fn repository(&self) -> &R {
    &self.repository
  }

  /// Read the config for editing `owner` as `user`.
  pub async fn load_for_edit(
    &self,
    owner: &ConfigOwner,
    user: &str,
  ) -> Result<EditSnapshot, TaskServiceError> {
    let snapshot = self.repository.current().await?;
    if !snapshot.config.has_owner(owner) {
      return Err(TaskServiceError::NotFound {
        what: owner.to_string(),
      });
    }
    if !snapshot.config.is_admin(user) {
      return Err(TaskServiceError::Forbidden {
        user: user.to_string(),
        owner: owner.clone(),
      });
    }

    let processed = snapshot.config.processed();
    Ok(EditSnapshot {
      config: snapshot.config,
      processed,
      digest: snapshot.digest,
    })
  }

  /// Apply `edit` to the job at `location` and commit it if the config still
  /// has `expected_digest`.
  #[instrument(skip(self, edit, location), fields(location = %location))]
  pub async fn save(
    &self,
    edit: TaskEdit,
    location: &JobLocation,
    expected_digest: &str,
  ) -> Result<SaveResult, TaskServiceError> {
    let snapshot = self.repository.current().await?;
    if snapshot.digest != expected_digest {
      debug!(current = %snapshot.digest, "stale digest, not applying edit");
      return Ok(SaveResult::Conflict {
        current_digest: snapshot.digest,
      });
    }

    let mut config = snapshot.config;
    let job = config.job_mut(location).ok_or_else(|| TaskServiceError::NotFound {
      what: format!("job {location}"),
    })?;
    let task_not_found = |index| TaskServiceError::TaskNotFound {
      location: location.clone(),
      index,
    };

    let (task_index, added) = match edit {
      TaskEdit::Add(task) => {
        job.tasks.push(*task);
        (job.tasks.len() - 1, true)
      }
      TaskEdit::Replace { index, task } => {
        let slot = job.tasks.get_mut(index).ok_or_else(|| task_not_found(index))?;
        *slot = *task;
        (index, true)
      }
      TaskEdit::Delete { index } => {
        if index >= job.tasks.len() {
          return Err(task_not_found(index));
        }
        job.tasks.remove(index);
        (index, false)
      }
    };

    if added {
      let processed = config.processed();
      let task = config
        .job_mut(location)
        .and_then(|job| job.tasks.get_mut(task_index))
        .ok_or_else(|| task_not_found(task_index))?;
      check_fetch_references(&processed, location, task);
      if !task.is_valid() {
        return Ok(SaveResult::ValidationFailed(Box::new(task.clone())));
      }
    }

    match self.repository.compare_and_swap(config, expected_digest).await? {
      SwapOutcome::Committed { digest } => Ok(SaveResult::Saved { digest, task_index }),
      SwapOutcome::Conflict { current_digest } => Ok(SaveResult::Conflict { current_digest }),
    }
  }
}

/// Check that fetch tasks in the chain point at an existing pipeline, stage
/// and job of the processed config. Adds to the tasks' existing errors.
fn check_fetch_references(processed: &CruiseConfig, location: &JobLocation, task: &mut Task) {
  let mut current = Some(task);
  while let Some(task) = current {
    let errors = match task.kind() {
      TaskKind::Fetch(fetch) => fetch_reference_errors(processed, location, fetch),
      _ => ErrorMap::new(),
    };
    for (field, messages) in errors.iter() {
      for message in messages {
        task.errors_mut().add(field, message.clone());
      }
    }
    current = task.on_cancel_mut();
  }
}

fn fetch_reference_errors(
  processed: &CruiseConfig,
  location: &JobLocation,
  fetch: &FetchTask,
) -> ErrorMap {
  let mut errors = ErrorMap::new();
  if fetch.stage.trim().is_empty() || fetch.job.trim().is_empty() {
    // Already reported as required fields.
    return errors;
  }

  let explicit = fetch.pipeline.as_deref().map(str::trim).filter(|p| !p.is_empty());
  let owning_pipeline = match &location.owner {
    ConfigOwner::Pipeline(name) => Some(name.as_str()),
    ConfigOwner::Template(_) => None,
  };

  let (owner, stages) = match explicit.or(owning_pipeline) {
    Some(name) => {
      let Some(pipeline) = processed.pipeline(name) else {
        errors.add("pipeline", format!("Pipeline '{name}' does not exist."));
        return errors;
      };
      (format!("pipeline '{name}'"), pipeline.stages.as_slice())
    }
    // Fetching within a template: resolve against the template itself.
    None => match processed.template(location.owner.name()) {
      Some(template) => (location.owner.to_string(), template.stages.as_slice()),
      None => return errors,
    },
  };

  let Some(stage) = stages.iter().find(|s| s.name == fetch.stage) else {
    errors.add(
      "stage",
      format!("Stage '{}' does not exist in {owner}.", fetch.stage),
    );
    return errors;
  };
  if stage.job(&fetch.job).is_none() {
    errors.add(
      "job",
      format!(
        "Job '{}' does not exist in stage '{}' of {owner}.",
        fetch.job, fetch.stage
      ),
    );
  }
  errors
}
