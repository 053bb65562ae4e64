use std::panic::{self, AssertUnwindSafe};

use pipewright_config::{
  ConfigOwner, ErrorMap, ExecTask, FetchTask, JobLocation, PluggableTask, Task, TaskKind,
};
use pipewright_task_registry::{PluginError, TaskRegistry};
use tracing::{debug, warn};

use crate::sandbox::is_outside_sandbox;

/// The job a task belongs to, used in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
  pub owner: ConfigOwner,
  pub stage: String,
  pub job: String,
}

impl ValidationContext {
  /// Context for a job of the pipeline named `pipeline`.
  pub fn new(
    pipeline: impl Into<String>,
    stage: impl Into<String>,
    job: impl Into<String>,
  ) -> Self {
    Self {
      owner: ConfigOwner::Pipeline(pipeline.into()),
      stage: stage.into(),
      job: job.into(),
    }
  }

  pub fn for_location(location: &JobLocation) -> Self {
    Self {
      owner: location.owner.clone(),
      stage: location.stage.clone(),
      job: location.job.clone(),
    }
  }

  fn outside_sandbox(&self, label: &str, path: &str) -> String {
    format!(
      "Task of job '{}' in stage '{}' of {} has {} path '{}' which is outside the working directory.",
      self.job, self.stage, self.owner, label, path
    )
  }
}

/// What a validation pass observed besides field errors.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
  /// Plugin hooks that failed or panicked. Their tasks' field errors are
  /// left as the other checks produced them.
  pub plugin_failures: Vec<PluginError>,
}

impl ValidationOutcome {
  pub fn has_plugin_failures(&self) -> bool {
    !self.plugin_failures.is_empty()
  }
}

/// Validates merged tasks and their on-cancel chain.
pub struct TaskValidator<'a> {
  registry: &'a TaskRegistry,
}

impl<'a> TaskValidator<'a> {
  pub fn new(registry: &'a TaskRegistry) -> Self {
    Self { registry }
  }

  /// Run every check on `task` and each nested on-cancel task, replacing
  /// their error maps. Domain violations only ever become field errors.
  pub fn validate(&self, task: &mut Task, ctx: &ValidationContext) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let mut current = Some(task);
    while let Some(task) = current {
      let errors = self.check(task, ctx, &mut outcome);
      *task.errors_mut() = errors;
      current = task.on_cancel_mut();
    }
    outcome
  }

  fn check(
    &self,
    task: &Task,
    ctx: &ValidationContext,
    outcome: &mut ValidationOutcome,
  ) -> ErrorMap {
    let mut errors = ErrorMap::new();

    match task.kind() {
      TaskKind::Exec(exec) => check_exec(exec, &mut errors),
      TaskKind::Fetch(fetch) => check_fetch(fetch, ctx, &mut errors),
      TaskKind::Pluggable(pluggable) => {
        check_plugin_configuration(pluggable, &mut errors);
        self.run_plugin_hook(pluggable, &mut errors, outcome);
      }
      TaskKind::Ant(_) | TaskKind::Nant(_) | TaskKind::Rake(_) => {}
    }

    if let Some(dir) = task.kind().working_directory()
      && is_outside_sandbox(dir)
    {
      errors.add("workingDirectory", ctx.outside_sandbox("working directory", dir));
    }

    errors
  }

  fn run_plugin_hook(
    &self,
    pluggable: &PluggableTask,
    errors: &mut ErrorMap,
    outcome: &mut ValidationOutcome,
  ) {
    let Some(validator) = self.registry.validator_for(&pluggable.plugin_id) else {
      debug!(plugin_id = %pluggable.plugin_id, "no validator registered for plugin");
      return;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| validator.validate(pluggable))) {
      Ok(Ok(field_errors)) => errors.extend(field_errors),
      Ok(Err(err)) => {
        warn!(plugin_id = %pluggable.plugin_id, error = %err, "plugin validation failed");
        outcome.plugin_failures.push(err);
      }
      Err(_) => {
        warn!(plugin_id = %pluggable.plugin_id, "plugin validation panicked");
        outcome
          .plugin_failures
          .push(PluginError::new(&pluggable.plugin_id, "validator panicked"));
      }
    }
  }
}

fn check_exec(exec: &ExecTask, errors: &mut ErrorMap) {
  if exec.command.trim().is_empty() {
    errors.add("command", "Command cannot be empty");
  }
  if exec.args.is_some() && !exec.arguments.is_empty() {
    errors.add(
      "args",
      "Can not use both 'args' and 'arguments' in the same 'exec' task.",
    );
  }
}

fn check_fetch(fetch: &FetchTask, ctx: &ValidationContext, errors: &mut ErrorMap) {
  if fetch.stage.trim().is_empty() {
    errors.add("stage", "Stage is a required field.");
  }
  if fetch.job.trim().is_empty() {
    errors.add("job", "Job is a required field.");
  }

  match (&fetch.source, &fetch.artifact_id) {
    (Some(_), Some(_)) => {
      let message = "Only one of source or artifactId may be specified.";
      errors.add("source", message);
      errors.add("artifactId", message);
    }
    (None, None) => errors.add("source", "Should provide either a source or an artifactId."),
    _ => {}
  }

  if let Some(source) = fetch.source.as_deref()
    && is_outside_sandbox(source)
  {
    errors.add("source", ctx.outside_sandbox("source", source));
  }
  if let Some(destination) = fetch.destination.as_deref()
    && is_outside_sandbox(destination)
  {
    errors.add("destination", ctx.outside_sandbox("destination", destination));
  }
}

fn check_plugin_configuration(pluggable: &PluggableTask, errors: &mut ErrorMap) {
  if let Some(schema) = pluggable.schema() {
    for required in schema.properties.iter().filter(|p| p.required) {
      let blank = pluggable.property(&required.key).is_none_or(|p| p.is_blank());
      if blank {
        errors.add(&required.key, format!("{} is required", required.key));
      }
    }
  }

  for property in pluggable.configuration() {
    if property.value.is_some() && property.encrypted_value.is_some() {
      let message = "You may only specify `value` or `encryptedValue`, not both!";
      errors.add(property.value_field(), message);
      errors.add(property.encrypted_value_field(), message);
    } else if property.encrypted_value.is_some()
      && pluggable.schema().is_some()
      && !pluggable.is_secure(&property.key)
    {
      errors.add(
        property.encrypted_value_field(),
        "Encrypted values are only allowed for secure properties.",
      );
    }
  }
}
