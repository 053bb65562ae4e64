use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ErrorMap;
use crate::kinds::{AntTask, ExecTask, FetchTask, NantTask, RakeTask};
use crate::pluggable::PluggableTask;

/// Discriminant of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  Ant,
  Nant,
  Rake,
  Exec,
  Fetch,
  Pluggable,
}

impl TaskType {
  /// Types constructible by name without a plugin.
  pub const BUILT_IN: [TaskType; 5] = [
    TaskType::Ant,
    TaskType::Nant,
    TaskType::Rake,
    TaskType::Exec,
    TaskType::Fetch,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      TaskType::Ant => "ant",
      TaskType::Nant => "nant",
      TaskType::Rake => "rake",
      TaskType::Exec => "exec",
      TaskType::Fetch => "fetch",
      TaskType::Pluggable => "pluggable",
    }
  }

  /// Look up a built-in type by its exact name.
  pub fn built_in(name: &str) -> Option<TaskType> {
    Self::BUILT_IN.into_iter().find(|t| t.as_str() == name)
  }
}

impl fmt::Display for TaskType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Type-specific part of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
  Ant(AntTask),
  Nant(NantTask),
  Rake(RakeTask),
  Exec(ExecTask),
  Fetch(FetchTask),
  Pluggable(PluggableTask),
}

impl TaskKind {
  pub fn task_type(&self) -> TaskType {
    match self {
      TaskKind::Ant(_) => TaskType::Ant,
      TaskKind::Nant(_) => TaskType::Nant,
      TaskKind::Rake(_) => TaskType::Rake,
      TaskKind::Exec(_) => TaskType::Exec,
      TaskKind::Fetch(_) => TaskType::Fetch,
      TaskKind::Pluggable(_) => TaskType::Pluggable,
    }
  }

  /// Default instance of a built-in type.
  pub fn default_for(task_type: TaskType) -> Option<TaskKind> {
    match task_type {
      TaskType::Ant => Some(TaskKind::Ant(AntTask::default())),
      TaskType::Nant => Some(TaskKind::Nant(NantTask::default())),
      TaskType::Rake => Some(TaskKind::Rake(RakeTask::default())),
      TaskType::Exec => Some(TaskKind::Exec(ExecTask::default())),
      TaskType::Fetch => Some(TaskKind::Fetch(FetchTask::default())),
      TaskType::Pluggable => None,
    }
  }

  /// The working directory of build and exec tasks.
  pub fn working_directory(&self) -> Option<&str> {
    match self {
      TaskKind::Ant(t) => t.working_directory.as_deref(),
      TaskKind::Nant(t) => t.working_directory.as_deref(),
      TaskKind::Rake(t) => t.working_directory.as_deref(),
      TaskKind::Exec(t) => t.working_directory.as_deref(),
      TaskKind::Fetch(_) | TaskKind::Pluggable(_) => None,
    }
  }

  fn assign(&mut self, key: &str, value: &Value) -> bool {
    match self {
      TaskKind::Ant(t) => t.assign(key, value),
      TaskKind::Nant(t) => t.assign(key, value),
      TaskKind::Rake(t) => t.assign(key, value),
      TaskKind::Exec(t) => t.assign(key, value),
      TaskKind::Fetch(t) => t.assign(key, value),
      TaskKind::Pluggable(t) => t.assign(key, value),
    }
  }
}

/// Result states of earlier tasks under which a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunIfCondition {
  Passed,
  Failed,
  Any,
}

impl RunIfCondition {
  fn parse(name: &str) -> Option<Self> {
    match name.trim().to_ascii_lowercase().as_str() {
      "passed" => Some(RunIfCondition::Passed),
      "failed" => Some(RunIfCondition::Failed),
      "any" => Some(RunIfCondition::Any),
      _ => None,
    }
  }
}

fn default_run_if() -> Vec<RunIfCondition> {
  vec![RunIfCondition::Passed]
}

/// A configured unit of work attached to a job.
///
/// The kind (and so the task type) is fixed at construction. A task owns at
/// most one on-cancel task, which may itself be of any type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  #[serde(flatten)]
  kind: TaskKind,

  #[serde(default = "default_run_if")]
  run_if: Vec<RunIfCondition>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  on_cancel: Option<Box<Task>>,

  #[serde(skip)]
  errors: ErrorMap,
}

impl Task {
  pub fn new(kind: TaskKind) -> Self {
    Self {
      kind,
      run_if: default_run_if(),
      on_cancel: None,
      errors: ErrorMap::new(),
    }
  }

  pub fn task_type(&self) -> TaskType {
    self.kind.task_type()
  }

  pub fn kind(&self) -> &TaskKind {
    &self.kind
  }

  pub fn pluggable(&self) -> Option<&PluggableTask> {
    match &self.kind {
      TaskKind::Pluggable(p) => Some(p),
      _ => None,
    }
  }

  pub fn pluggable_mut(&mut self) -> Option<&mut PluggableTask> {
    match &mut self.kind {
      TaskKind::Pluggable(p) => Some(p),
      _ => None,
    }
  }

  /// Name used to construct this task through the registry: the built-in
  /// type name, or the plugin id for pluggable tasks.
  pub fn type_name(&self) -> &str {
    match &self.kind {
      TaskKind::Pluggable(p) => &p.plugin_id,
      other => other.task_type().as_str(),
    }
  }

  pub fn run_if(&self) -> &[RunIfCondition] {
    &self.run_if
  }

  /// Replace the run-if conditions. Duplicates collapse, first one wins;
  /// an empty list falls back to `passed`.
  pub fn set_run_if(&mut self, conditions: impl IntoIterator<Item = RunIfCondition>) {
    let mut unique = Vec::new();
    for condition in conditions {
      if !unique.contains(&condition) {
        unique.push(condition);
      }
    }
    self.run_if = if unique.is_empty() {
      default_run_if()
    } else {
      unique
    };
  }

  pub fn on_cancel(&self) -> Option<&Task> {
    self.on_cancel.as_deref()
  }

  pub fn on_cancel_mut(&mut self) -> Option<&mut Task> {
    self.on_cancel.as_deref_mut()
  }

  /// Attach (or clear) the on-cancel task. The child is taken by value, so it
  /// can never be an ancestor of `self`.
  pub fn set_on_cancel(&mut self, task: Option<Task>) {
    self.on_cancel = task.map(Box::new);
  }

  pub fn errors(&self) -> &ErrorMap {
    &self.errors
  }

  pub fn errors_mut(&mut self) -> &mut ErrorMap {
    &mut self.errors
  }

  /// True when this task and every nested on-cancel task carry no errors.
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty() && self.on_cancel.as_ref().is_none_or(|t| t.is_valid())
  }

  /// Errors of this task and its on-cancel chain, keeping each level separate.
  pub fn error_report(&self) -> TaskErrors {
    TaskErrors {
      errors: self.errors.clone(),
      on_cancel: self.on_cancel.as_ref().map(|t| Box::new(t.error_report())),
    }
  }

  /// Assign one submitted attribute by exact key. Returns false for keys
  /// this task does not know, which callers drop.
  pub fn assign(&mut self, key: &str, value: &Value) -> bool {
    if key == "runIf" {
      return self.assign_run_if(value);
    }
    self.kind.assign(key, value)
  }

  fn assign_run_if(&mut self, value: &Value) -> bool {
    let names: Vec<&str> = match value {
      Value::String(s) => s.split(',').collect(),
      Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
      _ => return false,
    };
    self.set_run_if(names.into_iter().filter_map(RunIfCondition::parse));
    true
  }
}

/// Validation errors of a task, with the on-cancel task's errors kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskErrors {
  pub errors: ErrorMap,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_cancel: Option<Box<TaskErrors>>,
}

impl TaskErrors {
  pub fn is_empty(&self) -> bool {
    self.errors.is_empty() && self.on_cancel.as_ref().is_none_or(|e| e.is_empty())
  }
}
