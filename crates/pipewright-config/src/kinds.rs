//! Built-in task kinds and their form attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{assign_optional, assign_string, is_truthy};

/// Runs an Ant target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AntTask {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_file: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub working_directory: Option<String>,
}

impl AntTask {
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    match key {
      "buildFile" => assign_optional(&mut self.build_file, value),
      "target" => assign_optional(&mut self.target, value),
      "workingDirectory" => assign_optional(&mut self.working_directory, value),
      _ => false,
    }
  }
}

/// Runs a NAnt target, optionally with a specific NAnt install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NantTask {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_file: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub working_directory: Option<String>,
  /// Directory containing the nant executable.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub nant_path: Option<String>,
}

impl NantTask {
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    match key {
      "buildFile" => assign_optional(&mut self.build_file, value),
      "target" => assign_optional(&mut self.target, value),
      "workingDirectory" => assign_optional(&mut self.working_directory, value),
      "nantPath" => assign_optional(&mut self.nant_path, value),
      _ => false,
    }
  }
}

/// Runs a Rake target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RakeTask {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_file: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub working_directory: Option<String>,
}

impl RakeTask {
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    match key {
      "buildFile" => assign_optional(&mut self.build_file, value),
      "target" => assign_optional(&mut self.target, value),
      "workingDirectory" => assign_optional(&mut self.working_directory, value),
      _ => false,
    }
  }
}

/// Runs an arbitrary command.
///
/// Arguments are given either as a single `args` string or as a list
/// (`argListString` in forms, one argument per line). Using both at once is a
/// validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecTask {
  pub command: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub args: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub arguments: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub working_directory: Option<String>,
}

impl ExecTask {
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    match key {
      "command" => assign_string(&mut self.command, value),
      "args" => assign_optional(&mut self.args, value),
      "workingDirectory" => assign_optional(&mut self.working_directory, value),
      "argListString" => match value {
        Value::String(s) => {
          self.arguments = s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
          true
        }
        Value::Null => {
          self.arguments.clear();
          true
        }
        _ => false,
      },
      "arguments" => match value {
        Value::Array(items) => {
          self.arguments = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
          true
        }
        _ => false,
      },
      _ => false,
    }
  }
}

/// Fetches an artifact produced by an upstream job.
///
/// `pipeline` defaults to the pipeline that owns the task when unset. The
/// artifact is identified either by a `source` path or, for external artifact
/// stores, by `artifactId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchTask {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pipeline: Option<String>,
  pub stage: String,
  pub job: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
  #[serde(rename = "isSourceAFile")]
  pub is_source_a_file: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub artifact_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub destination: Option<String>,
}

impl FetchTask {
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    match key {
      "pipeline" => assign_optional(&mut self.pipeline, value),
      "stage" => assign_string(&mut self.stage, value),
      "job" => assign_string(&mut self.job, value),
      "source" => assign_optional(&mut self.source, value),
      "artifactId" => assign_optional(&mut self.artifact_id, value),
      "destination" => assign_optional(&mut self.destination, value),
      "isSourceAFile" => {
        self.is_source_a_file = is_truthy(Some(value));
        true
      }
      _ => false,
    }
  }
}
