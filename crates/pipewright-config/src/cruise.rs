use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// The whole server configuration: pipelines, templates and administrators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CruiseConfig {
  /// Users allowed to edit pipelines and templates. Empty means everyone.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub admins: Vec<String>,
  #[serde(default)]
  pub pipelines: Vec<PipelineConfig>,
  #[serde(default)]
  pub templates: Vec<TemplateConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
  pub name: String,
  /// Name of the template supplying this pipeline's stages.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template: Option<String>,
  #[serde(default)]
  pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
  pub name: String,
  #[serde(default)]
  pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
  pub name: String,
  #[serde(default)]
  pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
  pub name: String,
  #[serde(default)]
  pub tasks: Vec<Task>,
}

impl StageConfig {
  pub fn job(&self, name: &str) -> Option<&JobConfig> {
    self.jobs.iter().find(|j| j.name == name)
  }
}

/// The pipeline or template whose stages are being edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ConfigOwner {
  Pipeline(String),
  Template(String),
}

impl ConfigOwner {
  pub fn name(&self) -> &str {
    match self {
      ConfigOwner::Pipeline(name) | ConfigOwner::Template(name) => name,
    }
  }
}

impl fmt::Display for ConfigOwner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigOwner::Pipeline(name) => write!(f, "pipeline '{name}'"),
      ConfigOwner::Template(name) => write!(f, "template '{name}'"),
    }
  }
}

/// Address of a job: owner, stage name and job name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobLocation {
  pub owner: ConfigOwner,
  pub stage: String,
  pub job: String,
}

impl JobLocation {
  pub fn pipeline(
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

  pub fn template(
    template: impl Into<String>,
    stage: impl Into<String>,
    job: impl Into<String>,
  ) -> Self {
    Self {
      owner: ConfigOwner::Template(template.into()),
      stage: stage.into(),
      job: job.into(),
    }
  }
}

impl fmt::Display for JobLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} :: {} :: {}", self.owner.name(), self.stage, self.job)
  }
}

impl CruiseConfig {
  /// Whether `user` may edit pipelines and templates.
  pub fn is_admin(&self, user: &str) -> bool {
    self.admins.is_empty() || self.admins.iter().any(|a| a == user)
  }

  pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
    self.pipelines.iter().find(|p| p.name == name)
  }

  pub fn template(&self, name: &str) -> Option<&TemplateConfig> {
    self.templates.iter().find(|t| t.name == name)
  }

  pub fn has_owner(&self, owner: &ConfigOwner) -> bool {
    match owner {
      ConfigOwner::Pipeline(name) => self.pipeline(name).is_some(),
      ConfigOwner::Template(name) => self.template(name).is_some(),
    }
  }

  /// Stages defined directly on the owner. A template-backed pipeline has
  /// none of its own; its stages are edited through the template.
  pub fn stages(&self, owner: &ConfigOwner) -> Option<&[StageConfig]> {
    match owner {
      ConfigOwner::Pipeline(name) => self.pipeline(name).map(|p| p.stages.as_slice()),
      ConfigOwner::Template(name) => self.template(name).map(|t| t.stages.as_slice()),
    }
  }

  fn stages_mut(&mut self, owner: &ConfigOwner) -> Option<&mut Vec<StageConfig>> {
    match owner {
      ConfigOwner::Pipeline(name) => self
        .pipelines
        .iter_mut()
        .find(|p| &p.name == name)
        .map(|p| &mut p.stages),
      ConfigOwner::Template(name) => self
        .templates
        .iter_mut()
        .find(|t| &t.name == name)
        .map(|t| &mut t.stages),
    }
  }

  pub fn job(&self, location: &JobLocation) -> Option<&JobConfig> {
    self
      .stages(&location.owner)?
      .iter()
      .find(|s| s.name == location.stage)?
      .job(&location.job)
  }

  pub fn job_mut(&mut self, location: &JobLocation) -> Option<&mut JobConfig> {
    self
      .stages_mut(&location.owner)?
      .iter_mut()
      .find(|s| s.name == location.stage)?
      .jobs
      .iter_mut()
      .find(|j| j.name == location.job)
  }

  /// A copy with every template-backed pipeline carrying its template's
  /// stages. Pipelines naming a missing template keep their own stages.
  pub fn processed(&self) -> CruiseConfig {
    let mut processed = self.clone();
    for pipeline in &mut processed.pipelines {
      if let Some(template) = pipeline.template.as_deref().and_then(|t| self.template(t)) {
        pipeline.stages = template.stages.clone();
      }
    }
    processed
  }

  /// Lowercase hex MD5 of the canonical JSON form. Used as the config version.
  pub fn digest(&self) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(self)?;
    Ok(format!("{:x}", Md5::digest(&bytes)))
  }
}
