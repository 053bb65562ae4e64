//! Integration tests for the task service over an in-memory and a file-backed config.

use std::sync::Arc;

use pipewright_config::{
  CruiseConfig, FieldError, JobConfig, JobLocation, MASKED_VALUE, PipelineConfig, PluggableTask,
  PluginTaskSchema, SchemaProperty, StageConfig, TaskKind, TaskType, TemplateConfig,
};
use pipewright_store::{ConfigRepository, FsConfigRepository, MemoryConfigRepository};
use pipewright_task_registry::{PluginError, PluginTaskValidator, TaskRegistry};
use pipewright_task_service::{
  AesCipher, ChannelNotifier, SecretCipher, TaskEvent, TaskService, TaskServiceError,
  TaskSubmission,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

const CURL: &str = "com.example.curl";

fn submission(value: Value) -> TaskSubmission {
  serde_json::from_value(value).expect("valid submission")
}

fn job(name: &str) -> JobConfig {
  JobConfig {
    name: name.to_string(),
    tasks: vec![],
  }
}

fn sample_config() -> CruiseConfig {
  CruiseConfig {
    admins: vec!["admin".to_string()],
    pipelines: vec![
      PipelineConfig {
        name: "build-linux".to_string(),
        template: None,
        stages: vec![StageConfig {
          name: "compile".to_string(),
          jobs: vec![job("unit"), job("package")],
        }],
      },
      PipelineConfig {
        name: "deploy".to_string(),
        template: Some("release".to_string()),
        stages: vec![],
      },
    ],
    templates: vec![TemplateConfig {
      name: "release".to_string(),
      stages: vec![StageConfig {
        name: "ship".to_string(),
        jobs: vec![job("upload")],
      }],
    }],
  }
}

fn registry() -> Arc<TaskRegistry> {
  let registry = TaskRegistry::new();
  registry
    .register_plugin(
      PluginTaskSchema::new(CURL, "1.0.0")
        .with_property(SchemaProperty::new("url").required())
        .with_property(SchemaProperty::new("token").secure()),
    )
    .unwrap();
  Arc::new(registry)
}

fn cipher() -> Arc<AesCipher> {
  Arc::new(AesCipher::generate().0)
}

fn service() -> TaskService<MemoryConfigRepository> {
  let repository = MemoryConfigRepository::new(sample_config()).unwrap();
  TaskService::new(registry(), repository, cipher())
}

fn unit_job() -> JobLocation {
  JobLocation::pipeline("build-linux", "compile", "unit")
}

async fn digest<R: ConfigRepository>(service: &TaskService<R>) -> String {
  service.repository().current().await.unwrap().digest
}

fn exec_with_ant_on_cancel() -> TaskSubmission {
  submission(json!({
    "type": "exec",
    "attributes": {
      "command": "ls",
      "workingDirectory": "hero/ka/directory",
      "args": "-la"
    },
    "hasCancelTask": "1",
    "onCancelConfig": {
      "onCancelOption": "ant",
      "antOnCancel": {
        "buildFile": "build.xml",
        "target": "compile",
        "workingDirectory": "default/wd"
      }
    }
  }))
}

#[tokio::test]
async fn test_create_exec_with_ant_on_cancel() {
  let service = service();
  let before = digest(&service).await;

  let saved = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap();

  assert_eq!(saved.task_index, 0);
  assert_ne!(saved.digest, before);
  assert_eq!(saved.digest, digest(&service).await);

  let current = service.repository().current().await.unwrap();
  let stored = &current.config.job(&unit_job()).unwrap().tasks[0];
  assert_eq!(stored, &saved.task);

  let TaskKind::Exec(exec) = stored.kind() else {
    panic!("expected exec task");
  };
  assert_eq!(exec.command, "ls");
  assert_eq!(exec.args.as_deref(), Some("-la"));
  assert_eq!(exec.working_directory.as_deref(), Some("hero/ka/directory"));

  let on_cancel = stored.on_cancel().unwrap();
  let TaskKind::Ant(ant) = on_cancel.kind() else {
    panic!("expected ant on-cancel task");
  };
  assert_eq!(ant.build_file.as_deref(), Some("build.xml"));
  assert_eq!(ant.target.as_deref(), Some("compile"));
  assert_eq!(ant.working_directory.as_deref(), Some("default/wd"));
}

#[tokio::test]
async fn test_stale_digest_is_rejected_without_writing() {
  let service = service();
  let read = digest(&service).await;

  service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &read, "admin")
    .await
    .unwrap();
  let after_first = digest(&service).await;

  let result = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &read, "admin")
    .await;

  let Err(err) = result else {
    panic!("second writer with stale digest must fail");
  };
  assert_eq!(err.status_code(), 409);
  assert!(matches!(
    err,
    TaskServiceError::ConfigConflict { ref current, .. } if current == &after_first
  ));
  let current = service.repository().current().await.unwrap();
  assert_eq!(current.config.job(&unit_job()).unwrap().tasks.len(), 1);
}

#[tokio::test]
async fn test_validation_failure_echoes_task_with_errors() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": "exec",
        "attributes": {"command": "rm", "workingDirectory": "../outside"}
      })),
      &before,
      "admin",
    )
    .await;

  let Err(TaskServiceError::ValidationFailed { task, errors }) = result else {
    panic!("expected validation failure");
  };
  assert_eq!(task.task_type(), TaskType::Exec);
  assert_eq!(errors.errors.get("workingDirectory").len(), 1);
  assert!(errors.errors.get("workingDirectory")[0].contains("pipeline 'build-linux'"));
  assert_eq!(digest(&service).await, before);
}

#[tokio::test]
async fn test_on_cancel_errors_are_reported_separately() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": "exec",
        "attributes": {"command": "ls"},
        "hasCancelTask": true,
        "onCancelConfig": {"onCancelOption": "exec", "execOnCancel": {"command": ""}}
      })),
      &before,
      "admin",
    )
    .await;

  let Err(TaskServiceError::ValidationFailed { errors, .. }) = result else {
    panic!("expected validation failure");
  };
  assert!(errors.errors.is_empty());
  let on_cancel = errors.on_cancel.expect("on-cancel errors");
  assert_eq!(on_cancel.errors.get("command"), &["Command cannot be empty"]);
}

#[tokio::test]
async fn test_unknown_task_type() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &unit_job(),
      &submission(json!({"type": "maven", "attributes": {}})),
      &before,
      "admin",
    )
    .await;

  assert!(matches!(
    result,
    Err(TaskServiceError::UnknownTaskType { ref name }) if name == "maven"
  ));
  assert!(matches!(
    service.new_task("maven"),
    Err(TaskServiceError::UnknownTaskType { .. })
  ));
}

#[tokio::test]
async fn test_secure_values_are_encrypted_before_saving() {
  let cipher = cipher();
  let repository = MemoryConfigRepository::new(sample_config()).unwrap();
  let service = TaskService::new(registry(), repository, cipher.clone());
  let before = digest(&service).await;

  let saved = service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": CURL,
        "attributes": {"url": "https://example.com", "token": "s3cret"}
      })),
      &before,
      "admin",
    )
    .await
    .unwrap();

  let token = saved.task.pluggable().unwrap().property("token").unwrap().clone();
  assert_eq!(token.value, None);
  let sealed = token.encrypted_value.expect("sealed token");
  assert!(sealed.starts_with("AES:"));
  assert_eq!(cipher.decrypt(&sealed).unwrap(), "s3cret");

  let url = saved.task.pluggable().unwrap().property("url").unwrap();
  assert_eq!(url.value.as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn test_ambiguous_secure_value_is_rejected() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": CURL,
        "attributes": {
          "url": "https://example.com",
          "token": {"value": "s3cret", "encryptedValue": "AES:abc:def"}
        }
      })),
      &before,
      "admin",
    )
    .await;

  let Err(TaskServiceError::ValidationFailed { errors, .. }) = result else {
    panic!("expected validation failure");
  };
  assert_eq!(errors.errors.get("token").len(), 1);
  assert_eq!(errors.errors.get("token.encryptedValue").len(), 1);
}

#[tokio::test]
async fn test_rejected_task_does_not_echo_secrets() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": CURL,
        "attributes": {"token": "s3cret"}
      })),
      &before,
      "admin",
    )
    .await;

  let Err(TaskServiceError::ValidationFailed { task, errors }) = result else {
    panic!("expected validation failure");
  };
  assert_eq!(errors.errors.get("url"), &["url is required"]);
  let token = task.pluggable().unwrap().property("token").unwrap();
  assert_eq!(token.value.as_deref(), Some(MASKED_VALUE));
  assert!(!serde_json::to_string(&task).unwrap().contains("s3cret"));
  assert_eq!(digest(&service).await, before);
}

#[tokio::test]
async fn test_edit_then_update_keeps_sealed_value() {
  let service = service();
  let before = digest(&service).await;
  service
    .create_task(
      &unit_job(),
      &submission(json!({
        "type": CURL,
        "attributes": {"url": "https://example.com", "token": "s3cret"}
      })),
      &before,
      "admin",
    )
    .await
    .unwrap();

  let view = service.edit_task(&unit_job(), 0, "admin").await.unwrap();
  let pluggable = view.task.pluggable().unwrap();
  assert!(pluggable.is_secure("token"));
  let sealed = pluggable.property("token").unwrap().encrypted_value.clone();

  let saved = service
    .update_task(
      &unit_job(),
      0,
      &submission(json!({
        "type": CURL,
        "attributes": {"url": "https://example.org"}
      })),
      &view.digest,
      "admin",
    )
    .await
    .unwrap();

  let pluggable = saved.task.pluggable().unwrap();
  assert_eq!(
    pluggable.property("url").unwrap().value.as_deref(),
    Some("https://example.org")
  );
  assert_eq!(pluggable.property("token").unwrap().encrypted_value, sealed);
}

#[tokio::test]
async fn test_update_replaces_on_cancel_task() {
  let service = service();
  let before = digest(&service).await;
  let created = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap();

  let saved = service
    .update_task(
      &unit_job(),
      0,
      &submission(json!({
        "type": "exec",
        "attributes": {"command": "ls"},
        "hasCancelTask": "1",
        "onCancelConfig": {"onCancelOption": "rake", "rakeOnCancel": {"target": "abort"}}
      })),
      &created.digest,
      "admin",
    )
    .await
    .unwrap();

  let on_cancel = saved.task.on_cancel().unwrap();
  assert_eq!(on_cancel.task_type(), TaskType::Rake);

  let saved = service
    .update_task(
      &unit_job(),
      0,
      &submission(json!({"type": "exec", "attributes": {"command": "ls"}})),
      &saved.digest,
      "admin",
    )
    .await
    .unwrap();
  assert!(saved.task.on_cancel().is_none());
}

#[tokio::test]
async fn test_update_with_different_type_is_rejected() {
  let service = service();
  let before = digest(&service).await;
  let created = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap();

  let result = service
    .update_task(
      &unit_job(),
      0,
      &submission(json!({"type": "rake", "attributes": {}})),
      &created.digest,
      "admin",
    )
    .await;

  assert!(matches!(result, Err(TaskServiceError::TypeMismatch { .. })));
}

#[tokio::test]
async fn test_delete_task() {
  let service = service();
  let before = digest(&service).await;
  let created = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap();

  let deleted = service
    .delete_task(&unit_job(), 0, &created.digest, "admin")
    .await
    .unwrap();

  assert_eq!(deleted.task, created.task);
  let current = service.repository().current().await.unwrap();
  assert!(current.config.job(&unit_job()).unwrap().tasks.is_empty());
  assert_eq!(current.digest, deleted.digest);

  let result = service
    .delete_task(&unit_job(), 0, &deleted.digest, "admin")
    .await;
  assert!(matches!(
    result,
    Err(TaskServiceError::TaskNotFound { index: 0, .. })
  ));
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
  let service = service();
  let before = digest(&service).await;

  let err = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "guest")
    .await
    .unwrap_err();

  assert_eq!(err.status_code(), 403);
  assert!(matches!(err, TaskServiceError::Forbidden { .. }));
}

#[tokio::test]
async fn test_missing_locations_are_not_found() {
  let service = service();
  let before = digest(&service).await;

  let missing_pipeline = JobLocation::pipeline("nope", "compile", "unit");
  let err = service
    .edit_task(&missing_pipeline, 0, "admin")
    .await
    .unwrap_err();
  assert!(matches!(err, TaskServiceError::NotFound { .. }));

  let missing_job = JobLocation::pipeline("build-linux", "compile", "lint");
  let err = service
    .create_task(&missing_job, &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap_err();
  assert_eq!(err.status_code(), 404);

  let err = service.edit_task(&unit_job(), 7, "admin").await.unwrap_err();
  assert!(matches!(err, TaskServiceError::TaskNotFound { index: 7, .. }));
}

#[tokio::test]
async fn test_template_job_tasks_are_editable() {
  let service = service();
  let before = digest(&service).await;
  let location = JobLocation::template("release", "ship", "upload");

  let saved = service
    .create_task(
      &location,
      &submission(json!({
        "type": "fetch",
        "attributes": {"stage": "ship", "job": "upload", "source": "dist"}
      })),
      &before,
      "admin",
    )
    .await
    .unwrap();

  assert_eq!(saved.task.task_type(), TaskType::Fetch);
  let current = service.repository().current().await.unwrap();
  let processed = current.config.processed();
  let deploy = processed.pipeline("deploy").unwrap();
  assert_eq!(deploy.stages[0].jobs[0].tasks.len(), 1);
}

#[tokio::test]
async fn test_fetch_of_unknown_job_fails() {
  let service = service();
  let before = digest(&service).await;

  let result = service
    .create_task(
      &JobLocation::pipeline("build-linux", "compile", "package"),
      &submission(json!({
        "type": "fetch",
        "attributes": {"stage": "compile", "job": "integration", "artifactId": "jar"}
      })),
      &before,
      "admin",
    )
    .await;

  let Err(TaskServiceError::ValidationFailed { errors, .. }) = result else {
    panic!("expected validation failure");
  };
  assert_eq!(errors.errors.get("job").len(), 1);
  assert_eq!(digest(&service).await, before);
}

struct Unreachable;

impl PluginTaskValidator for Unreachable {
  fn validate(&self, _task: &PluggableTask) -> Result<Vec<FieldError>, PluginError> {
    Err(PluginError::new(CURL, "plugin process is not responding"))
  }
}

#[tokio::test]
async fn test_plugin_failure_is_a_system_error() {
  let registry = registry();
  registry.register_validator(CURL, Arc::new(Unreachable));
  let repository = MemoryConfigRepository::new(sample_config()).unwrap();
  let service = TaskService::new(registry, repository, cipher());
  let before = digest(&service).await;

  let err = service
    .create_task(
      &unit_job(),
      &submission(json!({"type": CURL, "attributes": {"url": "https://example.com"}})),
      &before,
      "admin",
    )
    .await
    .unwrap_err();

  assert_eq!(err.status_code(), 500);
  assert!(matches!(err, TaskServiceError::PluginFailure(_)));
  assert_eq!(digest(&service).await, before);
}

#[tokio::test]
async fn test_events_are_sent_after_commit() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let repository = MemoryConfigRepository::new(sample_config()).unwrap();
  let service =
    TaskService::with_notifier(registry(), repository, cipher(), ChannelNotifier::new(tx));
  let before = service.repository().current().await.unwrap().digest;

  let created = service
    .create_task(&unit_job(), &exec_with_ant_on_cancel(), &before, "admin")
    .await
    .unwrap();
  service
    .delete_task(&unit_job(), 0, &created.digest, "admin")
    .await
    .unwrap();

  assert_eq!(
    rx.recv().await.unwrap(),
    TaskEvent::TaskCreated {
      location: unit_job(),
      index: 0,
      digest: created.digest.clone(),
    }
  );
  assert!(matches!(rx.recv().await.unwrap(), TaskEvent::TaskDeleted { index: 0, .. }));
}

#[tokio::test]
async fn test_file_backed_service_persists_tasks() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("config.json");
  std::fs::write(&path, serde_json::to_vec(&sample_config()).unwrap()).unwrap();

  let service = TaskService::new(registry(), FsConfigRepository::new(&path), cipher());
  let before = digest(&service).await;
  service
    .create_task(
      &unit_job(),
      &submission(json!({"type": "rake", "attributes": {"target": "spec"}})),
      &before,
      "admin",
    )
    .await
    .unwrap();

  let reopened = FsConfigRepository::new(&path).current().await.unwrap();
  let tasks = &reopened.config.job(&unit_job()).unwrap().tasks;
  assert_eq!(tasks.len(), 1);
  assert_eq!(tasks[0].task_type(), TaskType::Rake);
}
