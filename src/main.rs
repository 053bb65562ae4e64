use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pipewright_config::{JobLocation, TaskErrors};
use pipewright_store::{ConfigRepository, FsConfigRepository};
use pipewright_task_registry::{FsPluginSource, TaskRegistry};
use pipewright_task_service::{AesCipher, TaskService, TaskServiceError, TaskSubmission};

/// Pipewright - edit the tasks of pipeline and template jobs
#[derive(Parser)]
#[command(name = "pipewright")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.pipewright)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// User performing the edit
  #[arg(long, global = true, default_value = "admin")]
  user: String,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List the task types that can be created
  Types,

  /// Print a default task of the given type
  New { task_type: String },

  /// Print a stored task and the current config digest
  Show {
    #[command(flatten)]
    location: LocationArgs,

    #[arg(long)]
    index: usize,
  },

  /// Append a task read from stdin to a job
  Create {
    #[command(flatten)]
    location: LocationArgs,

    /// Digest of the config the submission was prepared against
    #[arg(long)]
    digest: String,
  },

  /// Merge a submission read from stdin into a stored task
  Update {
    #[command(flatten)]
    location: LocationArgs,

    #[arg(long)]
    index: usize,

    #[arg(long)]
    digest: String,
  },

  /// Remove a task from a job
  Delete {
    #[command(flatten)]
    location: LocationArgs,

    #[arg(long)]
    index: usize,

    #[arg(long)]
    digest: String,
  },

  /// Print the digest of the current config
  Digest,
}

#[derive(Args)]
struct LocationArgs {
  /// Pipeline owning the job
  #[arg(long, conflicts_with = "template", required_unless_present = "template")]
  pipeline: Option<String>,

  /// Template owning the job
  #[arg(long)]
  template: Option<String>,

  #[arg(long)]
  stage: String,

  #[arg(long)]
  job: String,
}

impl LocationArgs {
  fn location(&self) -> JobLocation {
    match &self.template {
      Some(template) => JobLocation::template(template, &self.stage, &self.job),
      None => JobLocation::pipeline(
        self.pipeline.as_deref().unwrap_or_default(),
        &self.stage,
        &self.job,
      ),
    }
  }
}

/// Body printed for a failed request.
#[derive(Serialize)]
struct Failure<'a> {
  status: u16,
  error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  task: Option<&'a pipewright_config::Task>,
  #[serde(skip_serializing_if = "Option::is_none")]
  errors: Option<&'a TaskErrors>,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".pipewright"),
  };

  let Some(command) = cli.command else {
    println!("pipewright - use --help to see available commands");
    return Ok(());
  };

  let service = open_service(&data_dir).await?;
  match run(&service, command, &cli.user).await {
    Ok(()) => Ok(()),
    Err(RunError::Service(err)) => {
      print_failure(&err)?;
      std::process::exit(if err.is_recoverable() { 1 } else { 2 });
    }
    Err(RunError::Other(err)) => Err(err),
  }
}

async fn open_service(data_dir: &Path) -> Result<TaskService<FsConfigRepository>> {
  let registry = TaskRegistry::new();
  let plugins_dir = data_dir.join("plugins");
  let loaded = registry
    .load_from(&FsPluginSource::new(&plugins_dir))
    .await
    .with_context(|| format!("failed to load plugins from {}", plugins_dir.display()))?;
  info!(count = loaded, "loaded task plugins");

  let cipher = AesCipher::load_or_create(&data_dir.join("cipher.key"))
    .await
    .context("failed to load cipher key")?;
  let repository = FsConfigRepository::new(data_dir.join("config.json"));

  Ok(TaskService::new(Arc::new(registry), repository, Arc::new(cipher)))
}

enum RunError {
  Service(TaskServiceError),
  Other(anyhow::Error),
}

impl From<TaskServiceError> for RunError {
  fn from(err: TaskServiceError) -> Self {
    RunError::Service(err)
  }
}

impl From<anyhow::Error> for RunError {
  fn from(err: anyhow::Error) -> Self {
    RunError::Other(err)
  }
}

impl From<serde_json::Error> for RunError {
  fn from(err: serde_json::Error) -> Self {
    RunError::Other(err.into())
  }
}

async fn run(
  service: &TaskService<FsConfigRepository>,
  command: Commands,
  user: &str,
) -> Result<(), RunError> {
  match command {
    Commands::Types => print_json(&service.task_types())?,
    Commands::New { task_type } => print_json(&service.new_task(&task_type)?)?,
    Commands::Show { location, index } => {
      let view = service.edit_task(&location.location(), index, user).await?;
      print_json(&view)?;
    }
    Commands::Create { location, digest } => {
      let submission = read_submission_from_stdin()?;
      let saved = service
        .create_task(&location.location(), &submission, &digest, user)
        .await?;
      print_json(&saved)?;
    }
    Commands::Update {
      location,
      index,
      digest,
    } => {
      let submission = read_submission_from_stdin()?;
      let saved = service
        .update_task(&location.location(), index, &submission, &digest, user)
        .await?;
      print_json(&saved)?;
    }
    Commands::Delete {
      location,
      index,
      digest,
    } => {
      let saved = service
        .delete_task(&location.location(), index, &digest, user)
        .await?;
      print_json(&saved)?;
    }
    Commands::Digest => {
      let snapshot = service
        .repository()
        .current()
        .await
        .map_err(TaskServiceError::from)?;
      println!("{}", snapshot.digest);
    }
  }
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn print_failure(err: &TaskServiceError) -> Result<()> {
  let (task, errors) = match err {
    TaskServiceError::ValidationFailed { task, errors } => (Some(task.as_ref()), Some(errors)),
    _ => (None, None),
  };
  let failure = Failure {
    status: err.status_code(),
    error: err.to_string(),
    task,
    errors,
  };
  println!("{}", serde_json::to_string_pretty(&failure)?);
  Ok(())
}

fn read_submission_from_stdin() -> Result<TaskSubmission> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    anyhow::bail!("expected a task submission on stdin");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read submission from stdin")?;
  serde_json::from_str(&input).context("failed to parse submission JSON from stdin")
}
