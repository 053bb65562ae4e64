//! Pipewright Task Service
//!
//! Create, edit and delete the tasks of a pipeline or template job.
//!
//! # Flow
//!
//! ```text
//! submission ──► TaskBuilder (registry prototype + merge)
//!                    │
//!                    ▼
//!               TaskValidator (field errors, plugin hook)
//!                    │  invalid ──► ValidationFailed { task, errors }
//!                    ▼
//!               seal secure values (SecretCipher)
//!                    │
//!                    ▼
//!               ConfigSavePipeline (edit, fetch references, CAS)
//!                    │  stale digest ──► ConfigConflict
//!                    ▼
//!               TaskNotifier
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let registry = Arc::new(TaskRegistry::new());
//! let repository = FsConfigRepository::new(data_dir.join("config.json"));
//! let cipher = Arc::new(AesCipher::load_or_create(&data_dir.join("cipher.key")).await?);
//! let service = TaskService::new(registry, repository, cipher);
//!
//! let view = service.edit_task(&location, 0, "admin").await?;
//! let saved = service
//!   .update_task(&location, 0, &submission, &view.digest, "admin")
//!   .await?;
//! ```

mod cipher;
mod error;
mod events;
mod save;
mod service;
mod submission;

pub use cipher::{AesCipher, CipherError, SecretCipher};
pub use error::TaskServiceError;
pub use events::{ChannelNotifier, NoopNotifier, TaskEvent, TaskNotifier};
pub use save::{ConfigSavePipeline, EditSnapshot, SaveResult, TaskEdit};
pub use service::{SavedTask, TaskService, TaskView};
pub use submission::TaskSubmission;
