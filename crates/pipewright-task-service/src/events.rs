//! Change events emitted after a task edit is committed.

use pipewright_config::JobLocation;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the task service once the config write succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
  TaskCreated {
    location: JobLocation,
    index: usize,
    digest: String,
  },

  TaskUpdated {
    location: JobLocation,
    index: usize,
    digest: String,
  },

  TaskDeleted {
    location: JobLocation,
    index: usize,
    digest: String,
  },
}

/// Receives task change events.
pub trait TaskNotifier: Send + Sync {
  fn notify(&self, event: TaskEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl TaskNotifier for NoopNotifier {
  fn notify(&self, _event: TaskEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<TaskEvent>) -> Self {
    Self { sender }
  }
}

impl TaskNotifier for ChannelNotifier {
  fn notify(&self, event: TaskEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
