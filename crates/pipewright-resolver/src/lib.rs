//! Pipewright Resolver
//!
//! Turns a submitted attribute payload into a task and checks it:
//! 1. [`TaskBuilder`] constructs the prototype through the registry and merges
//!    the payload into it, recursively for the on-cancel task
//! 2. [`TaskValidator`] runs the structural checks and the plugin hook,
//!    recording field errors on each task of the on-cancel chain

mod builder;
mod sandbox;
mod validator;

pub use builder::{HAS_CANCEL_TASK, ON_CANCEL_CONFIG, ON_CANCEL_OPTION, TaskBuilder};
pub use sandbox::is_outside_sandbox;
pub use validator::{TaskValidator, ValidationContext, ValidationOutcome};
