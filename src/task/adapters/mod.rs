//! Adapter implementations of the task ports.
//!
//! - [`claude`]: subprocess executor for the `claude` CLI
//! - [`github`]: GitHub Projects v2 task store
//! - [`memory`]: in-memory task store
//! - [`notify`]: desktop notifiers

pub mod claude;
pub mod github;
pub mod memory;
pub mod notify;
