//! vibe-runner: runs GitHub Project tasks through Claude Code.
//!
//! Ready items on a project board are executed one at a time by the
//! `claude` command-line tool. The outcome is written back to the board as
//! a status change, a result summary, a resumable session token, and an
//! execution date, with an optional summary comment on the linked issue.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Tasks, executions, and the board field model
//! - **Ports**: Traits for the board, the external tool, and notifications
//! - **Adapters**: GitHub, `claude` subprocess, in-memory and desktop
//!   implementations of those ports
//! - **Services**: The orchestrator driving single runs and watch mode
//!
//! # Modules
//!
//! - [`task`]: The task pipeline
//! - [`config`]: Layered runner configuration
//! - [`telemetry`]: Logging setup

pub mod config;
pub mod task;
pub mod telemetry;
