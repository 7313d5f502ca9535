//! Task pipeline: board tasks executed by an external tool.
//!
//! Tasks are read from a project board, run one at a time through the
//! `claude` CLI, and their results written back to the board and the linked
//! issue thread. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
