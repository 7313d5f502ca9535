//! Step definitions for task run scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
