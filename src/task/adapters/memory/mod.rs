//! In-memory adapters for tests and offline runs.

mod store;

pub use store::{InMemoryTaskStore, RecordedWrite, standard_schema};
