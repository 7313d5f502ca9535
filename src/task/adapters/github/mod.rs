//! GitHub Projects v2 adapter.

mod client;
mod projects;
mod store;

pub use client::{DEFAULT_GRAPHQL_URL, GitHubClient, GitHubError};
pub use projects::{ProjectLocator, ProjectSummary};
pub use store::GitHubTaskStore;
