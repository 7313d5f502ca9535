//! Reference to the discussion thread a task was created from.

use super::{IssueNumber, RepositoryFullName, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical GitHub issue (or pull request) reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    repository: RepositoryFullName,
    issue_number: IssueNumber,
}

impl IssueRef {
    /// Creates an issue reference from validated components.
    #[must_use]
    pub const fn new(repository: RepositoryFullName, issue_number: IssueNumber) -> Self {
        Self {
            repository,
            issue_number,
        }
    }

    /// Creates an issue reference from raw values.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskDomainError`] when any component is invalid.
    pub fn from_parts(repository: &str, issue_number: u64) -> Result<Self, TaskDomainError> {
        Ok(Self::new(
            RepositoryFullName::new(repository)?,
            IssueNumber::new(issue_number)?,
        ))
    }

    /// Parses an issue or pull request URL such as
    /// `https://github.com/owner/repo/issues/42`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidIssueUrl`] for any other shape.
    pub fn parse_url(url: &str) -> Result<Self, TaskDomainError> {
        let invalid = || TaskDomainError::InvalidIssueUrl(url.to_owned());
        let path = url
            .trim()
            .strip_prefix("https://github.com/")
            .ok_or_else(invalid)?;
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
        let [owner, repo, kind, number] = segments.as_slice() else {
            return Err(invalid());
        };
        if *kind != "issues" && *kind != "pull" {
            return Err(invalid());
        }
        let number: u64 = number.parse().map_err(|_| invalid())?;
        Self::from_parts(&format!("{owner}/{repo}"), number).map_err(|_| invalid())
    }

    /// Returns the repository.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        &self.repository
    }

    /// Returns the issue number.
    #[must_use]
    pub const fn issue_number(&self) -> IssueNumber {
        self.issue_number
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.issue_number)
    }
}
