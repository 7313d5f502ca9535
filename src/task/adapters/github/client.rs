//! Thin GitHub API client: GraphQL for project boards, REST for issue threads.

use crate::task::domain::IssueRef;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Default GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("vibe-runner/", env!("CARGO_PKG_VERSION"));

/// Errors raised while talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request could not be sent or the body could not be decoded.
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a non-success status code.
    #[error("GitHub returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The GraphQL response carried errors.
    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    /// The GraphQL response had no data for a required node.
    #[error("GitHub response is missing {0}")]
    MissingData(&'static str),

    /// Neither a user nor an organization has the given login.
    #[error("no user or organization named {0}")]
    OwnerNotFound(String),

    /// The token cannot read Projects v2 boards.
    #[error(
        "token lacks the 'project' scope; regenerate it with the project permission at https://github.com/settings/tokens"
    )]
    MissingProjectScope,

    /// Neither a user nor an organization owns the requested project.
    #[error("project #{number} not found for owner {owner}")]
    ProjectNotFound {
        /// Login that was searched.
        owner: String,
        /// Project number that was requested.
        number: u64,
    },
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RestIssue {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestComment {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

/// Authenticated GitHub API client.
///
/// The token never appears in `Debug` output.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    graphql_url: String,
    rest_url: String,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("token", &"<redacted>")
            .field("graphql_url", &self.graphql_url)
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for `graphql_url`; the REST base is derived from it.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::Http`] when the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, graphql_url: impl Into<String>) -> Result<Self, GitHubError> {
        let graphql_url = graphql_url.into();
        let rest_url = graphql_url
            .trim_end_matches('/')
            .trim_end_matches("/graphql")
            .to_owned();
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            token: token.into(),
            graphql_url,
            rest_url,
        })
    }

    /// Runs a GraphQL query or mutation and decodes its `data`.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] on transport failures, non-success status
    /// codes, GraphQL errors, or an absent `data` member.
    pub async fn graphql<T>(&self, query: &str, variables: Value) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlEnvelope<T> = response.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect();
            return Err(GitHubError::GraphQl(messages.join("; ")));
        }
        envelope.data.ok_or(GitHubError::MissingData("data"))
    }

    /// Returns the issue body followed by every comment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] when either request fails.
    pub async fn issue_thread(&self, issue: &IssueRef) -> Result<Vec<String>, GitHubError> {
        let issue_url = self.issue_endpoint(issue);
        let opening: RestIssue = self.rest_get(&issue_url).await?;
        let comments: Vec<RestComment> = self
            .rest_get(&format!("{issue_url}/comments?per_page=100"))
            .await?;
        debug!(%issue, comments = comments.len(), "fetched issue thread");

        Ok(opening
            .body
            .into_iter()
            .chain(comments.into_iter().filter_map(|comment| comment.body))
            .collect())
    }

    /// Posts a comment on an issue.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] when the request fails.
    pub async fn post_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), GitHubError> {
        let response = self
            .http
            .post(format!("{}/comments", self.issue_endpoint(issue)))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&NewComment { body })
            .send()
            .await?;
        check_status(response).await.map(drop)
    }

    fn issue_endpoint(&self, issue: &IssueRef) -> String {
        format!(
            "{}/repos/{}/issues/{}",
            self.rest_url,
            issue.repository(),
            issue.issue_number()
        )
    }

    async fn rest_get<T>(&self, url: &str) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitHubError::Status {
        status: status.as_u16(),
        body,
    })
}
