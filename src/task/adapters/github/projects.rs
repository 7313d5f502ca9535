//! Project board discovery for a user or organization login.

use super::client::{GitHubClient, GitHubError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

const USER_PROJECTS_QUERY: &str = r"
query($owner: String!) {
  owner: user(login: $owner) { projectsV2(first: 100) { nodes { id number title url } } }
}";

const ORG_PROJECTS_QUERY: &str = r"
query($owner: String!) {
  owner: organization(login: $owner) { projectsV2(first: 100) { nodes { id number title url } } }
}";

const USER_PROJECT_QUERY: &str = r"
query($owner: String!, $number: Int!) {
  owner: user(login: $owner) { projectV2(number: $number) { id number title url } }
}";

const ORG_PROJECT_QUERY: &str = r"
query($owner: String!, $number: Int!) {
  owner: organization(login: $owner) { projectV2(number: $number) { id number title url } }
}";

const MISSING_SCOPE_MARKER: &str = "not accessible by personal access token";

/// Board selection: the owning login and the project number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLocator {
    /// User or organization login.
    pub owner: String,
    /// Project number within the owner.
    pub number: u64,
}

/// A project board as listed by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectSummary {
    /// Node id used by every later query.
    pub id: String,
    /// Project number within the owner.
    pub number: u64,
    /// Board title.
    pub title: String,
    /// Browser URL of the board.
    pub url: String,
}

impl GitHubClient {
    /// Lists the boards owned by `owner`, trying a user login first and an
    /// organization second.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::MissingProjectScope`] when the token cannot
    /// read projects, [`GitHubError::OwnerNotFound`] when neither lookup
    /// resolves the login, or the organization lookup's error.
    pub async fn list_projects(&self, owner: &str) -> Result<Vec<ProjectSummary>, GitHubError> {
        let found: OwnerProjects = self
            .owner_lookup(
                USER_PROJECTS_QUERY,
                ORG_PROJECTS_QUERY,
                json!({ "owner": owner }),
            )
            .await?
            .ok_or_else(|| GitHubError::OwnerNotFound(owner.to_owned()))?;
        let projects = found.into_summaries();
        debug!(owner, count = projects.len(), "listed projects");
        Ok(projects)
    }

    /// Resolves the board named by `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::ProjectNotFound`] when the owner has no such
    /// board, and the lookup errors described on
    /// [`GitHubClient::list_projects`].
    pub async fn find_project(&self, locator: &ProjectLocator) -> Result<ProjectSummary, GitHubError> {
        let found: Option<OwnerProject> = self
            .owner_lookup(
                USER_PROJECT_QUERY,
                ORG_PROJECT_QUERY,
                json!({ "owner": locator.owner, "number": locator.number }),
            )
            .await?;
        let project = found
            .and_then(|owner| owner.project_v2)
            .ok_or_else(|| GitHubError::ProjectNotFound {
                owner: locator.owner.clone(),
                number: locator.number,
            })?;
        info!(project = %project.title, number = project.number, "resolved project board");
        Ok(project)
    }

    /// Runs `user_query`, falling back to `org_query` when the login is not
    /// a user.
    async fn owner_lookup<T>(
        &self,
        user_query: &str,
        org_query: &str,
        variables: Value,
    ) -> Result<Option<T>, GitHubError>
    where
        T: DeserializeOwned,
    {
        let user_error = match self
            .graphql::<OwnerData<T>>(user_query, variables.clone())
            .await
        {
            Ok(OwnerData { owner: Some(found) }) => return Ok(Some(found)),
            Ok(OwnerData { owner: None }) => None,
            Err(err) => {
                debug!(error = %err, "user lookup failed, trying organization");
                Some(err)
            }
        };
        match self.graphql::<OwnerData<T>>(org_query, variables).await {
            Ok(data) => Ok(data.owner),
            Err(org_error) => Err(lookup_error(user_error, org_error)),
        }
    }
}

/// Picks the error to report once both lookups have failed.
fn lookup_error(user_error: Option<GitHubError>, org_error: GitHubError) -> GitHubError {
    let lacks_scope = |err: &GitHubError| {
        matches!(err, GitHubError::GraphQl(message) if message.contains(MISSING_SCOPE_MARKER))
    };
    if user_error.as_ref().is_some_and(lacks_scope) || lacks_scope(&org_error) {
        return GitHubError::MissingProjectScope;
    }
    org_error
}

#[derive(Debug, Deserialize)]
struct OwnerData<T> {
    owner: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerProject {
    project_v2: Option<ProjectSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerProjects {
    projects_v2: ProjectConnection,
}

#[derive(Debug, Deserialize)]
struct ProjectConnection {
    #[serde(default)]
    nodes: Vec<Option<ProjectSummary>>,
}

impl OwnerProjects {
    fn into_summaries(self) -> Vec<ProjectSummary> {
        let mut projects: Vec<ProjectSummary> =
            self.projects_v2.nodes.into_iter().flatten().collect();
        projects.sort_by_key(|project| project.number);
        projects
    }
}
