//! Task store backed by a GitHub Projects v2 board.

use super::client::{GitHubClient, GitHubError};
use super::projects::ProjectLocator;
use crate::task::{
    domain::{
        BoardField, BoardSchema, Execution, FieldKind, FieldOption, FieldValue, IssueRef,
        LogicalField, StatusNames, Task, TaskFilter, TaskId, prompt_from_thread,
    },
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use tracing::debug;

const FIELDS_QUERY: &str = r"
query($projectId: ID!) {
  node(id: $projectId) {
    ... on ProjectV2 {
      fields(first: 30) {
        nodes {
          ... on ProjectV2FieldCommon { id name dataType }
          ... on ProjectV2SingleSelectField { options { id name } }
        }
      }
    }
  }
}";

const ITEMS_QUERY: &str = r"
query($projectId: ID!) {
  node(id: $projectId) {
    ... on ProjectV2 {
      items(first: 100) {
        nodes {
          id
          content {
            ... on Issue { title url }
            ... on PullRequest { title url }
            ... on DraftIssue { title }
          }
          fieldValues(first: 20) {
            nodes {
              __typename
              ... on ProjectV2ItemFieldTextValue {
                text
                field { ... on ProjectV2FieldCommon { name } }
              }
              ... on ProjectV2ItemFieldSingleSelectValue {
                name
                field { ... on ProjectV2FieldCommon { name } }
              }
              ... on ProjectV2ItemFieldDateValue {
                date
                field { ... on ProjectV2FieldCommon { name } }
              }
            }
          }
        }
      }
    }
  }
}";

const UPDATE_FIELD_MUTATION: &str = r"
mutation($projectId: ID!, $itemId: ID!, $fieldId: ID!, $value: ProjectV2FieldValue!) {
  updateProjectV2ItemFieldValue(
    input: { projectId: $projectId, itemId: $itemId, fieldId: $fieldId, value: $value }
  ) {
    projectV2Item { id }
  }
}";

#[derive(Debug, Clone)]
struct ResolvedBoard {
    project_id: String,
    schema: BoardSchema,
}

/// [`TaskStore`] over a GitHub Projects v2 board.
///
/// The project id and field schema are resolved in
/// [`TaskStore::initialize`] and reused for every later call.
#[derive(Debug, Clone)]
pub struct GitHubTaskStore {
    client: GitHubClient,
    locator: ProjectLocator,
    status_names: StatusNames,
    board: Arc<RwLock<Option<ResolvedBoard>>>,
}

impl GitHubTaskStore {
    /// Creates a store for the given board.
    #[must_use]
    pub fn new(client: GitHubClient, locator: ProjectLocator, status_names: StatusNames) -> Self {
        Self {
            client,
            locator,
            status_names,
            board: Arc::new(RwLock::new(None)),
        }
    }

    fn resolved(&self) -> TaskStoreResult<ResolvedBoard> {
        self.board
            .read()
            .map_err(|err| TaskStoreError::backend(std::io::Error::other(err.to_string())))?
            .clone()
            .ok_or(TaskStoreError::NotInitialized)
    }

    async fn find_project_id(&self) -> Result<String, GitHubError> {
        Ok(self.client.find_project(&self.locator).await?.id)
    }

    async fn fetch_schema(&self, project_id: &str) -> Result<BoardSchema, GitHubError> {
        let data: NodeData<FieldsPage> = self
            .client
            .graphql(FIELDS_QUERY, json!({ "projectId": project_id }))
            .await?;
        let page = data.node.ok_or(GitHubError::MissingData("project fields"))?;
        Ok(page.into_schema())
    }

    async fn fetch_tasks(&self) -> TaskStoreResult<Vec<Task>> {
        let board = self.resolved()?;
        let data: NodeData<ItemsPage> = self
            .client
            .graphql(ITEMS_QUERY, json!({ "projectId": board.project_id }))
            .await
            .map_err(TaskStoreError::backend)?;
        let page = data
            .node
            .ok_or_else(|| TaskStoreError::backend(GitHubError::MissingData("project items")))?;
        page.items
            .nodes
            .into_iter()
            .map(|item| task_from_item(&board.schema, &self.status_names, item))
            .collect()
    }

    async fn write_field(
        &self,
        id: &TaskId,
        field: LogicalField,
        value: FieldValue,
    ) -> TaskStoreResult<()> {
        field.check(&value)?;
        let board = self.resolved()?;
        let board_field = board
            .schema
            .field(field)
            .ok_or(TaskStoreError::MissingField(field))?;
        let encoded = match &value {
            FieldValue::Text(text) => json!({ "text": text }),
            FieldValue::SingleSelect(name) => {
                let option = board_field
                    .option(name)
                    .ok_or_else(|| TaskStoreError::MissingOption {
                        field,
                        option: name.clone(),
                    })?;
                json!({ "singleSelectOptionId": option.id })
            }
            FieldValue::Date(date) => json!({ "date": date.format("%Y-%m-%d").to_string() }),
        };

        let _: Value = self
            .client
            .graphql(
                UPDATE_FIELD_MUTATION,
                json!({
                    "projectId": board.project_id,
                    "itemId": id.as_str(),
                    "fieldId": board_field.id,
                    "value": encoded,
                }),
            )
            .await
            .map_err(TaskStoreError::backend)?;
        debug!(task_id = %id, %field, "updated board field");
        Ok(())
    }

    fn issue_of(task: &Task) -> TaskStoreResult<IssueRef> {
        let url = task
            .issue_url()
            .ok_or_else(|| TaskStoreError::NoLinkedIssue(task.id().clone()))?;
        Ok(IssueRef::parse_url(url)?)
    }
}

#[async_trait]
impl TaskStore for GitHubTaskStore {
    async fn initialize(&self) -> TaskStoreResult<()> {
        let project_id = self
            .find_project_id()
            .await
            .map_err(TaskStoreError::backend)?;
        let schema = self
            .fetch_schema(&project_id)
            .await
            .map_err(TaskStoreError::backend)?;
        debug!(fields = schema.fields().count(), "loaded board schema");
        let mut board = self
            .board
            .write()
            .map_err(|err| TaskStoreError::backend(std::io::Error::other(err.to_string())))?;
        *board = Some(ResolvedBoard { project_id, schema });
        Ok(())
    }

    fn schema(&self) -> TaskStoreResult<BoardSchema> {
        Ok(self.resolved()?.schema)
    }

    async fn get_tasks(&self, filter: &TaskFilter) -> TaskStoreResult<Vec<Task>> {
        Ok(filter.apply(self.fetch_tasks().await?))
    }

    async fn get_task(&self, id: &TaskId) -> TaskStoreResult<Task> {
        self.fetch_tasks()
            .await?
            .into_iter()
            .find(|task| task.id() == id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))
    }

    async fn load_task_prompt(&self, task: &mut Task) -> TaskStoreResult<()> {
        let issue = Self::issue_of(task)?;
        let messages = self
            .client
            .issue_thread(&issue)
            .await
            .map_err(TaskStoreError::backend)?;
        let prompt = prompt_from_thread(messages)
            .ok_or_else(|| TaskStoreError::EmptyThread(task.id().clone()))?;
        task.set_prompt(prompt);
        Ok(())
    }

    async fn set_task_in_progress(&self, id: &TaskId) -> TaskStoreResult<()> {
        let option = self.status_names.in_progress.clone();
        self.write_field(id, LogicalField::Status, FieldValue::SingleSelect(option))
            .await
    }

    async fn update_task(&self, task: &Task, execution: &Execution) -> TaskStoreResult<()> {
        let status = self
            .status_names
            .name_of(&execution.new_status())
            .to_owned();
        let mut updates = vec![
            (LogicalField::Status, FieldValue::SingleSelect(status)),
            (LogicalField::Result, FieldValue::Text(execution.summary())),
        ];
        if let Some(session) = execution.session() {
            updates.push((LogicalField::SessionId, FieldValue::Text(session.to_owned())));
        }
        updates.push((
            LogicalField::ExecutedAt,
            FieldValue::Date(execution.ended_at.date_naive()),
        ));

        for (field, value) in updates {
            self.write_field(task.id(), field, value)
                .await
                .map_err(|err| TaskStoreError::field_update(field, err))?;
        }
        Ok(())
    }

    async fn add_issue_comment(&self, task: &Task, body: &str) -> TaskStoreResult<()> {
        let issue = Self::issue_of(task)?;
        self.client
            .post_issue_comment(&issue, body)
            .await
            .map_err(TaskStoreError::backend)
    }
}

#[derive(Debug, Deserialize)]
struct OwnerData {
    owner: Option<OwnerNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerNode {
    project_v2: Option<ProjectNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectNode {
    id: String,
    title: String,
}

impl OwnerData {
    fn into_project(self) -> Option<ProjectNode> {
        self.owner.and_then(|owner| owner.project_v2)
    }
}

/// Builds a task from one board item; unknown fields and mismatched kinds
/// are ignored.
fn task_from_item(
    schema: &BoardSchema,
    status_names: &StatusNames,
    item: ItemNode,
) -> TaskStoreResult<Task> {
    let content = item.content.unwrap_or_default();
    let mut task = Task::new(TaskId::new(item.id)?, content.title.unwrap_or_default());
    if let Some(url) = content.url {
        task = task.with_issue_url(url);
    }

    for node in item.field_values.nodes {
        let Some((logical, value)) = node.into_value(schema) else {
            continue;
        };
        task = match (logical, value) {
            (LogicalField::Status, FieldValue::SingleSelect(name)) => {
                task.with_status(status_names.parse(&name))
            }
            (LogicalField::Prompt, FieldValue::Text(text)) => task.with_prompt(text),
            (LogicalField::Result, FieldValue::Text(text)) => task.with_result(text),
            (LogicalField::SessionId, FieldValue::Text(text)) => task.with_session_id(text),
            (LogicalField::ExecutedAt, FieldValue::Date(date)) => task.with_executed_at(date),
            _ => task,
        };
    }
    Ok(task)
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct FieldsPage {
    fields: Connection<FieldNode>,
}

impl FieldsPage {
    /// Keeps the text, single-select and date fields.
    fn into_schema(self) -> BoardSchema {
        BoardSchema::from_fields(self.fields.nodes.into_iter().filter_map(|node| {
            let kind = match node.data_type.as_deref() {
                Some("TEXT") => FieldKind::Text,
                Some("SINGLE_SELECT") => FieldKind::SingleSelect,
                Some("DATE") => FieldKind::Date,
                _ => return None,
            };
            Some(BoardField {
                id: node.id?,
                name: node.name?,
                kind,
                options: node
                    .options
                    .into_iter()
                    .map(|option| FieldOption {
                        id: option.id,
                        name: option.name,
                    })
                    .collect(),
            })
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldNode {
    id: Option<String>,
    name: Option<String>,
    data_type: Option<String>,
    #[serde(default)]
    options: Vec<OptionNode>,
}

#[derive(Debug, Deserialize)]
struct OptionNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    items: Connection<ItemNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemNode {
    id: String,
    content: Option<ItemContent>,
    field_values: Connection<FieldValueNode>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemContent {
    title: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FieldValueNode {
    #[serde(rename = "__typename")]
    typename: String,
    text: Option<String>,
    name: Option<String>,
    date: Option<String>,
    field: Option<FieldNameNode>,
}

#[derive(Debug, Deserialize)]
struct FieldNameNode {
    name: Option<String>,
}

impl FieldValueNode {
    /// Decodes the node into a logical field value, when it carries one.
    fn into_value(self, schema: &BoardSchema) -> Option<(LogicalField, FieldValue)> {
        let field_name = self.field.and_then(|field| field.name)?;
        let logical = schema.logical_for(&field_name)?;
        let value = match self.typename.as_str() {
            "ProjectV2ItemFieldTextValue" => FieldValue::Text(self.text?),
            "ProjectV2ItemFieldSingleSelectValue" => FieldValue::SingleSelect(self.name?),
            "ProjectV2ItemFieldDateValue" => {
                FieldValue::Date(NaiveDate::parse_from_str(&self.date?, "%Y-%m-%d").ok()?)
            }
            _ => return None,
        };
        logical.check(&value).ok()?;
        Some((logical, value))
    }
}
