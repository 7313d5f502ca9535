//! In-memory task board for tests and local dry runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{
        BoardField, BoardSchema, Execution, FieldKind, FieldOption, FieldValue, LogicalField,
        StatusNames, Task, TaskFilter, TaskId, prompt_from_thread,
    },
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};

/// A write applied to the in-memory board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedWrite {
    /// A field of a task was set.
    Field {
        /// Task that was written.
        task_id: TaskId,
        /// Logical field that was written.
        field: LogicalField,
        /// Value that was stored.
        value: FieldValue,
    },
    /// A comment was posted on a task thread.
    Comment {
        /// Task whose thread received the comment.
        task_id: TaskId,
        /// Comment body.
        body: String,
    },
}

/// Thread-safe in-memory task board.
///
/// Tasks keep insertion order. Threads are keyed by issue URL so posted
/// comments become part of the thread they were posted to.
#[derive(Debug, Clone)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug)]
struct InMemoryTaskState {
    status_names: StatusNames,
    board_schema: BoardSchema,
    initialized: bool,
    tasks: Vec<Task>,
    threads: HashMap<String, Vec<String>>,
    writes: Vec<RecordedWrite>,
    failing_fields: HashSet<LogicalField>,
    fail_comments: bool,
    fail_reads: bool,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    /// Creates an empty board with the default status names.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status_names(StatusNames::default())
    }

    /// Creates an empty board whose status field uses `status_names`.
    #[must_use]
    pub fn with_status_names(status_names: StatusNames) -> Self {
        let board_schema = standard_schema(&status_names);
        Self {
            state: Arc::new(RwLock::new(InMemoryTaskState {
                status_names,
                board_schema,
                initialized: false,
                tasks: Vec::new(),
                threads: HashMap::new(),
                writes: Vec::new(),
                failing_fields: HashSet::new(),
                fail_comments: false,
                fail_reads: false,
            })),
        }
    }

    fn read_state(&self) -> TaskStoreResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state
            .read()
            .map_err(|err| TaskStoreError::backend(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> TaskStoreResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state
            .write()
            .map_err(|err| TaskStoreError::backend(std::io::Error::other(err.to_string())))
    }

    /// Appends a task to the board.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn insert(&self, task: Task) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        state.tasks.retain(|existing| existing.id() != task.id());
        state.tasks.push(task);
        Ok(())
    }

    /// Replaces the board schema, for boards missing fields or options.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn set_schema(&self, board_schema: BoardSchema) -> TaskStoreResult<()> {
        self.write_state()?.board_schema = board_schema;
        Ok(())
    }

    /// Appends messages to the thread behind `issue_url`.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn add_thread_messages<I, S>(&self, issue_url: &str, messages: I) -> TaskStoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_state()?
            .threads
            .entry(issue_url.to_owned())
            .or_default()
            .extend(messages.into_iter().map(Into::into));
        Ok(())
    }

    /// Makes every write of `field` fail until cleared.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn fail_field(&self, field: LogicalField) -> TaskStoreResult<()> {
        self.write_state()?.failing_fields.insert(field);
        Ok(())
    }

    /// Makes comment posting fail or succeed.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn fail_comments(&self, fail: bool) -> TaskStoreResult<()> {
        self.write_state()?.fail_comments = fail;
        Ok(())
    }

    /// Makes board reads fail or succeed.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn fail_reads(&self, fail: bool) -> TaskStoreResult<()> {
        self.write_state()?.fail_reads = fail;
        Ok(())
    }

    /// Returns every successful write, in order.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn writes(&self) -> TaskStoreResult<Vec<RecordedWrite>> {
        Ok(self.read_state()?.writes.clone())
    }

    /// Returns the messages of the thread behind `issue_url`.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the state lock is poisoned.
    pub fn thread(&self, issue_url: &str) -> TaskStoreResult<Vec<String>> {
        Ok(self
            .read_state()?
            .threads
            .get(issue_url)
            .cloned()
            .unwrap_or_default())
    }
}

/// Schema of a board carrying every field this system uses.
#[must_use]
pub fn standard_schema(status_names: &StatusNames) -> BoardSchema {
    let mut option_names: Vec<&str> = Vec::new();
    for name in [
        &status_names.ready,
        &status_names.in_progress,
        &status_names.in_review,
        &status_names.done,
        &status_names.failed,
    ] {
        if !option_names
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(name))
        {
            option_names.push(name.as_str());
        }
    }
    let options: Vec<FieldOption> = option_names
        .into_iter()
        .enumerate()
        .map(|(index, name)| FieldOption {
            id: format!("status-option-{index}"),
            name: name.to_owned(),
        })
        .collect();

    BoardSchema::from_fields(LogicalField::ALL.into_iter().map(|logical| BoardField {
        id: format!("field-{}", logical.board_name().to_ascii_lowercase()),
        name: logical.board_name().to_owned(),
        kind: logical.kind(),
        options: if logical.kind() == FieldKind::SingleSelect {
            options.clone()
        } else {
            Vec::new()
        },
    }))
}

impl InMemoryTaskState {
    fn require_initialized(&self) -> TaskStoreResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(TaskStoreError::NotInitialized)
        }
    }

    fn require_readable(&self) -> TaskStoreResult<()> {
        self.require_initialized()?;
        if self.fail_reads {
            return Err(TaskStoreError::backend(std::io::Error::other(
                "board read failed",
            )));
        }
        Ok(())
    }

    fn task_mut(&mut self, id: &TaskId) -> TaskStoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id() == id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))
    }

    /// Validates and applies one field write, recording it on success.
    fn write_field(
        &mut self,
        id: &TaskId,
        field: LogicalField,
        value: FieldValue,
    ) -> TaskStoreResult<()> {
        field.check(&value)?;
        let board_field = self
            .board_schema
            .field(field)
            .ok_or(TaskStoreError::MissingField(field))?;
        if let FieldValue::SingleSelect(option) = &value
            && board_field.option(option).is_none()
        {
            return Err(TaskStoreError::MissingOption {
                field,
                option: option.clone(),
            });
        }
        if self.failing_fields.contains(&field) {
            return Err(TaskStoreError::backend(std::io::Error::other(format!(
                "write to {field} rejected"
            ))));
        }

        let status_names = self.status_names.clone();
        let task = self.task_mut(id)?;
        let updated = match &value {
            FieldValue::SingleSelect(option) => {
                task.clone().with_status(status_names.parse(option))
            }
            FieldValue::Text(text) => match field {
                LogicalField::Result => task.clone().with_result(text.clone()),
                LogicalField::SessionId => task.clone().with_session_id(text.clone()),
                _ => task.clone().with_prompt(text.clone()),
            },
            FieldValue::Date(date) => task.clone().with_executed_at(*date),
        };
        *task = updated;
        self.writes.push(RecordedWrite::Field {
            task_id: id.clone(),
            field,
            value,
        });
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn initialize(&self) -> TaskStoreResult<()> {
        self.write_state()?.initialized = true;
        Ok(())
    }

    fn schema(&self) -> TaskStoreResult<BoardSchema> {
        let state = self.read_state()?;
        state.require_initialized()?;
        Ok(state.board_schema.clone())
    }

    async fn get_tasks(&self, filter: &TaskFilter) -> TaskStoreResult<Vec<Task>> {
        let state = self.read_state()?;
        state.require_readable()?;
        Ok(filter.apply(state.tasks.iter().cloned()))
    }

    async fn get_task(&self, id: &TaskId) -> TaskStoreResult<Task> {
        let state = self.read_state()?;
        state.require_readable()?;
        state
            .tasks
            .iter()
            .find(|task| task.id() == id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))
    }

    async fn load_task_prompt(&self, task: &mut Task) -> TaskStoreResult<()> {
        let state = self.read_state()?;
        state.require_readable()?;
        let issue_url = task
            .issue_url()
            .ok_or_else(|| TaskStoreError::NoLinkedIssue(task.id().clone()))?;
        let messages = state.threads.get(issue_url).cloned().unwrap_or_default();
        let prompt = prompt_from_thread(messages)
            .ok_or_else(|| TaskStoreError::EmptyThread(task.id().clone()))?;
        task.set_prompt(prompt);
        Ok(())
    }

    async fn set_task_in_progress(&self, id: &TaskId) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        state.require_initialized()?;
        let option = state.status_names.in_progress.clone();
        state.write_field(id, LogicalField::Status, FieldValue::SingleSelect(option))
    }

    async fn update_task(&self, task: &Task, execution: &Execution) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        state.require_initialized()?;
        let status = state
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
            state
                .write_field(task.id(), field, value)
                .map_err(|err| TaskStoreError::field_update(field, err))?;
        }
        Ok(())
    }

    async fn add_issue_comment(&self, task: &Task, body: &str) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        state.require_initialized()?;
        let issue_url = task
            .issue_url()
            .ok_or_else(|| TaskStoreError::NoLinkedIssue(task.id().clone()))?
            .to_owned();
        if state.fail_comments {
            return Err(TaskStoreError::backend(std::io::Error::other(
                "comment rejected",
            )));
        }
        state
            .threads
            .entry(issue_url)
            .or_default()
            .push(body.to_owned());
        state.writes.push(RecordedWrite::Comment {
            task_id: task.id().clone(),
            body: body.to_owned(),
        });
        Ok(())
    }
}

