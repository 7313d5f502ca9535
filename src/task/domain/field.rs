//! Board field model: logical fields, typed values, and the resolved schema.

use super::TaskDomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a board custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// One option out of an enumerated set.
    SingleSelect,
    /// Calendar date.
    Date,
}

impl FieldKind {
    /// Returns a lowercase label for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::SingleSelect => "single-select",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a board custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free-text value.
    Text(String),
    /// Name of the selected option.
    SingleSelect(String),
    /// Date value.
    Date(NaiveDate),
}

impl FieldValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::SingleSelect(_) => FieldKind::SingleSelect,
            Self::Date(_) => FieldKind::Date,
        }
    }
}

/// Fields this system reads and writes on each task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalField {
    /// Lifecycle status.
    Status,
    /// Instruction text for the tool.
    Prompt,
    /// Last execution summary.
    Result,
    /// Continuation token.
    SessionId,
    /// Date of the last execution.
    ExecutedAt,
}

impl LogicalField {
    /// Every logical field, in board order.
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::Prompt,
        Self::Result,
        Self::SessionId,
        Self::ExecutedAt,
    ];

    /// Board field name carrying this logical field.
    #[must_use]
    pub const fn board_name(self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Prompt => "Prompt",
            Self::Result => "Result",
            Self::SessionId => "SessionID",
            Self::ExecutedAt => "ExecutedAt",
        }
    }

    /// Kind the board field must have.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Status => FieldKind::SingleSelect,
            Self::Prompt | Self::Result | Self::SessionId => FieldKind::Text,
            Self::ExecutedAt => FieldKind::Date,
        }
    }

    /// Looks a logical field up by its board field name.
    #[must_use]
    pub fn from_board_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.board_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Checks that `value` has the kind this field requires.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::FieldKindMismatch`] otherwise.
    pub fn check(self, value: &FieldValue) -> Result<(), TaskDomainError> {
        let found = value.kind();
        if found == self.kind() {
            return Ok(());
        }
        Err(TaskDomainError::FieldKindMismatch {
            field: self.board_name(),
            expected: self.kind().as_str(),
            found: found.as_str(),
        })
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.board_name())
    }
}

/// Option of a single-select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Store-assigned option identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Custom field discovered on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardField {
    /// Store-assigned field identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Options, for single-select fields.
    pub options: Vec<FieldOption>,
}

impl BoardField {
    /// Finds a single-select option by name, ignoring ASCII case.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&FieldOption> {
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Board schema resolved once at initialization.
///
/// Holds every discovered field by name plus the mapping from logical fields
/// to board fields. The schema is immutable for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSchema {
    fields: BTreeMap<String, BoardField>,
    mapping: BTreeMap<LogicalField, String>,
}

impl BoardSchema {
    /// Builds a schema from discovered fields.
    ///
    /// Logical fields are mapped by board name when the discovered kind
    /// matches; fields with a mismatching kind stay unmapped.
    #[must_use]
    pub fn from_fields(fields: impl IntoIterator<Item = BoardField>) -> Self {
        let fields: BTreeMap<String, BoardField> = fields
            .into_iter()
            .map(|field| (field.name.clone(), field))
            .collect();
        let mapping = fields
            .values()
            .filter_map(|field| {
                LogicalField::from_board_name(&field.name)
                    .filter(|logical| logical.kind() == field.kind)
                    .map(|logical| (logical, field.name.clone()))
            })
            .collect();
        Self { fields, mapping }
    }

    /// Returns the board field mapped to a logical field.
    #[must_use]
    pub fn field(&self, logical: LogicalField) -> Option<&BoardField> {
        self.mapping
            .get(&logical)
            .and_then(|name| self.fields.get(name))
    }

    /// Returns the logical field a board field name maps to.
    #[must_use]
    pub fn logical_for(&self, board_name: &str) -> Option<LogicalField> {
        self.mapping
            .iter()
            .find(|(_, name)| name.as_str() == board_name)
            .map(|(logical, _)| *logical)
    }

    /// Returns every discovered field, ordered by name.
    pub fn fields(&self) -> impl Iterator<Item = &BoardField> {
        self.fields.values()
    }

    /// Returns the options of the mapped status field.
    #[must_use]
    pub fn status_options(&self) -> &[FieldOption] {
        self.field(LogicalField::Status)
            .map(|field| field.options.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` when no field was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
