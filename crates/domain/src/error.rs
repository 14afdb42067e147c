//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`LensError`]
//! via `#[from]`. Errors that reach the user are rendered through
//! [`LensError::user_message`], which keeps backend-provided text verbatim.

use std::fmt;

use crate::action::BranchKind;
use crate::editor::Slot;

/// Umbrella error for every fallible editor operation.
#[derive(Debug, thiserror::Error)]
pub enum LensError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("invalid action form")]
    Form(#[from] FormErrors),

    #[error("malformed action chain")]
    Chain(#[from] ChainError),

    #[error("backend error")]
    Backend(#[from] BackendError),
}

impl LensError {
    /// Text suitable for a transient notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Form(err) => err.to_string(),
            Self::Chain(err) => format!("malformed action chain: {err}"),
            Self::Backend(err) => err.user_message(),
        }
    }
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("unknown comparator `{0}`")]
    UnknownComparator(String),

    #[error("unknown time unit `{0}`")]
    UnknownTimeUnit(String),
}

/// Form field addressed by a [`FieldError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Device,
    Topic,
    Comparator,
    /// Trigger value, or the command of a result/branch slot.
    Value,
    /// Poll-interval or timeout override.
    Override,
    /// Branch match value.
    Match,
}

/// Why a form field was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Problem {
    #[error("is required")]
    Missing,

    #[error("`{0}` is not one of the allowed values")]
    NotAllowed(String),

    #[error("`{0}` is not a number")]
    NotANumber(String),

    #[error("{value} is outside the allowed range")]
    OutOfRange { value: f64 },

    #[error("`{0}` is not a positive whole number")]
    NotPositive(String),
}

/// One invalid field, addressed by slot (`None` for action metadata).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub slot: Option<Slot>,
    pub field: Field,
    pub problem: Problem,
}

impl FieldError {
    #[must_use]
    pub fn new(slot: Option<Slot>, field: Field, problem: Problem) -> Self {
        Self {
            slot,
            field,
            problem,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match (self.slot, self.field) {
            (_, Field::Name) => "name",
            (_, Field::Device) => "device",
            (_, Field::Topic) => "topic",
            (_, Field::Comparator) => "comparator",
            (Some(Slot::Trigger) | None, Field::Value) => "value",
            (Some(_), Field::Value) => "command",
            (Some(Slot::Trigger), Field::Override) => "poll interval",
            (_, Field::Override) => "timeout",
            (_, Field::Match) => "match",
        };
        match self.slot {
            Some(slot) => write!(f, "{slot} {field} {}", self.problem),
            None => write!(f, "{field} {}", self.problem),
        }
    }
}

/// Every invalid field found while serializing the form.
///
/// Saving is blocked while this is non-empty; no request is issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Whether `field` of `slot` was marked invalid.
    #[must_use]
    pub fn contains(&self, slot: Option<Slot>, field: Field) -> bool {
        self.0.iter().any(|e| e.slot == slot && e.field == field)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// The persisted `chain` array does not have the `[trigger, result, ...branches]` shape.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("chain needs a trigger and a result node, found {len} node(s)")]
    TooShort { len: usize },

    #[error("chain holds {len} nodes, at most 4 are allowed")]
    TooLong { len: usize },

    #[error("node {index} is not a valid {role} node")]
    InvalidNode {
        index: usize,
        role: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("node {index} carries no `branch` tag")]
    UntaggedBranch { index: usize },

    #[error("more than one {0} branch")]
    DuplicateBranch(BranchKind),
}

/// A call to the backend failed.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-2xx status.
    #[error("backend rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The backend could not be reached.
    #[error("backend unreachable")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The backend answered but the body could not be decoded.
    #[error("unexpected response body")]
    InvalidBody(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Text shown to the user: the backend's own message when it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::Unreachable(source) => format!("backend unreachable: {source}"),
            Self::InvalidBody(_) => "unexpected response from backend".to_string(),
        }
    }

    /// HTTP status of a rejection.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Unreachable(_) | Self::InvalidBody(_) => None,
        }
    }
}
