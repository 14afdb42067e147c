//! Value widgets adapted to a topic's type.

use crate::error::Problem;
use crate::schema::{Comparator, NumericRange, SchemaHalf, TopicMeta, TopicType};

use super::slot::SlotState;

/// Label of the empty choice on an optional match picker.
pub const NONE_LABEL: &str = "— None —";

/// One entry of a select control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// What the value input of a slot stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    /// A literal the trigger or a branch compares against.
    Condition,
    /// A command payload sent to a device.
    Command,
}

/// Shape of a value input.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValueInput {
    /// No topic selected yet.
    #[default]
    Disabled,
    /// Closed set of values, from `enum` or `bool` topics or a result payload.
    Choice {
        options: Vec<Choice>,
        /// An empty "none" entry is offered and accepted.
        none_option: bool,
    },
    Number {
        /// Empty when no comparator control is shown.
        comparators: Vec<Comparator>,
        range: Option<NumericRange>,
        units: Option<String>,
    },
    Text,
}

impl ValueInput {
    /// Input for the value of a selected topic.
    #[must_use]
    pub fn for_topic(meta: Option<&TopicMeta>, role: InputRole) -> Self {
        let Some(meta) = meta else {
            return Self::Disabled;
        };
        match meta.kind {
            TopicType::Enum | TopicType::Bool => Self::Choice {
                options: meta
                    .choices()
                    .into_iter()
                    .map(|value| {
                        let label = meta.display_label(&value).to_string();
                        Choice::new(value, label)
                    })
                    .collect(),
                none_option: false,
            },
            TopicType::Number => Self::Number {
                comparators: match role {
                    InputRole::Condition => meta.comparators(),
                    InputRole::Command => Vec::new(),
                },
                range: meta.range,
                units: meta.units.clone(),
            },
            TopicType::String | TopicType::File | TopicType::Other => Self::Text,
        }
    }

    /// Match input of a branch, derived from the result step.
    ///
    /// The result command topic's `result_payload` wins; otherwise the
    /// readable topic the command reports on decides the widget.
    #[must_use]
    pub fn for_result_match(result: &SlotState, optional: bool) -> Self {
        let (Some(topic), Some(meta)) = (result.topic(), result.meta()) else {
            return Self::Disabled;
        };
        if let Some(choices) = meta.result_match_choices() {
            return Self::Choice {
                options: choices
                    .into_iter()
                    .map(|(value, label)| Choice::new(value, label))
                    .collect(),
                none_option: optional,
            };
        }
        let read_topic = meta.companion_result_topic().unwrap_or(topic);
        let read_meta = result
            .schema()
            .and_then(|schema| schema.topic(SchemaHalf::Topics, read_topic));
        match Self::for_topic(read_meta, InputRole::Condition) {
            Self::Disabled => Self::Text,
            Self::Choice { options, .. } => Self::Choice {
                options,
                none_option: optional,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    #[must_use]
    pub fn comparator_visible(&self) -> bool {
        matches!(self, Self::Number { comparators, .. } if !comparators.is_empty())
    }

    /// Operators offered by the comparator control.
    #[must_use]
    pub fn comparators(&self) -> &[Comparator] {
        match self {
            Self::Number { comparators, .. } => comparators,
            _ => &[],
        }
    }

    /// The comparator seeded when the input is rebuilt.
    #[must_use]
    pub fn default_comparator(&self) -> Comparator {
        self.comparators().first().copied().unwrap_or_default()
    }

    /// Validate a raw form value against this input.
    ///
    /// # Errors
    ///
    /// Returns the [`Problem`] the form marks the field with.
    pub fn check(&self, raw: &str) -> Result<(), Problem> {
        match self {
            Self::Disabled => Ok(()),
            Self::Choice { none_option, .. } if raw.is_empty() && *none_option => Ok(()),
            _ if raw.trim().is_empty() => Err(Problem::Missing),
            Self::Choice { options, .. } => {
                if options.iter().any(|choice| choice.value == raw) {
                    Ok(())
                } else {
                    Err(Problem::NotAllowed(raw.to_string()))
                }
            }
            Self::Number { range, .. } => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| Problem::NotANumber(raw.to_string()))?;
                match range {
                    Some(range) if !range.contains(value) => Err(Problem::OutOfRange { value }),
                    _ => Ok(()),
                }
            }
            Self::Text => Ok(()),
        }
    }

    #[must_use]
    pub fn accepts(&self, raw: &str) -> bool {
        self.check(raw).is_ok()
    }
}
