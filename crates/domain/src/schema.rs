//! Device schema: the topics a device reports and the commands it accepts.
//!
//! A schema is fetched once per device and drives every dropdown of the
//! action form: `topics` feed the IF step, `command_topics` feed THEN and
//! EVALUATE.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Value contract of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicType {
    Enum,
    Bool,
    Number,
    String,
    File,
    /// Any type this client does not know; edited as free text.
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for TopicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enum => "enum",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::File => "file",
            Self::Other => "other",
        })
    }
}

/// Comparison operator of a trigger or branch match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Comparator {
    Lt,
    Le,
    #[default]
    Eq,
    Ne,
    Ge,
    Gt,
}

/// Operators offered for numeric topics that do not list their own.
pub const DEFAULT_COMPARATORS: [Comparator; 6] = [
    Comparator::Lt,
    Comparator::Le,
    Comparator::Eq,
    Comparator::Ne,
    Comparator::Ge,
    Comparator::Gt,
];

impl Comparator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }

    /// Compare an observed payload against the expected value.
    ///
    /// Surrounding whitespace is ignored. Both sides are compared as numbers
    /// when both parse as numbers, otherwise as strings.
    #[must_use]
    pub fn compare(self, observed: &str, expected: &str) -> bool {
        let (observed, expected) = (observed.trim(), expected.trim());
        let ordering = match (observed.parse::<f64>(), expected.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(observed.cmp(expected)),
        };
        let Some(ordering) = ordering else {
            return self == Self::Ne;
        };
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = ValidationError;

    /// Schemas in the field carry padded tokens such as `" >="`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            ">=" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            other => Err(ValidationError::UnknownComparator(other.to_string())),
        }
    }
}

impl TryFrom<String> for Comparator {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Comparator> for &'static str {
    fn from(cmp: Comparator) -> Self {
        cmp.as_str()
    }
}

/// Unit attached to a poll interval or a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Ms,
    #[default]
    Sec,
    Min,
    Hour,
}

/// Units offered by the override row, in display order.
pub const TIME_UNITS: [TimeUnit; 4] = [TimeUnit::Ms, TimeUnit::Sec, TimeUnit::Min, TimeUnit::Hour];

impl TimeUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ms => "ms",
            Self::Sec => "sec",
            Self::Min => "min",
            Self::Hour => "hour",
        }
    }

    /// Length of `amount` units.
    #[must_use]
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            Self::Ms => Duration::from_millis(amount),
            Self::Sec => Duration::from_secs(amount),
            Self::Min => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hour => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TIME_UNITS
            .into_iter()
            .find(|unit| unit.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownTimeUnit(s.to_string()))
    }
}

/// Inclusive `[min, max]` bounds of a numeric topic; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRange(pub Option<f64>, pub Option<f64>);

impl NumericRange {
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.0
    }

    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.1
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.0.is_none_or(|min| value >= min) && self.1.is_none_or(|max| value <= max)
    }
}

/// One group of possible asynchronous results of a command.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultOption {
    #[serde(default, deserialize_with = "scalar_list")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display: BTreeMap<String, String>,
}

/// Shape of the asynchronous result of a command topic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub options: Vec<ResultOption>,
}

/// Describes one topic's value contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicMeta {
    #[serde(rename = "type", default)]
    pub kind: TopicType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<NumericRange>,
    #[serde(
        default,
        deserialize_with = "known_comparators",
        skip_serializing_if = "Option::is_none"
    )]
    pub comparators: Option<Vec<Comparator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(
        default,
        deserialize_with = "positive_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_unit: Option<TimeUnit>,
    #[serde(
        default,
        deserialize_with = "positive_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_topic: Option<String>,
}

impl TopicMeta {
    /// Convenience constructor used by tests and fixtures.
    #[must_use]
    pub fn of_kind(kind: TopicType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Human label of a value, falling back to the value itself.
    #[must_use]
    pub fn display_label<'a>(&'a self, value: &'a str) -> &'a str {
        self.display.get(value).map_or(value, String::as_str)
    }

    /// Closed set of literal values for `enum` and `bool` topics.
    #[must_use]
    pub fn choices(&self) -> Vec<String> {
        match self.kind {
            TopicType::Bool => vec!["true".to_string(), "false".to_string()],
            TopicType::Enum => self.values.clone(),
            _ => Vec::new(),
        }
    }

    /// Comparators offered for a numeric value.
    #[must_use]
    pub fn comparators(&self) -> Vec<Comparator> {
        match &self.comparators {
            Some(list) if !list.is_empty() => list.clone(),
            _ => DEFAULT_COMPARATORS.to_vec(),
        }
    }

    /// Device-suggested polling cadence; `0` or absent means the default cadence.
    #[must_use]
    pub fn suggested_poll(&self) -> Option<(u64, TimeUnit)> {
        self.poll_interval
            .filter(|interval| *interval > 0)
            .map(|interval| (interval, self.poll_interval_unit.unwrap_or_default()))
    }

    /// Device-suggested response-wait budget of a command.
    #[must_use]
    pub fn suggested_timeout(&self) -> Option<(u64, TimeUnit)> {
        self.timeout
            .filter(|timeout| *timeout > 0)
            .map(|timeout| (timeout, self.timeout_unit.unwrap_or_default()))
    }

    /// Companion read topic submitted with a trigger.
    #[must_use]
    pub fn companion_poll_topic(&self) -> Option<&str> {
        self.poll_topic.as_deref().filter(|t| !t.is_empty())
    }

    /// Companion result topic submitted with a command.
    #[must_use]
    pub fn companion_result_topic(&self) -> Option<&str> {
        self.result_topic.as_deref().filter(|t| !t.is_empty())
    }

    /// Flattened `result_payload.options[].values`, each with its display label.
    ///
    /// Returns `None` when the topic does not describe its result.
    #[must_use]
    pub fn result_match_choices(&self) -> Option<Vec<(String, String)>> {
        let payload = self.result_payload.as_ref()?;
        let mut choices: Vec<(String, String)> = Vec::new();
        for option in &payload.options {
            for value in &option.values {
                if choices.iter().any(|(existing, _)| existing == value) {
                    continue;
                }
                let label = option.display.get(value).unwrap_or(value).clone();
                choices.push((value.clone(), label));
            }
        }
        (!choices.is_empty()).then_some(choices)
    }
}

/// Which half of a schema a slot draws its topics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaHalf {
    /// Events and state a device reports.
    Topics,
    /// Commands a device accepts.
    CommandTopics,
}

/// Per-device capability descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSchema {
    #[serde(default)]
    pub topics: BTreeMap<String, TopicMeta>,
    #[serde(default)]
    pub command_topics: BTreeMap<String, TopicMeta>,
    /// Named server-side evaluator functions, described by the backend.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, serde_json::Value>,
}

impl DeviceSchema {
    /// `true` for the placeholder cached after a failed fetch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.command_topics.is_empty() && self.functions.is_empty()
    }

    #[must_use]
    pub fn half(&self, half: SchemaHalf) -> &BTreeMap<String, TopicMeta> {
        match half {
            SchemaHalf::Topics => &self.topics,
            SchemaHalf::CommandTopics => &self.command_topics,
        }
    }

    #[must_use]
    pub fn topic(&self, half: SchemaHalf, name: &str) -> Option<&TopicMeta> {
        self.half(half).get(name)
    }

    /// Whether at least one command topic has the given type.
    #[must_use]
    pub fn offers_command_type(&self, kind: TopicType) -> bool {
        self.command_topics.values().any(|meta| meta.kind == kind)
    }
}

/// Render a JSON scalar the way the form stores it.
pub(crate) fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept a count as a number or numeric text; `0` means "use the default".
///
/// Fractional numbers carry no usable count and read as absent.
pub(crate) fn positive_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let count = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(
            s.trim()
                .parse::<u64>()
                .map_err(|_| D::Error::custom(format!("`{s}` is not a whole number")))?,
        ),
        _ => return Err(D::Error::custom("expected a whole number")),
    };
    Ok(count.filter(|n| *n > 0))
}

/// Keep the comparator tokens this client understands; skip the rest.
fn known_comparators<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Comparator>>, D::Error> {
    let Some(tokens) = Option::<Vec<serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let known = tokens
        .into_iter()
        .filter_map(|token| {
            let parsed = token.as_str().map(str::parse::<Comparator>);
            match parsed {
                Some(Ok(cmp)) => Some(cmp),
                _ => {
                    tracing::debug!(%token, "skipping unknown comparator");
                    None
                }
            }
        })
        .collect();
    Ok(Some(known))
}

fn scalar_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|value| {
            scalar_to_string(value).ok_or_else(|| D::Error::custom("expected a scalar value"))
        })
        .collect()
}
