//! Action: a persisted IF → THEN → EVALUATE rule.
//!
//! On the wire an action's `chain` is a flat array: index 0 is always the
//! trigger, index 1 is always the result command, and the remaining zero to
//! two entries are branch nodes tagged `branch: "success" | "error"`.
//! [`Chain`] is the typed view of that array and keeps the positional
//! layout for existing stored actions.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ChainError, ValidationError};
use crate::id::{ActionId, DeviceId};
use crate::schema::{Comparator, TimeUnit, positive_count, scalar_to_string};

/// Source tag the runtime uses to locate the IF node.
pub const TRIGGER_SOURCE: &str = "io";

/// Command placeholder replaced by the triggering payload at run time.
pub const IF_PLACEHOLDER: &str = "$IF";

/// The literal a trigger or branch compares against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchValue {
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: String,
}

impl MatchValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// IF: the device/topic condition that starts the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerNode {
    pub device_id: DeviceId,
    #[serde(default = "trigger_source")]
    pub source: String,
    pub topic: String,
    #[serde(default)]
    pub cmp: Comparator,
    #[serde(rename = "match", default)]
    pub matcher: MatchValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_topic: Option<String>,
    #[serde(
        default,
        deserialize_with = "positive_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_unit: Option<TimeUnit>,
}

impl TriggerNode {
    /// Whether an incoming payload on the trigger topic fires the rule.
    #[must_use]
    pub fn matches(&self, payload: &str) -> bool {
        self.cmp.compare(&payload_event(payload), &self.matcher.value)
    }
}

/// THEN: the command executed when the trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNode {
    pub device_id: DeviceId,
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub command: String,
    #[serde(default)]
    pub ignore_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_topic: Option<String>,
    #[serde(
        default,
        deserialize_with = "positive_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_unit: Option<TimeUnit>,
}

impl ResultNode {
    /// The command to publish, with [`IF_PLACEHOLDER`] replaced by the trigger payload.
    #[must_use]
    pub fn resolved_command<'a>(&'a self, trigger_payload: &'a str) -> &'a str {
        resolve_placeholder(&self.command, trigger_payload)
    }

    fn wait(&self) -> Duration {
        timeout_duration(self.timeout, self.timeout_unit)
    }
}

/// Outcome an EVALUATE branch reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Success,
    Error,
}

impl BranchKind {
    pub const ALL: [Self; 2] = [Self::Success, Self::Error];
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// EVALUATE: a follow-up command run on the result's success or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchNode {
    pub branch: BranchKind,
    pub device_id: DeviceId,
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_topic: Option<String>,
    #[serde(
        default,
        deserialize_with = "positive_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmp: Option<Comparator>,
    #[serde(rename = "match", default)]
    pub matcher: MatchValue,
}

impl BranchNode {
    /// Whether an observed result selects this branch.
    ///
    /// An error branch with an empty match accepts any result.
    #[must_use]
    pub fn matches(&self, observed: &str) -> bool {
        if self.branch == BranchKind::Error && self.matcher.value.is_empty() {
            return true;
        }
        self.cmp
            .unwrap_or_default()
            .compare(&payload_event(observed), &self.matcher.value)
    }

    #[must_use]
    pub fn resolved_command<'a>(&'a self, trigger_payload: &'a str) -> &'a str {
        resolve_placeholder(&self.command, trigger_payload)
    }

    fn wait(&self) -> Duration {
        timeout_duration(self.timeout, self.timeout_unit)
    }
}

/// Which EVALUATE branches an action carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluateMode {
    #[default]
    Ignore,
    Success,
    Error,
    Both,
}

impl EvaluateMode {
    pub const ALL: [Self; 4] = [Self::Ignore, Self::Success, Self::Error, Self::Both];

    /// Derive the mode from which branch tags are present.
    #[must_use]
    pub fn from_branches(success: bool, error: bool) -> Self {
        match (success, error) {
            (false, false) => Self::Ignore,
            (true, false) => Self::Success,
            (false, true) => Self::Error,
            (true, true) => Self::Both,
        }
    }

    /// Whether the branch of `kind` is visible and serialized in this mode.
    #[must_use]
    pub fn shows(self, kind: BranchKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _)
                | (Self::Success, BranchKind::Success)
                | (Self::Error, BranchKind::Error)
        )
    }
}

impl fmt::Display for EvaluateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ignore => "ignore",
            Self::Success => "success",
            Self::Error => "error",
            Self::Both => "both",
        })
    }
}

/// Typed view of the persisted `chain` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub trigger: TriggerNode,
    pub result: ResultNode,
    pub success: Option<BranchNode>,
    pub error: Option<BranchNode>,
}

impl Chain {
    /// Destructure a raw `chain` array positionally.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] when fewer than two or more than four nodes are
    /// present, when a node does not decode, or when a branch tag is missing
    /// or repeated.
    pub fn from_nodes(nodes: Vec<serde_json::Value>) -> Result<Self, ChainError> {
        let len = nodes.len();
        if len < 2 {
            return Err(ChainError::TooShort { len });
        }
        if len > 4 {
            return Err(ChainError::TooLong { len });
        }

        let mut nodes = nodes.into_iter().enumerate();
        let mut decode = |role: &'static str| {
            let (index, node) = nodes.next().ok_or(ChainError::TooShort { len })?;
            Ok::<_, ChainError>((index, node, role))
        };

        let (index, node, role) = decode("trigger")?;
        let trigger: TriggerNode = serde_json::from_value(node)
            .map_err(|source| ChainError::InvalidNode { index, role, source })?;
        let (index, node, role) = decode("result")?;
        let result: ResultNode = serde_json::from_value(node)
            .map_err(|source| ChainError::InvalidNode { index, role, source })?;

        let mut chain = Self {
            trigger,
            result,
            success: None,
            error: None,
        };
        for (index, node) in nodes {
            if node.get("branch").is_none() {
                return Err(ChainError::UntaggedBranch { index });
            }
            let branch: BranchNode =
                serde_json::from_value(node).map_err(|source| ChainError::InvalidNode {
                    index,
                    role: "branch",
                    source,
                })?;
            let kind = branch.branch;
            let slot = match kind {
                BranchKind::Success => &mut chain.success,
                BranchKind::Error => &mut chain.error,
            };
            if slot.is_some() {
                return Err(ChainError::DuplicateBranch(kind));
            }
            *slot = Some(branch);
        }
        Ok(chain)
    }

    /// Number of nodes in the wire array.
    #[must_use]
    pub fn len(&self) -> usize {
        2 + usize::from(self.success.is_some()) + usize::from(self.error.is_some())
    }

    /// A chain always holds at least the trigger and the result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn branch(&self, kind: BranchKind) -> Option<&BranchNode> {
        match kind {
            BranchKind::Success => self.success.as_ref(),
            BranchKind::Error => self.error.as_ref(),
        }
    }

    #[must_use]
    pub fn evaluate_mode(&self) -> EvaluateMode {
        EvaluateMode::from_branches(self.success.is_some(), self.error.is_some())
    }

    /// How long the runtime waits for the THEN command's result.
    ///
    /// With both branches present the shorter branch timeout wins; with one
    /// branch its timeout is used unless zero; otherwise the result node's
    /// own timeout applies.
    #[must_use]
    pub fn evaluation_window(&self) -> Duration {
        let base = self.result.wait();
        match (&self.success, &self.error) {
            (Some(success), Some(error)) => success.wait().min(error.wait()),
            (Some(branch), None) | (None, Some(branch)) => {
                let wait = branch.wait();
                if wait.is_zero() { base } else { wait }
            }
            (None, None) => base,
        }
    }
}

impl Serialize for Chain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        seq.serialize_element(&self.trigger)?;
        seq.serialize_element(&self.result)?;
        if let Some(success) = &self.success {
            seq.serialize_element(success)?;
        }
        if let Some(error) = &self.error {
            seq.serialize_element(error)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nodes = Vec::<serde_json::Value>::deserialize(deserializer)?;
        Self::from_nodes(nodes).map_err(D::Error::custom)
    }
}

/// A persisted rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ActionId>,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub chain: Chain,
}

impl Action {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Row of the actions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub id: ActionId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// The comparable part of a raw payload: its `event` field when it is a
/// JSON object carrying one, the raw text otherwise.
#[must_use]
pub fn payload_event(raw: &str) -> Cow<'_, str> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(mut object)) => match object.remove("event") {
            Some(serde_json::Value::String(event)) => Cow::Owned(event),
            Some(other) => Cow::Owned(other.to_string()),
            None => Cow::Borrowed(raw),
        },
        _ => Cow::Borrowed(raw),
    }
}

fn resolve_placeholder<'a>(command: &'a str, trigger_payload: &'a str) -> &'a str {
    if command == IF_PLACEHOLDER {
        trigger_payload
    } else {
        command
    }
}

fn timeout_duration(amount: Option<u64>, unit: Option<TimeUnit>) -> Duration {
    unit.unwrap_or_default().to_duration(amount.unwrap_or(0))
}

fn trigger_source() -> String {
    TRIGGER_SOURCE.to_string()
}

fn enabled_by_default() -> bool {
    true
}

/// Accept any JSON scalar as text; `null` reads as the empty string.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(String::new()),
        other => scalar_to_string(other).ok_or_else(|| D::Error::custom("expected a scalar value")),
    }
}
