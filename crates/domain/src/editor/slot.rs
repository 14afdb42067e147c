//! Per-slot form state: device, topic, value input and timing override.

use std::fmt;
use std::sync::Arc;

use crate::action::BranchKind;
use crate::error::Problem;
use crate::id::DeviceId;
use crate::schema::{Comparator, DeviceSchema, SchemaHalf, TimeUnit, TopicMeta};

use super::input::{Choice, InputRole, ValueInput};

/// One of the four device/topic/value rows of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Trigger,
    Result,
    Success,
    Error,
}

impl Slot {
    pub const ALL: [Self; 4] = [Self::Trigger, Self::Result, Self::Success, Self::Error];

    /// Schema half the topic selector draws from.
    #[must_use]
    pub fn half(self) -> SchemaHalf {
        match self {
            Self::Trigger => SchemaHalf::Topics,
            Self::Result | Self::Success | Self::Error => SchemaHalf::CommandTopics,
        }
    }

    #[must_use]
    pub fn role(self) -> InputRole {
        match self {
            Self::Trigger => InputRole::Condition,
            Self::Result | Self::Success | Self::Error => InputRole::Command,
        }
    }

    #[must_use]
    pub fn timing(self) -> TimingKind {
        match self {
            Self::Trigger => TimingKind::Poll,
            Self::Result | Self::Success | Self::Error => TimingKind::Timeout,
        }
    }

    #[must_use]
    pub fn branch(self) -> Option<BranchKind> {
        match self {
            Self::Success => Some(BranchKind::Success),
            Self::Error => Some(BranchKind::Error),
            Self::Trigger | Self::Result => None,
        }
    }
}

impl From<BranchKind> for Slot {
    fn from(kind: BranchKind) -> Self {
        match kind {
            BranchKind::Success => Self::Success,
            BranchKind::Error => Self::Error,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trigger => "trigger",
            Self::Result => "result",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// Progress of a slot through the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlotStage {
    DeviceUnselected,
    TopicUnselected,
    TopicSelected,
    /// Every required field holds an acceptable value.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingKind {
    /// Trigger polling cadence.
    Poll,
    /// Command response-wait budget.
    Timeout,
}

impl fmt::Display for TimingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poll => "poll interval",
            Self::Timeout => "timeout",
        })
    }
}

/// Device-suggested poll interval or timeout, optionally overridden.
///
/// While the override is off the row shows the suggestion and nothing is
/// submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingOverride {
    kind: TimingKind,
    suggested: u64,
    suggested_unit: TimeUnit,
    custom: bool,
    value: String,
    unit: TimeUnit,
}

impl TimingOverride {
    /// The override row for a topic, when its schema suggests a value.
    #[must_use]
    pub fn suggested_by(kind: TimingKind, meta: &TopicMeta) -> Option<Self> {
        let (suggested, suggested_unit) = match kind {
            TimingKind::Poll => meta.suggested_poll(),
            TimingKind::Timeout => meta.suggested_timeout(),
        }?;
        Some(Self {
            kind,
            suggested,
            suggested_unit,
            custom: false,
            value: suggested.to_string(),
            unit: suggested_unit,
        })
    }

    #[must_use]
    pub fn kind(&self) -> TimingKind {
        self.kind
    }

    #[must_use]
    pub fn suggested(&self) -> (u64, TimeUnit) {
        (self.suggested, self.suggested_unit)
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Toggle the opt-in checkbox. Turning it off restores the suggestion.
    pub fn set_custom(&mut self, on: bool) {
        self.custom = on;
        if !on {
            self.value = self.suggested.to_string();
            self.unit = self.suggested_unit;
        }
    }

    /// Edit the fields; ignored while the override is off.
    pub fn edit(&mut self, value: impl Into<String>, unit: TimeUnit) -> bool {
        if !self.custom {
            return false;
        }
        self.value = value.into();
        self.unit = unit;
        true
    }

    /// The value sent on save: `None` unless the override is on.
    ///
    /// # Errors
    ///
    /// Returns [`Problem::NotPositive`] when the custom value is not a
    /// positive whole number.
    pub fn submitted(&self) -> Result<Option<(u64, TimeUnit)>, Problem> {
        if !self.custom {
            return Ok(None);
        }
        match self.value.trim().parse::<u64>() {
            Ok(amount) if amount > 0 => Ok(Some((amount, self.unit))),
            _ => Err(Problem::NotPositive(self.value.clone())),
        }
    }
}

/// Form state of one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotState {
    slot: Slot,
    device: Option<DeviceId>,
    schema: Option<Arc<DeviceSchema>>,
    topic: Option<String>,
    meta: Option<TopicMeta>,
    input: ValueInput,
    cmp: Comparator,
    value: String,
    timing: Option<TimingOverride>,
}

impl SlotState {
    #[must_use]
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            device: None,
            schema: None,
            topic: None,
            meta: None,
            input: ValueInput::Disabled,
            cmp: Comparator::Eq,
            value: String::new(),
            timing: None,
        }
    }

    #[must_use]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    #[must_use]
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Schema of the selected device, once loaded.
    #[must_use]
    pub fn schema(&self) -> Option<&DeviceSchema> {
        self.schema.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn meta(&self) -> Option<&TopicMeta> {
        self.meta.as_ref()
    }

    #[must_use]
    pub fn input(&self) -> &ValueInput {
        &self.input
    }

    /// Comparator submitted on save; `==` when no comparator control is shown.
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        if self.input.comparator_visible() {
            self.cmp
        } else {
            Comparator::Eq
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn timing(&self) -> Option<&TimingOverride> {
        self.timing.as_ref()
    }

    #[must_use]
    pub fn topic_enabled(&self) -> bool {
        self.schema.is_some()
    }

    /// Topic options of the selected device, labelled for display.
    #[must_use]
    pub fn topic_options(&self) -> Vec<Choice> {
        let Some(schema) = &self.schema else {
            return Vec::new();
        };
        schema
            .half(self.slot.half())
            .iter()
            .map(|(name, meta)| {
                let label = meta.label.clone().unwrap_or_else(|| name.clone());
                Choice::new(name.clone(), label)
            })
            .collect()
    }

    #[must_use]
    pub fn stage(&self) -> SlotStage {
        if self.device.is_none() {
            return SlotStage::DeviceUnselected;
        }
        if self.topic.is_none() {
            return SlotStage::TopicUnselected;
        }
        let timing_ok = self.timing.as_ref().is_none_or(|t| t.submitted().is_ok());
        if self.input.accepts(&self.value) && timing_ok {
            SlotStage::Complete
        } else {
            SlotStage::TopicSelected
        }
    }

    /// Select a device; every dependent field is cleared.
    pub(super) fn select_device(&mut self, device: Option<DeviceId>) {
        *self = Self {
            device,
            ..Self::new(self.slot)
        };
    }

    /// Install a fetched schema. Returns `false` when the device selection
    /// has moved on and the schema is stale.
    pub(super) fn load_schema(&mut self, device: DeviceId, schema: Arc<DeviceSchema>) -> bool {
        if self.device != Some(device) {
            return false;
        }
        let known = self
            .topic
            .as_deref()
            .is_none_or(|topic| schema.topic(self.slot.half(), topic).is_some());
        self.schema = Some(schema);
        if !known {
            self.clear_topic();
        }
        true
    }

    /// Select a topic and rebuild the value input for its type.
    ///
    /// A topic missing from the loaded schema leaves the slot unselected.
    pub(super) fn select_topic(&mut self, topic: Option<&str>) {
        let found = topic.zip(self.schema.as_ref()).and_then(|(name, schema)| {
            schema
                .topic(self.slot.half(), name)
                .map(|meta| (name.to_string(), meta.clone()))
        });
        let Some((name, meta)) = found else {
            self.clear_topic();
            return;
        };
        self.input = ValueInput::for_topic(Some(&meta), self.slot.role());
        self.cmp = self.input.default_comparator();
        self.value.clear();
        self.timing = TimingOverride::suggested_by(self.slot.timing(), &meta);
        self.topic = Some(name);
        self.meta = Some(meta);
    }

    fn clear_topic(&mut self) {
        self.topic = None;
        self.meta = None;
        self.input = ValueInput::Disabled;
        self.cmp = Comparator::Eq;
        self.value.clear();
        self.timing = None;
    }

    pub(super) fn set_comparator(&mut self, cmp: Comparator) -> bool {
        if !self.input.comparators().contains(&cmp) {
            return false;
        }
        self.cmp = cmp;
        true
    }

    pub(super) fn set_value(&mut self, value: String) -> bool {
        if !self.input.is_enabled() {
            return false;
        }
        self.value = value;
        true
    }

    pub(super) fn timing_mut(&mut self) -> Option<&mut TimingOverride> {
        self.timing.as_mut()
    }
}

/// An EVALUATE branch: a command slot plus the match against the result.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchState {
    kind: BranchKind,
    step: SlotState,
    match_input: ValueInput,
    match_cmp: Comparator,
    match_value: String,
}

impl BranchState {
    #[must_use]
    pub fn new(kind: BranchKind) -> Self {
        Self {
            kind,
            step: SlotState::new(Slot::from(kind)),
            match_input: ValueInput::Disabled,
            match_cmp: Comparator::Eq,
            match_value: String::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    /// The branch's own device/topic/command row.
    #[must_use]
    pub fn step(&self) -> &SlotState {
        &self.step
    }

    pub(super) fn step_mut(&mut self) -> &mut SlotState {
        &mut self.step
    }

    #[must_use]
    pub fn match_input(&self) -> &ValueInput {
        &self.match_input
    }

    /// Comparator submitted with the match; `==` without a comparator control.
    #[must_use]
    pub fn match_comparator(&self) -> Comparator {
        if self.match_input.comparator_visible() {
            self.match_cmp
        } else {
            Comparator::Eq
        }
    }

    #[must_use]
    pub fn match_value(&self) -> &str {
        &self.match_value
    }

    /// Only the error branch may leave its match empty.
    #[must_use]
    pub fn match_optional(&self) -> bool {
        self.kind == BranchKind::Error
    }

    /// Validate the match value.
    ///
    /// # Errors
    ///
    /// Returns the [`Problem`] the match field is marked with.
    pub fn check_match(&self) -> Result<(), Problem> {
        if self.match_value.is_empty() && self.match_optional() {
            return Ok(());
        }
        self.match_input.check(&self.match_value)
    }

    /// Rebuild the match input from the result step; resets the match only
    /// when the widget shape changed.
    pub(super) fn refresh_match(&mut self, result: &SlotState) {
        let input = ValueInput::for_result_match(result, self.match_optional());
        if input != self.match_input {
            self.match_cmp = input.default_comparator();
            self.match_input = input;
            self.match_value.clear();
        }
    }

    pub(super) fn set_match(&mut self, value: String) -> bool {
        if !self.match_input.is_enabled() {
            return false;
        }
        self.match_value = value;
        true
    }

    pub(super) fn set_match_comparator(&mut self, cmp: Comparator) -> bool {
        if !self.match_input.comparators().contains(&cmp) {
            return false;
        }
        self.match_cmp = cmp;
        true
    }
}
