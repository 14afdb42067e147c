//! Chain Builder: the state machine behind the IF / THEN / EVALUATE form.
//!
//! The builder never performs IO. Transitions that need data from the
//! backend return [`Effect`]s; the caller fetches what they ask for and
//! hands the answer back through [`ChainBuilder::complete`]. Answers that
//! no longer match the current selection are discarded, so the last
//! selection always wins.

mod codec;
mod input;
mod slot;
mod view;

use std::sync::Arc;

use crate::action::{BranchKind, EvaluateMode};
use crate::device::{DeviceGroup, DeviceSummary, group_by_category};
use crate::id::{ActionId, DeviceId};
use crate::schema::{Comparator, DeviceSchema, TimeUnit, TopicType};

pub use input::{Choice, InputRole, NONE_LABEL, ValueInput};
pub use slot::{BranchState, Slot, SlotStage, SlotState, TimingKind, TimingOverride};
pub use view::{
    BranchView, EditorView, InputView, OptionGroup, SelectView, SlotView, TimingView, render,
};

/// Backend work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the schema of the device selected in `slot`.
    LoadSchema { slot: Slot, device: DeviceId },
    /// Find the devices exposing a command topic of type `wanted`.
    FilterResultDevices { wanted: TopicType },
}

/// The answer to an [`Effect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    SchemaLoaded {
        slot: Slot,
        device: DeviceId,
        schema: Arc<DeviceSchema>,
    },
    ResultDevices {
        wanted: TopicType,
        allowed: Vec<DeviceId>,
    },
}

impl Completion {
    /// Answer a [`Effect::FilterResultDevices`] from known schemas.
    #[must_use]
    pub fn result_devices<'a>(
        wanted: TopicType,
        schemas: impl IntoIterator<Item = (DeviceId, &'a DeviceSchema)>,
    ) -> Self {
        let allowed = schemas
            .into_iter()
            .filter(|(_, schema)| schema.offers_command_type(wanted))
            .map(|(device, _)| device)
            .collect();
        Self::ResultDevices { wanted, allowed }
    }
}

/// A single user edit of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Name(String),
    Description(String),
    Enabled(bool),
    Device { slot: Slot, device: Option<DeviceId> },
    Topic { slot: Slot, topic: Option<String> },
    Comparator { slot: Slot, cmp: Comparator },
    Value { slot: Slot, value: String },
    OverrideEnabled { slot: Slot, on: bool },
    Override { slot: Slot, value: String, unit: TimeUnit },
    IgnoreInput(bool),
    EvaluateMode(EvaluateMode),
    Match { branch: BranchKind, value: String },
    MatchComparator { branch: BranchKind, cmp: Comparator },
}

/// Typed form state of the action editor.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBuilder {
    id: Option<ActionId>,
    name: String,
    description: String,
    enabled: bool,
    devices: Vec<DeviceSummary>,
    /// THEN devices allowed by the trigger's value type; `None` lists all.
    result_candidates: Option<Vec<DeviceId>>,
    trigger: SlotState,
    result: SlotState,
    ignore_input: bool,
    evaluate: EvaluateMode,
    success: BranchState,
    error: BranchState,
}

impl ChainBuilder {
    /// An empty form for a new action.
    #[must_use]
    pub fn new(devices: Vec<DeviceSummary>) -> Self {
        Self {
            id: None,
            name: String::new(),
            description: String::new(),
            enabled: true,
            devices,
            result_candidates: None,
            trigger: SlotState::new(Slot::Trigger),
            result: SlotState::new(Slot::Result),
            ignore_input: false,
            evaluate: EvaluateMode::Ignore,
            success: BranchState::new(BranchKind::Success),
            error: BranchState::new(BranchKind::Error),
        }
    }

    /// An empty form that saves over the action `id`.
    #[must_use]
    pub fn editing(id: ActionId, devices: Vec<DeviceSummary>) -> Self {
        Self {
            id: Some(id),
            ..Self::new(devices)
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<ActionId> {
        self.id
    }

    /// Record the id assigned by the backend after a first save.
    pub fn set_id(&mut self, id: ActionId) {
        self.id = Some(id);
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn ignore_input(&self) -> bool {
        self.ignore_input
    }

    #[must_use]
    pub fn evaluate_mode(&self) -> EvaluateMode {
        self.evaluate
    }

    #[must_use]
    pub fn devices(&self) -> &[DeviceSummary] {
        &self.devices
    }

    #[must_use]
    pub fn slot(&self, slot: Slot) -> &SlotState {
        match slot {
            Slot::Trigger => &self.trigger,
            Slot::Result => &self.result,
            Slot::Success => self.success.step(),
            Slot::Error => self.error.step(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        match slot {
            Slot::Trigger => &mut self.trigger,
            Slot::Result => &mut self.result,
            Slot::Success => self.success.step_mut(),
            Slot::Error => self.error.step_mut(),
        }
    }

    #[must_use]
    pub fn branch(&self, kind: BranchKind) -> &BranchState {
        match kind {
            BranchKind::Success => &self.success,
            BranchKind::Error => &self.error,
        }
    }

    fn branch_mut(&mut self, kind: BranchKind) -> &mut BranchState {
        match kind {
            BranchKind::Success => &mut self.success,
            BranchKind::Error => &mut self.error,
        }
    }

    /// Value type of the selected trigger topic.
    #[must_use]
    pub fn out_type(&self) -> Option<TopicType> {
        self.trigger.meta().map(|meta| meta.kind)
    }

    /// Type the THEN device list is filtered by, if any.
    #[must_use]
    pub fn result_filter(&self) -> Option<TopicType> {
        if self.ignore_input {
            None
        } else {
            self.out_type()
        }
    }

    #[must_use]
    pub fn result_candidates(&self) -> Option<&[DeviceId]> {
        self.result_candidates.as_deref()
    }

    /// Whether `device` may be picked in `slot`.
    #[must_use]
    pub fn offers_device(&self, slot: Slot, device: DeviceId) -> bool {
        let listed = self.devices.iter().any(|d| d.id == device && d.enabled);
        let allowed = match (slot, &self.result_candidates) {
            (Slot::Result, Some(candidates)) => candidates.contains(&device),
            _ => true,
        };
        listed && allowed
    }

    /// Device select options of `slot`, grouped by category.
    #[must_use]
    pub fn device_options(&self, slot: Slot) -> Vec<DeviceGroup> {
        group_by_category(
            self.devices
                .iter()
                .filter(|device| self.offers_device(slot, device.id)),
        )
    }

    /// Whether `slot` is shown and serialized.
    #[must_use]
    pub fn is_visible(&self, slot: Slot) -> bool {
        slot.branch().is_none_or(|kind| self.evaluate.shows(kind))
    }

    #[must_use]
    pub fn stage(&self, slot: Slot) -> SlotStage {
        self.slot(slot).stage()
    }

    /// Replace the device list; selections are kept.
    pub fn set_devices(&mut self, devices: Vec<DeviceSummary>) {
        self.devices = devices;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Apply one edit and return the backend work it requires.
    pub fn apply(&mut self, edit: Edit) -> Vec<Effect> {
        match edit {
            Edit::Name(name) => self.set_name(name),
            Edit::Description(description) => self.set_description(description),
            Edit::Enabled(enabled) => self.set_enabled(enabled),
            Edit::Device { slot, device } => return self.select_device(slot, device),
            Edit::Topic { slot, topic } => return self.select_topic(slot, topic.as_deref()),
            Edit::Comparator { slot, cmp } => {
                self.set_comparator(slot, cmp);
            }
            Edit::Value { slot, value } => {
                self.set_value(slot, value);
            }
            Edit::OverrideEnabled { slot, on } => {
                self.set_override_enabled(slot, on);
            }
            Edit::Override { slot, value, unit } => {
                self.edit_override(slot, value, unit);
            }
            Edit::IgnoreInput(on) => return self.set_ignore_input(on),
            Edit::EvaluateMode(mode) => self.set_evaluate_mode(mode),
            Edit::Match { branch, value } => {
                self.set_match(branch, value);
            }
            Edit::MatchComparator { branch, cmp } => {
                self.set_match_comparator(branch, cmp);
            }
        }
        Vec::new()
    }

    /// Select a device in `slot`, clearing the slot's topic and value.
    ///
    /// A THEN device outside the current filter leaves the slot unselected.
    pub fn select_device(&mut self, slot: Slot, device: Option<DeviceId>) -> Vec<Effect> {
        let device = device.filter(|d| slot != Slot::Result || self.offers_device(slot, *d));
        self.slot_mut(slot).select_device(device);

        let mut effects: Vec<Effect> = device
            .map(|device| Effect::LoadSchema { slot, device })
            .into_iter()
            .collect();
        match slot {
            Slot::Trigger => effects.extend(self.refilter()),
            Slot::Result => self.refresh_matches(),
            Slot::Success | Slot::Error => {}
        }
        effects
    }

    /// Select a topic in `slot` and rebuild its value input.
    pub fn select_topic(&mut self, slot: Slot, topic: Option<&str>) -> Vec<Effect> {
        self.slot_mut(slot).select_topic(topic);
        match slot {
            Slot::Trigger => self.refilter(),
            Slot::Result => {
                self.refresh_matches();
                Vec::new()
            }
            Slot::Success | Slot::Error => Vec::new(),
        }
    }

    /// Returns `false` when `cmp` is not offered for the slot's topic.
    pub fn set_comparator(&mut self, slot: Slot, cmp: Comparator) -> bool {
        self.slot_mut(slot).set_comparator(cmp)
    }

    /// Returns `false` while the slot has no topic.
    pub fn set_value(&mut self, slot: Slot, value: impl Into<String>) -> bool {
        self.slot_mut(slot).set_value(value.into())
    }

    /// Toggle the override checkbox; `false` when the topic suggests no value.
    pub fn set_override_enabled(&mut self, slot: Slot, on: bool) -> bool {
        match self.slot_mut(slot).timing_mut() {
            Some(timing) => {
                timing.set_custom(on);
                true
            }
            None => false,
        }
    }

    /// Edit the override fields; `false` unless the override is enabled.
    pub fn edit_override(&mut self, slot: Slot, value: impl Into<String>, unit: TimeUnit) -> bool {
        self.slot_mut(slot)
            .timing_mut()
            .is_some_and(|timing| timing.edit(value, unit))
    }

    pub fn set_ignore_input(&mut self, on: bool) -> Vec<Effect> {
        self.ignore_input = on;
        self.refilter()
    }

    /// Hidden branches keep their data but are left out on save.
    pub fn set_evaluate_mode(&mut self, mode: EvaluateMode) {
        self.evaluate = mode;
    }

    pub fn set_match(&mut self, kind: BranchKind, value: impl Into<String>) -> bool {
        self.branch_mut(kind).set_match(value.into())
    }

    pub fn set_match_comparator(&mut self, kind: BranchKind, cmp: Comparator) -> bool {
        self.branch_mut(kind).set_match_comparator(cmp)
    }

    /// Feed back the answer to an earlier [`Effect`].
    ///
    /// Returns `false` when the answer is stale and was discarded.
    pub fn complete(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::SchemaLoaded {
                slot,
                device,
                schema,
            } => {
                if !self.slot_mut(slot).load_schema(device, schema) {
                    return false;
                }
                if slot == Slot::Result {
                    self.refresh_matches();
                }
                true
            }
            Completion::ResultDevices { wanted, allowed } => {
                if self.result_filter() != Some(wanted) {
                    return false;
                }
                let selected = self.result.device();
                self.result_candidates = Some(allowed);
                if let Some(device) = selected {
                    if !self.offers_device(Slot::Result, device) {
                        self.result.select_device(None);
                        self.refresh_matches();
                    }
                }
                true
            }
        }
    }

    fn refilter(&mut self) -> Vec<Effect> {
        match self.result_filter() {
            Some(wanted) => vec![Effect::FilterResultDevices { wanted }],
            None => {
                self.result_candidates = None;
                Vec::new()
            }
        }
    }

    fn refresh_matches(&mut self) {
        self.success.refresh_match(&self.result);
        self.error.refresh_match(&self.result);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use super::*;

    pub const SENSOR: DeviceId = DeviceId::new(1);
    pub const RELAY: DeviceId = DeviceId::new(2);
    pub const DIMMER: DeviceId = DeviceId::new(3);
    pub const CAMERA: DeviceId = DeviceId::new(4);

    pub fn devices() -> Vec<DeviceSummary> {
        [
            (SENSOR, "Boiler sensor", "iot"),
            (RELAY, "Pump relay", "iot"),
            (DIMMER, "Hall dimmer", "iot"),
            (CAMERA, "Yard camera", "camera"),
        ]
        .into_iter()
        .map(|(id, name, category)| DeviceSummary {
            id,
            name: name.to_string(),
            category: category.to_string(),
            enabled: true,
        })
        .collect()
    }

    pub fn schemas() -> BTreeMap<DeviceId, Arc<DeviceSchema>> {
        let sensor = serde_json::json!({
            "topics": {
                "temp": {
                    "type": "number",
                    "range": [0, 100],
                    "comparators": ["<", ">"],
                    "units": "°C",
                    "poll_interval": 30,
                    "poll_interval_unit": "sec"
                },
                "mode": {"type": "enum", "values": ["auto", "manual"]}
            }
        });
        let relay = serde_json::json!({
            "topics": {
                "relay/0": {"type": "enum", "values": ["on", "off"]}
            },
            "command_topics": {
                "relay/0/command": {
                    "type": "enum",
                    "values": ["on", "off", "toggle"],
                    "timeout": 10,
                    "timeout_unit": "sec",
                    "result_topic": "relay/0",
                    "result_payload": {
                        "options": [
                            {"values": ["on", "off"]},
                            {"values": ["timeout"], "display": {"timeout": "No answer"}}
                        ]
                    }
                }
            }
        });
        let dimmer = serde_json::json!({
            "topics": {
                "brightness": {"type": "number", "range": [0, 100]}
            },
            "command_topics": {
                "brightness/set": {
                    "type": "number",
                    "range": [0, 100],
                    "result_topic": "brightness"
                }
            }
        });
        let camera = serde_json::json!({
            "command_topics": {
                "snapshot": {"type": "string", "timeout": 5}
            }
        });
        [(SENSOR, sensor), (RELAY, relay), (DIMMER, dimmer), (CAMERA, camera)]
            .into_iter()
            .map(|(id, json)| (id, Arc::new(serde_json::from_value(json).unwrap())))
            .collect()
    }

    /// Fulfil effects synchronously from the fixture schemas.
    pub fn settle(builder: &mut ChainBuilder, effects: Vec<Effect>) {
        let schemas = schemas();
        for effect in effects {
            let completion = match effect {
                Effect::LoadSchema { slot, device } => Completion::SchemaLoaded {
                    slot,
                    device,
                    schema: schemas.get(&device).cloned().unwrap_or_default(),
                },
                Effect::FilterResultDevices { wanted } => Completion::result_devices(
                    wanted,
                    schemas.iter().map(|(id, schema)| (*id, schema.as_ref())),
                ),
            };
            builder.complete(completion);
        }
    }

    pub fn edit(builder: &mut ChainBuilder, edit: Edit) {
        let effects = builder.apply(edit);
        settle(builder, effects);
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn with_trigger(topic: &str) -> ChainBuilder {
        let mut builder = ChainBuilder::new(devices());
        edit(&mut builder, Edit::Device { slot: Slot::Trigger, device: Some(SENSOR) });
        edit(&mut builder, Edit::Topic { slot: Slot::Trigger, topic: Some(topic.to_string()) });
        builder
    }

    fn result_ids(builder: &ChainBuilder) -> Vec<DeviceId> {
        builder
            .device_options(Slot::Result)
            .into_iter()
            .flat_map(|group| group.devices)
            .map(|device| device.id)
            .collect()
    }

    #[test]
    fn should_request_schema_when_device_is_selected() {
        let mut builder = ChainBuilder::new(devices());
        let effects = builder.select_device(Slot::Result, Some(RELAY));
        assert_eq!(effects, vec![Effect::LoadSchema { slot: Slot::Result, device: RELAY }]);
        assert_eq!(builder.stage(Slot::Result), SlotStage::TopicUnselected);
        assert!(!builder.slot(Slot::Result).topic_enabled());
    }

    #[test]
    fn should_filter_result_devices_when_trigger_topic_is_numeric() {
        let builder = with_trigger("temp");
        assert_eq!(builder.out_type(), Some(TopicType::Number));
        assert_eq!(result_ids(&builder), vec![DIMMER]);
    }

    #[test]
    fn should_list_all_devices_when_ignore_input_is_checked() {
        let mut builder = with_trigger("temp");
        edit(&mut builder, Edit::IgnoreInput(true));
        assert_eq!(result_ids(&builder), vec![SENSOR, RELAY, DIMMER, CAMERA]);

        edit(&mut builder, Edit::IgnoreInput(false));
        assert_eq!(result_ids(&builder), vec![DIMMER]);
    }

    #[test]
    fn should_hide_comparator_when_trigger_topic_is_enum() {
        let builder = with_trigger("mode");
        assert!(!builder.slot(Slot::Trigger).input().comparator_visible());
        assert_eq!(builder.slot(Slot::Trigger).comparator(), Comparator::Eq);
    }

    #[test]
    fn should_clear_trigger_topic_and_filter_when_device_changes() {
        let mut builder = with_trigger("temp");
        edit(&mut builder, Edit::Value { slot: Slot::Trigger, value: "75".to_string() });
        edit(&mut builder, Edit::Device { slot: Slot::Trigger, device: Some(DIMMER) });

        let trigger = builder.slot(Slot::Trigger);
        assert_eq!(trigger.topic(), None);
        assert_eq!(trigger.value(), "");
        assert_eq!(builder.result_candidates(), None);
    }

    #[test]
    fn should_drop_result_device_when_new_filter_excludes_it() {
        let mut builder = with_trigger("mode");
        edit(&mut builder, Edit::Device { slot: Slot::Result, device: Some(RELAY) });
        assert_eq!(builder.slot(Slot::Result).device(), Some(RELAY));

        edit(&mut builder, Edit::Topic { slot: Slot::Trigger, topic: Some("temp".to_string()) });
        assert_eq!(builder.slot(Slot::Result).device(), None);
    }

    #[test]
    fn should_discard_stale_schema_when_slot_device_changed() {
        let mut builder = ChainBuilder::new(devices());
        let first = builder.select_device(Slot::Trigger, Some(SENSOR));
        let second = builder.select_device(Slot::Trigger, Some(DIMMER));

        // Answers arrive out of order: the newer one first.
        settle(&mut builder, second);
        settle(&mut builder, first);

        let trigger = builder.slot(Slot::Trigger);
        assert_eq!(trigger.device(), Some(DIMMER));
        let topics: Vec<String> = trigger.topic_options().into_iter().map(|c| c.value).collect();
        assert_eq!(topics, vec!["brightness".to_string()]);
    }

    #[test]
    fn should_discard_stale_filter_when_trigger_topic_changed() {
        let mut builder = with_trigger("temp");
        let stale = Completion::ResultDevices {
            wanted: TopicType::Enum,
            allowed: vec![RELAY],
        };
        assert!(!builder.complete(stale));
        assert_eq!(result_ids(&builder), vec![DIMMER]);
    }

    #[test]
    fn should_build_branch_match_from_result_payload() {
        let mut builder = with_trigger("mode");
        edit(&mut builder, Edit::Device { slot: Slot::Result, device: Some(RELAY) });
        edit(
            &mut builder,
            Edit::Topic {
                slot: Slot::Result,
                topic: Some("relay/0/command".to_string()),
            },
        );

        let success = builder.branch(BranchKind::Success).match_input();
        let ValueInput::Choice { options, none_option } = success else {
            panic!("expected a choice, got {success:?}");
        };
        assert!(!none_option);
        assert_eq!(options.len(), 3);
        assert_eq!(options[2], Choice::new("timeout", "No answer"));

        let error = builder.branch(BranchKind::Error).match_input();
        assert!(matches!(error, ValueInput::Choice { none_option: true, .. }));
    }

    #[test]
    fn should_fall_back_to_result_read_topic_when_payload_is_undescribed() {
        let mut builder = with_trigger("temp");
        edit(&mut builder, Edit::Device { slot: Slot::Result, device: Some(DIMMER) });
        edit(
            &mut builder,
            Edit::Topic {
                slot: Slot::Result,
                topic: Some("brightness/set".to_string()),
            },
        );

        let input = builder.branch(BranchKind::Success).match_input();
        assert!(input.comparator_visible());
        assert!(builder.set_match_comparator(BranchKind::Success, Comparator::Ge));
    }

    #[test]
    fn should_keep_hidden_branch_data_when_mode_toggles() {
        let mut builder = ChainBuilder::new(devices());
        edit(&mut builder, Edit::EvaluateMode(EvaluateMode::Success));
        edit(&mut builder, Edit::Device { slot: Slot::Success, device: Some(CAMERA) });
        assert!(builder.is_visible(Slot::Success));

        edit(&mut builder, Edit::EvaluateMode(EvaluateMode::Ignore));
        assert!(!builder.is_visible(Slot::Success));
        edit(&mut builder, Edit::EvaluateMode(EvaluateMode::Success));
        assert_eq!(builder.slot(Slot::Success).device(), Some(CAMERA));
    }

    #[test]
    fn should_ignore_override_edit_when_topic_suggests_nothing() {
        let mut builder = with_trigger("mode");
        assert!(!builder.set_override_enabled(Slot::Trigger, true));
        assert!(!builder.edit_override(Slot::Trigger, "5", TimeUnit::Sec));
    }
}
