//! Pure view description of the editor.
//!
//! [`render`] maps builder state to plain data that a front end draws
//! as-is. Nothing here reads back from a rendered widget.

use std::fmt;

use crate::action::{BranchKind, EvaluateMode};
use crate::device::DeviceGroup;
use crate::schema::{Comparator, TIME_UNITS, TimeUnit};

use super::{
    BranchState, ChainBuilder, Choice, NONE_LABEL, Slot, SlotStage, SlotState, TimingKind,
    ValueInput,
};

/// Options sharing a group header; `label` is `None` for an ungrouped list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    pub label: Option<String>,
    pub options: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectView {
    pub enabled: bool,
    pub selected: Option<String>,
    pub groups: Vec<OptionGroup>,
}

impl SelectView {
    fn flat(enabled: bool, selected: Option<String>, options: Vec<Choice>) -> Self {
        Self {
            enabled,
            selected,
            groups: vec![OptionGroup {
                label: None,
                options,
            }],
        }
    }

    fn comparators(list: &[Comparator], selected: Comparator) -> Self {
        let options = list
            .iter()
            .map(|cmp| Choice::new(cmp.as_str(), cmp.as_str()))
            .collect();
        Self::flat(true, Some(selected.as_str().to_string()), options)
    }

    /// Label of the selected option.
    #[must_use]
    pub fn selected_label(&self) -> Option<&str> {
        let selected = self.selected.as_deref()?;
        self.groups
            .iter()
            .flat_map(|group| &group.options)
            .find(|choice| choice.value == selected)
            .map(|choice| choice.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputView {
    Disabled,
    Select {
        options: Vec<Choice>,
        selected: String,
    },
    Number {
        value: String,
        min: Option<f64>,
        max: Option<f64>,
        units: Option<String>,
    },
    Text {
        value: String,
    },
}

impl InputView {
    fn of(input: &ValueInput, value: &str) -> Self {
        match input {
            ValueInput::Disabled => Self::Disabled,
            ValueInput::Choice {
                options,
                none_option,
            } => {
                let mut all = Vec::with_capacity(options.len() + 1);
                if *none_option {
                    all.push(Choice::new("", NONE_LABEL));
                }
                all.extend(options.iter().cloned());
                Self::Select {
                    options: all,
                    selected: value.to_string(),
                }
            }
            ValueInput::Number { range, units, .. } => Self::Number {
                value: value.to_string(),
                min: range.and_then(|r| r.min()),
                max: range.and_then(|r| r.max()),
                units: units.clone(),
            },
            ValueInput::Text => Self::Text {
                value: value.to_string(),
            },
        }
    }
}

/// The poll-interval / timeout override row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingView {
    pub kind: TimingKind,
    pub checked: bool,
    /// Fields are editable only while the checkbox is on.
    pub editable: bool,
    pub value: String,
    pub unit: TimeUnit,
    pub units: Vec<TimeUnit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotView {
    pub slot: Slot,
    pub stage: SlotStage,
    pub device: SelectView,
    pub topic: SelectView,
    pub comparator: Option<SelectView>,
    pub input: InputView,
    pub timing: Option<TimingView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchView {
    pub kind: BranchKind,
    pub step: SlotView,
    pub match_comparator: Option<SelectView>,
    pub match_input: InputView,
    pub match_required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorView {
    pub title: &'static str,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub trigger: SlotView,
    pub ignore_input: bool,
    pub result: SlotView,
    pub evaluate: EvaluateMode,
    /// `None` while the EVALUATE mode hides the branch.
    pub success: Option<BranchView>,
    pub error: Option<BranchView>,
}

/// Describe the form for the current builder state.
#[must_use]
pub fn render(builder: &ChainBuilder) -> EditorView {
    let branch = |kind: BranchKind| {
        builder
            .is_visible(Slot::from(kind))
            .then(|| branch_view(builder, builder.branch(kind)))
    };
    EditorView {
        title: if builder.is_new() { "New Action" } else { "Edit Action" },
        name: builder.name().to_string(),
        description: builder.description().to_string(),
        enabled: builder.enabled(),
        trigger: slot_view(builder, builder.slot(Slot::Trigger)),
        ignore_input: builder.ignore_input(),
        result: slot_view(builder, builder.slot(Slot::Result)),
        evaluate: builder.evaluate_mode(),
        success: branch(BranchKind::Success),
        error: branch(BranchKind::Error),
    }
}

fn slot_view(builder: &ChainBuilder, state: &SlotState) -> SlotView {
    let device = SelectView {
        enabled: true,
        selected: state.device().map(|id| id.to_string()),
        groups: builder
            .device_options(state.slot())
            .into_iter()
            .map(device_group)
            .collect(),
    };
    let topic = SelectView::flat(
        state.topic_enabled(),
        state.topic().map(str::to_string),
        state.topic_options(),
    );
    let comparator = state
        .input()
        .comparator_visible()
        .then(|| SelectView::comparators(state.input().comparators(), state.comparator()));
    let timing = state.timing().map(|timing| TimingView {
        kind: timing.kind(),
        checked: timing.is_custom(),
        editable: timing.is_custom(),
        value: timing.value().to_string(),
        unit: timing.unit(),
        units: TIME_UNITS.to_vec(),
    });
    SlotView {
        slot: state.slot(),
        stage: state.stage(),
        device,
        topic,
        comparator,
        input: InputView::of(state.input(), state.value()),
        timing,
    }
}

fn branch_view(builder: &ChainBuilder, branch: &BranchState) -> BranchView {
    let input = branch.match_input();
    BranchView {
        kind: branch.kind(),
        step: slot_view(builder, branch.step()),
        match_comparator: input
            .comparator_visible()
            .then(|| SelectView::comparators(input.comparators(), branch.match_comparator())),
        match_input: InputView::of(input, branch.match_value()),
        match_required: !branch.match_optional(),
    }
}

fn device_group(group: DeviceGroup) -> OptionGroup {
    OptionGroup {
        label: Some(group.label),
        options: group
            .devices
            .into_iter()
            .map(|device| Choice::new(device.id.to_string(), device.name))
            .collect(),
    }
}

impl fmt::Display for EditorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "  name:        {}", self.name)?;
        if !self.description.is_empty() {
            writeln!(f, "  description: {}", self.description)?;
        }
        writeln!(f, "  enabled:     {}", self.enabled)?;
        writeln!(f, "IF")?;
        write!(f, "{}", self.trigger)?;
        writeln!(f, "THEN{}", if self.ignore_input { " (ignore input)" } else { "" })?;
        write!(f, "{}", self.result)?;
        writeln!(f, "EVALUATE {}", self.evaluate)?;
        for branch in [&self.success, &self.error].into_iter().flatten() {
            write!(f, "{branch}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SlotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = self.device.selected_label().unwrap_or("-");
        let topic = self.topic.selected_label().unwrap_or("-");
        write!(f, "  {device} / {topic}")?;
        if let Some(cmp) = &self.comparator {
            write!(f, " {}", cmp.selected.as_deref().unwrap_or("=="))?;
        }
        if let Some(value) = input_text(&self.input) {
            write!(f, " {value}")?;
        }
        if let Some(timing) = &self.timing {
            let origin = if timing.checked { "custom" } else { "suggested" };
            write!(f, " [{} {} {} {origin}]", timing.kind, timing.value, timing.unit)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for BranchView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  on {}:", self.kind)?;
        write!(f, "{}", self.step)?;
        let cmp = self
            .match_comparator
            .as_ref()
            .and_then(|select| select.selected.as_deref())
            .unwrap_or("==");
        match input_text(&self.match_input) {
            Some(value) if !value.is_empty() => writeln!(f, "    when result {cmp} {value}"),
            _ => writeln!(f, "    when any result"),
        }
    }
}

fn input_text(input: &InputView) -> Option<&str> {
    match input {
        InputView::Disabled => None,
        InputView::Select { options, selected } => Some(
            options
                .iter()
                .find(|choice| &choice.value == selected)
                .map_or(selected.as_str(), |choice| choice.label.as_str()),
        ),
        InputView::Number { value, .. } | InputView::Text { value } => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::super::Edit;
    use super::super::fixtures::*;
    use super::*;

    fn built() -> ChainBuilder {
        let mut builder = ChainBuilder::new(devices());
        for step in [
            Edit::Name("Boiler guard".to_string()),
            Edit::Device { slot: Slot::Trigger, device: Some(SENSOR) },
            Edit::Topic { slot: Slot::Trigger, topic: Some("temp".to_string()) },
            Edit::Value { slot: Slot::Trigger, value: "75".to_string() },
            Edit::Device { slot: Slot::Result, device: Some(DIMMER) },
        ] {
            edit(&mut builder, step);
        }
        builder
    }

    #[test]
    fn should_title_new_form_when_action_has_no_id() {
        let view = render(&ChainBuilder::new(devices()));
        assert_eq!(view.title, "New Action");
        assert!(view.success.is_none());
        assert!(view.error.is_none());
        assert_eq!(view.trigger.input, InputView::Disabled);
        assert!(!view.trigger.topic.enabled);
    }

    #[test]
    fn should_group_device_options_by_category() {
        let view = render(&ChainBuilder::new(devices()));
        let labels: Vec<_> = view.trigger.device.groups.iter().map(|g| g.label.clone()).collect();
        assert_eq!(labels, vec![Some("Iot".to_string()), Some("Camera".to_string())]);
    }

    #[test]
    fn should_show_comparator_and_range_when_trigger_is_numeric() {
        let view = render(&built());
        let comparator = view.trigger.comparator.unwrap();
        assert_eq!(comparator.selected.as_deref(), Some("<"));
        assert_eq!(
            view.trigger.input,
            InputView::Number {
                value: "75".to_string(),
                min: Some(0.0),
                max: Some(100.0),
                units: Some("°C".to_string()),
            }
        );
        let timing = view.trigger.timing.unwrap();
        assert!(!timing.checked);
        assert!(!timing.editable);
        assert_eq!(timing.value, "30");
    }

    #[test]
    fn should_list_only_filtered_result_devices() {
        let view = render(&built());
        let options: Vec<_> = view.result.device.groups.iter().flat_map(|g| &g.options).collect();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "Hall dimmer");
    }

    #[test]
    fn should_offer_none_entry_when_error_match_is_optional() {
        let mut builder = ChainBuilder::new(devices());
        for step in [
            Edit::Device { slot: Slot::Result, device: Some(RELAY) },
            Edit::Topic { slot: Slot::Result, topic: Some("relay/0/command".to_string()) },
            Edit::EvaluateMode(EvaluateMode::Error),
        ] {
            edit(&mut builder, step);
        }
        let view = render(&builder);
        assert!(view.success.is_none());
        let error = view.error.unwrap();
        assert!(!error.match_required);
        let InputView::Select { options, selected } = error.match_input else {
            panic!("expected a select");
        };
        assert_eq!(options[0], Choice::new("", NONE_LABEL));
        assert_eq!(selected, "");
    }

    #[test]
    fn should_print_readable_summary() {
        let text = render(&built()).to_string();
        assert!(text.starts_with("New Action\n"));
        assert!(text.contains("Boiler sensor / temp < 75 [poll interval 30 sec suggested]"));
        assert!(text.contains("EVALUATE ignore"));
    }
}
