//! Form state ⇄ persisted [`Action`].

use crate::action::{
    Action, BranchKind, BranchNode, Chain, MatchValue, ResultNode, TRIGGER_SOURCE, TriggerNode,
};
use crate::error::{Field, FieldError, FormErrors, Problem};
use crate::id::DeviceId;
use crate::schema::{Comparator, TimeUnit, TopicMeta};

use super::{ChainBuilder, Edit, Slot, SlotState, TimingOverride};

/// The validated parts of one slot.
struct Filled<'a> {
    device: DeviceId,
    topic: &'a str,
    meta: &'a TopicMeta,
    value: &'a str,
    timing: Option<(u64, TimeUnit)>,
}

impl SlotState {
    fn filled(&self, errors: &mut FormErrors) -> Option<Filled<'_>> {
        let slot = Some(self.slot());
        let Some(device) = self.device() else {
            errors.push(FieldError::new(slot, Field::Device, Problem::Missing));
            return None;
        };
        let (Some(topic), Some(meta)) = (self.topic(), self.meta()) else {
            errors.push(FieldError::new(slot, Field::Topic, Problem::Missing));
            return None;
        };

        let mut valid = true;
        if let Err(problem) = self.input().check(self.value()) {
            errors.push(FieldError::new(slot, Field::Value, problem));
            valid = false;
        }
        let timing = match self.timing().map(TimingOverride::submitted).transpose() {
            Ok(timing) => timing.flatten(),
            Err(problem) => {
                errors.push(FieldError::new(slot, Field::Override, problem));
                valid = false;
                None
            }
        };
        valid.then_some(Filled {
            device,
            topic,
            meta,
            value: self.value(),
            timing,
        })
    }
}

impl ChainBuilder {
    /// Serialize the form into an [`Action`].
    ///
    /// Hidden branches are omitted; overrides are sent only when their
    /// checkbox is on.
    ///
    /// # Errors
    ///
    /// Returns every invalid field at once; nothing should be submitted
    /// while any remain.
    pub fn to_action(&self) -> Result<Action, FormErrors> {
        let mut errors = FormErrors::default();

        let name = self.name().trim();
        if name.is_empty() {
            errors.push(FieldError::new(None, Field::Name, Problem::Missing));
        }

        let trigger = self.slot(Slot::Trigger).filled(&mut errors).map(|filled| TriggerNode {
            device_id: filled.device,
            source: TRIGGER_SOURCE.to_string(),
            topic: filled.topic.to_string(),
            cmp: self.slot(Slot::Trigger).comparator(),
            matcher: MatchValue::new(filled.value),
            poll_topic: filled.meta.companion_poll_topic().map(str::to_string),
            poll_interval: filled.timing.map(|(amount, _)| amount),
            poll_interval_unit: filled.timing.map(|(_, unit)| unit),
        });

        let result = self.slot(Slot::Result).filled(&mut errors).map(|filled| ResultNode {
            device_id: filled.device,
            topic: filled.topic.to_string(),
            command: filled.value.to_string(),
            ignore_input: self.ignore_input(),
            result_topic: filled.meta.companion_result_topic().map(str::to_string),
            timeout: filled.timing.map(|(amount, _)| amount),
            timeout_unit: filled.timing.map(|(_, unit)| unit),
        });

        let mut branches = [None, None];
        for (index, kind) in BranchKind::ALL.into_iter().enumerate() {
            if self.is_visible(Slot::from(kind)) {
                branches[index] = self.branch_node(kind, &mut errors);
            }
        }
        let [success, error] = branches;

        match (trigger, result) {
            (Some(trigger), Some(result)) if errors.is_empty() => Ok(Action {
                id: self.id(),
                name: name.to_string(),
                description: self.description().to_string(),
                enabled: self.enabled(),
                chain: Chain {
                    trigger,
                    result,
                    success,
                    error,
                },
            }),
            _ => Err(errors),
        }
    }

    fn branch_node(&self, kind: BranchKind, errors: &mut FormErrors) -> Option<BranchNode> {
        let branch = self.branch(kind);
        let filled = branch.step().filled(errors);
        let matched = match branch.check_match() {
            Ok(()) => true,
            Err(problem) => {
                errors.push(FieldError::new(Some(Slot::from(kind)), Field::Match, problem));
                false
            }
        };
        let filled = filled.filter(|_| matched)?;
        Some(BranchNode {
            branch: kind,
            device_id: filled.device,
            topic: filled.topic.to_string(),
            command: filled.value.to_string(),
            result_topic: filled.meta.companion_result_topic().map(str::to_string),
            timeout: filled.timing.map(|(amount, _)| amount),
            timeout_unit: filled.timing.map(|(_, unit)| unit),
            cmp: Some(branch.match_comparator()),
            matcher: MatchValue::new(branch.match_value()),
        })
    }

    /// The edits that rebuild `action` in a fresh builder.
    ///
    /// Replayed in order, with every returned [`Effect`](super::Effect)
    /// completed before the next edit, they run the same schema loads and
    /// input rebuilds as live editing. Values the current schema no longer
    /// offers end up unselected.
    #[must_use]
    pub fn restore(action: &Action) -> Vec<Edit> {
        let chain = &action.chain;
        let mut edits = vec![
            Edit::Name(action.name.clone()),
            Edit::Description(action.description.clone()),
            Edit::Enabled(action.enabled),
        ];

        let trigger = &chain.trigger;
        push_step(
            &mut edits,
            Slot::Trigger,
            trigger.device_id,
            &trigger.topic,
            Some(trigger.cmp),
            &trigger.matcher.value,
            trigger.poll_interval.map(|n| (n, trigger.poll_interval_unit)),
        );

        edits.push(Edit::IgnoreInput(chain.result.ignore_input));
        let result = &chain.result;
        push_step(
            &mut edits,
            Slot::Result,
            result.device_id,
            &result.topic,
            None,
            &result.command,
            result.timeout.map(|n| (n, result.timeout_unit)),
        );

        edits.push(Edit::EvaluateMode(chain.evaluate_mode()));
        for kind in BranchKind::ALL {
            let Some(node) = chain.branch(kind) else {
                continue;
            };
            push_step(
                &mut edits,
                Slot::from(kind),
                node.device_id,
                &node.topic,
                None,
                &node.command,
                node.timeout.map(|n| (n, node.timeout_unit)),
            );
            edits.push(Edit::MatchComparator {
                branch: kind,
                cmp: node.cmp.unwrap_or_default(),
            });
            edits.push(Edit::Match {
                branch: kind,
                value: node.matcher.value.clone(),
            });
        }
        edits
    }
}

fn push_step(
    edits: &mut Vec<Edit>,
    slot: Slot,
    device: DeviceId,
    topic: &str,
    cmp: Option<Comparator>,
    value: &str,
    timing: Option<(u64, Option<TimeUnit>)>,
) {
    edits.push(Edit::Device {
        slot,
        device: Some(device),
    });
    edits.push(Edit::Topic {
        slot,
        topic: Some(topic.to_string()),
    });
    if let Some(cmp) = cmp {
        edits.push(Edit::Comparator { slot, cmp });
    }
    edits.push(Edit::Value {
        slot,
        value: value.to_string(),
    });
    if let Some((amount, unit)) = timing {
        edits.push(Edit::OverrideEnabled { slot, on: true });
        edits.push(Edit::Override {
            slot,
            value: amount.to_string(),
            unit: unit.unwrap_or_default(),
        });
    }
}
