//! Plain-text rendering of command results.

use lens_app::ports::{Notice, NoticeLevel};
use lens_domain::action::{ActionSummary, TriggerNode, payload_event};
use lens_domain::schema::{DeviceSchema, SchemaHalf, TopicMeta};

pub fn summaries(rows: &[ActionSummary]) -> String {
    if rows.is_empty() {
        return "no actions\n".to_string();
    }
    rows.iter()
        .map(|row| {
            let state = if row.enabled { "on " } else { "off" };
            let mut line = format!("{:>4}  {state}  {}", row.id, row.name);
            if !row.description.is_empty() {
                line.push_str(&format!("  ({})", row.description));
            }
            line.push('\n');
            line
        })
        .collect()
}

pub fn schema(schema: &DeviceSchema) -> String {
    if schema.is_empty() {
        return "schema unavailable\n".to_string();
    }
    let mut out = String::new();
    for (title, half) in [
        ("topics", SchemaHalf::Topics),
        ("command topics", SchemaHalf::CommandTopics),
    ] {
        out.push_str(&format!("{title}:\n"));
        for (name, meta) in schema.half(half) {
            out.push_str(&format!("  {}\n", topic_line(name, meta)));
        }
    }
    out
}

fn topic_line(name: &str, meta: &TopicMeta) -> String {
    let mut line = format!("{name} ({}", meta.kind);
    if let Some(units) = &meta.units {
        line.push_str(&format!(", {units}"));
    }
    line.push(')');
    if let Some(label) = &meta.label {
        line.push_str(&format!(" {label}"));
    }
    let choices = meta.choices();
    if !choices.is_empty() {
        let labels: Vec<&str> = choices.iter().map(|value| meta.display_label(value)).collect();
        line.push_str(&format!(" [{}]", labels.join(", ")));
    }
    line
}

pub fn check(trigger: &TriggerNode, payload: &str) -> String {
    let verdict = if trigger.matches(payload) {
        "fires"
    } else {
        "does not fire"
    };
    format!(
        "IF {} {} {}: {:?} {verdict}\n",
        trigger.topic,
        trigger.cmp,
        trigger.matcher.value,
        payload_event(payload),
    )
}

pub fn notices(notices: &[Notice]) -> String {
    let mut out = String::new();
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Danger => "error",
        };
        out.push_str(&format!("[{tag}] {}\n", notice.message));
    }
    out
}
