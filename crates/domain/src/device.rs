//! Device: an entry of the backend's device list.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

/// A device as listed by the backend's settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Devices sharing a category, as shown in one option group of a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGroup {
    pub category: String,
    /// Category name with its first letter capitalised.
    pub label: String,
    pub devices: Vec<DeviceSummary>,
}

/// Group enabled devices by category, keeping first-seen category order.
#[must_use]
pub fn group_by_category<'a>(
    devices: impl IntoIterator<Item = &'a DeviceSummary>,
) -> Vec<DeviceGroup> {
    let mut groups: Vec<DeviceGroup> = Vec::new();
    for device in devices.into_iter().filter(|d| d.enabled) {
        match groups.iter_mut().find(|g| g.category == device.category) {
            Some(group) => group.devices.push(device.clone()),
            None => groups.push(DeviceGroup {
                category: device.category.clone(),
                label: capitalise(&device.category),
                devices: vec![device.clone()],
            }),
        }
    }
    groups
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
