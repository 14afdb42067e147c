//! In-memory fake of the backend port shared by the service tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use lens_domain::action::{Action, ActionSummary};
use lens_domain::device::DeviceSummary;
use lens_domain::error::BackendError;
use lens_domain::id::{ActionId, DeviceId};
use lens_domain::schema::DeviceSchema;

use crate::ports::{ActionsBackend, Notice, Notifier};

pub const SENSOR: DeviceId = DeviceId::new(1);
pub const RELAY: DeviceId = DeviceId::new(2);
pub const DIMMER: DeviceId = DeviceId::new(3);

#[derive(Default)]
struct State {
    devices: Vec<DeviceSummary>,
    devices_down: bool,
    schemas: HashMap<DeviceId, DeviceSchema>,
    broken_schemas: HashSet<DeviceId>,
    schema_calls: HashMap<DeviceId, usize>,
    actions: BTreeMap<ActionId, Action>,
    next_id: u64,
    rejection: Option<(u16, String)>,
    withhold_ids: bool,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn seeded() -> Arc<Self> {
        let backend = Self::default();
        {
            let mut state = backend.state.lock().unwrap();
            let named = [
                (SENSOR, "Boiler sensor"),
                (RELAY, "Pump relay"),
                (DIMMER, "Hall dimmer"),
            ];
            state.devices = named
                .into_iter()
                .map(|(id, name)| DeviceSummary {
                    id,
                    name: name.to_string(),
                    category: "iot".to_string(),
                    enabled: true,
                })
                .collect();
            state.schemas.insert(
                SENSOR,
                schema(serde_json::json!({
                    "topics": {
                        "temp": {"type": "number", "range": [0, 100], "comparators": ["<", ">"]},
                        "mode": {"type": "enum", "values": ["auto", "manual"]}
                    }
                })),
            );
            state.schemas.insert(
                RELAY,
                schema(serde_json::json!({
                    "topics": {"relay/0": {"type": "enum", "values": ["on", "off"]}},
                    "command_topics": {
                        "relay/0/command": {
                            "type": "enum",
                            "values": ["on", "off"],
                            "timeout": 10,
                            "result_topic": "relay/0"
                        }
                    }
                })),
            );
            state.schemas.insert(
                DIMMER,
                schema(serde_json::json!({
                    "topics": {"brightness": {"type": "number"}},
                    "command_topics": {"brightness/set": {"type": "number", "range": [0, 100]}}
                })),
            );
            state.next_id = 100;
        }
        Arc::new(backend)
    }

    pub fn break_schema(&self, device: DeviceId) {
        self.state.lock().unwrap().broken_schemas.insert(device);
    }

    pub fn repair_schema(&self, device: DeviceId) {
        self.state.lock().unwrap().broken_schemas.remove(&device);
    }

    pub fn take_devices_down(&self, down: bool) {
        self.state.lock().unwrap().devices_down = down;
    }

    pub fn reject_writes(&self, status: u16, message: &str) {
        self.state.lock().unwrap().rejection = Some((status, message.to_string()));
    }

    /// Store created actions but answer without their id.
    pub fn withhold_created_ids(&self) {
        self.state.lock().unwrap().withhold_ids = true;
    }

    pub fn schema_calls(&self, device: DeviceId) -> usize {
        self.state
            .lock()
            .unwrap()
            .schema_calls
            .get(&device)
            .copied()
            .unwrap_or(0)
    }

    pub fn insert_action(&self, id: ActionId, mut action: Action) {
        action.id = Some(id);
        self.state.lock().unwrap().actions.insert(id, action);
    }

    pub fn stored(&self, id: ActionId) -> Option<Action> {
        self.state.lock().unwrap().actions.get(&id).cloned()
    }

    pub fn action_count(&self) -> usize {
        self.state.lock().unwrap().actions.len()
    }
}

fn schema(json: serde_json::Value) -> DeviceSchema {
    serde_json::from_value(json).unwrap()
}

fn connection_refused() -> BackendError {
    BackendError::Unreachable(Box::new(std::io::Error::other("connection refused")))
}

fn rejected(state: &State) -> Option<BackendError> {
    state
        .rejection
        .clone()
        .map(|(status, message)| BackendError::Rejected { status, message })
}

impl ActionsBackend for FakeBackend {
    fn list_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceSummary>, BackendError>> + Send {
        let state = self.state.lock().unwrap();
        let result = if state.devices_down {
            Err(connection_refused())
        } else {
            Ok(state.devices.clone())
        };
        async move { result }
    }

    fn device_schema(
        &self,
        device: DeviceId,
    ) -> impl Future<Output = Result<DeviceSchema, BackendError>> + Send {
        let mut state = self.state.lock().unwrap();
        *state.schema_calls.entry(device).or_default() += 1;
        let result = if state.broken_schemas.contains(&device) {
            Err(connection_refused())
        } else {
            Ok(state.schemas.get(&device).cloned().unwrap_or_default())
        };
        async move { result }
    }

    fn list_actions(
        &self,
    ) -> impl Future<Output = Result<Vec<ActionSummary>, BackendError>> + Send {
        let state = self.state.lock().unwrap();
        let result: Vec<ActionSummary> = state
            .actions
            .iter()
            .map(|(id, action)| ActionSummary {
                id: *id,
                name: action.name.clone(),
                description: action.description.clone(),
                enabled: action.enabled,
            })
            .collect();
        async move { Ok(result) }
    }

    fn get_action(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Action, BackendError>> + Send {
        let state = self.state.lock().unwrap();
        let result = state.actions.get(&id).cloned().ok_or(BackendError::Rejected {
            status: 404,
            message: "action not found".to_string(),
        });
        async move { result }
    }

    fn create_action(
        &self,
        action: &Action,
    ) -> impl Future<Output = Result<ActionId, BackendError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = match rejected(&state) {
            Some(err) => Err(err),
            None => {
                state.next_id += 1;
                let id = ActionId::new(state.next_id);
                let mut stored = action.clone();
                stored.id = Some(id);
                state.actions.insert(id, stored);
                if state.withhold_ids {
                    Err(BackendError::InvalidBody(Box::new(std::io::Error::other(
                        "acknowledgement carries no id",
                    ))))
                } else {
                    Ok(id)
                }
            }
        };
        async move { result }
    }

    fn update_action(
        &self,
        id: ActionId,
        action: &Action,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = match rejected(&state) {
            Some(err) => Err(err),
            None => {
                let mut stored = action.clone();
                stored.id = Some(id);
                state.actions.insert(id, stored);
                Ok(())
            }
        };
        async move { result }
    }

    fn delete_action(&self, id: ActionId) -> impl Future<Output = Result<(), BackendError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = match rejected(&state) {
            Some(err) => Err(err),
            None => {
                state.actions.remove(&id);
                Ok(())
            }
        };
        async move { result }
    }
}

/// Notifier recording every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|notice| notice.message.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
