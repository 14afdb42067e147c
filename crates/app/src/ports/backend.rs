//! Backend port: the REST endpoints the action editor depends on.

use std::future::Future;
use std::sync::Arc;

use lens_domain::action::{Action, ActionSummary};
use lens_domain::device::DeviceSummary;
use lens_domain::error::BackendError;
use lens_domain::id::{ActionId, DeviceId};
use lens_domain::schema::DeviceSchema;

/// Remote store of devices, their schemas and persisted [`Action`]s.
pub trait ActionsBackend: Send + Sync {
    /// `GET /settings/devices/data`
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceSummary>, BackendError>> + Send;

    /// `GET /actions/schema/{device}`
    fn device_schema(
        &self,
        device: DeviceId,
    ) -> impl Future<Output = Result<DeviceSchema, BackendError>> + Send;

    /// `GET /actions/data`
    fn list_actions(&self) -> impl Future<Output = Result<Vec<ActionSummary>, BackendError>> + Send;

    /// `GET /actions/{id}`
    fn get_action(&self, id: ActionId) -> impl Future<Output = Result<Action, BackendError>> + Send;

    /// `POST /actions/`
    ///
    /// Resolves to the id the backend assigned. An acknowledgement without
    /// one is an error, so a saved form never stays "new".
    fn create_action(
        &self,
        action: &Action,
    ) -> impl Future<Output = Result<ActionId, BackendError>> + Send;

    /// `PUT /actions/{id}`
    fn update_action(
        &self,
        id: ActionId,
        action: &Action,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `DELETE /actions/{id}`
    fn delete_action(&self, id: ActionId) -> impl Future<Output = Result<(), BackendError>> + Send;
}

impl<T: ActionsBackend> ActionsBackend for Arc<T> {
    fn list_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceSummary>, BackendError>> + Send {
        T::list_devices(self)
    }

    fn device_schema(
        &self,
        device: DeviceId,
    ) -> impl Future<Output = Result<DeviceSchema, BackendError>> + Send {
        T::device_schema(self, device)
    }

    fn list_actions(
        &self,
    ) -> impl Future<Output = Result<Vec<ActionSummary>, BackendError>> + Send {
        T::list_actions(self)
    }

    fn get_action(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Action, BackendError>> + Send {
        T::get_action(self, id)
    }

    fn create_action(
        &self,
        action: &Action,
    ) -> impl Future<Output = Result<ActionId, BackendError>> + Send {
        T::create_action(self, action)
    }

    fn update_action(
        &self,
        id: ActionId,
        action: &Action,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        T::update_action(self, id, action)
    }

    fn delete_action(&self, id: ActionId) -> impl Future<Output = Result<(), BackendError>> + Send {
        T::delete_action(self, id)
    }
}
