//! Device directory: the device list offered by every device select.

use std::sync::{Mutex, MutexGuard, PoisonError};

use lens_domain::device::DeviceSummary;

use crate::ports::ActionsBackend;

/// Caches `GET /settings/devices/data` for the session.
///
/// A failed fetch yields an empty list and is not cached.
pub struct DeviceDirectory<B> {
    backend: B,
    devices: Mutex<Option<Vec<DeviceSummary>>>,
}

impl<B: ActionsBackend> DeviceDirectory<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            devices: Mutex::new(None),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn devices(&self) -> Vec<DeviceSummary> {
        let cached = self.cache().clone();
        if let Some(devices) = cached {
            return devices;
        }
        match self.backend.list_devices().await {
            Ok(devices) => {
                *self.cache() = Some(devices.clone());
                devices
            }
            Err(err) => {
                tracing::warn!(error = %err, "device list fetch failed");
                Vec::new()
            }
        }
    }

    pub fn invalidate(&self) {
        *self.cache() = None;
    }

    fn cache(&self) -> MutexGuard<'_, Option<Vec<DeviceSummary>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
