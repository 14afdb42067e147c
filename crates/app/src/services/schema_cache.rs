//! Schema cache: per-device schemas memoized for one editing session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lens_domain::id::DeviceId;
use lens_domain::schema::DeviceSchema;

use crate::ports::ActionsBackend;

/// Session-scoped memo of device schemas.
///
/// A failed fetch is cached as an empty schema so a broken device is not
/// refetched on every interaction; [`SchemaCache::retry`] forces a refetch.
pub struct SchemaCache<B> {
    backend: B,
    entries: Mutex<HashMap<DeviceId, Arc<DeviceSchema>>>,
}

impl<B: ActionsBackend> SchemaCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached schema of `device`, fetching it on first use.
    ///
    /// Never fails: an unreachable or broken device yields an empty schema.
    #[tracing::instrument(skip(self), fields(device = %device))]
    pub async fn get_schema(&self, device: DeviceId) -> Arc<DeviceSchema> {
        if let Some(hit) = self.cached(device) {
            return hit;
        }
        let fetched = match self.backend.device_schema(device).await {
            Ok(schema) => schema,
            Err(err) => {
                tracing::warn!(error = %err, "schema fetch failed, using an empty schema");
                DeviceSchema::default()
            }
        };
        Arc::clone(self.entries().entry(device).or_insert_with(|| Arc::new(fetched)))
    }

    #[must_use]
    pub fn cached(&self, device: DeviceId) -> Option<Arc<DeviceSchema>> {
        self.entries().get(&device).cloned()
    }

    /// Forget `device` so the next lookup refetches it.
    pub fn invalidate(&self, device: DeviceId) {
        self.entries().remove(&device);
    }

    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    /// Drop the cached entry of `device` and fetch it again.
    pub async fn retry(&self, device: DeviceId) -> Arc<DeviceSchema> {
        self.invalidate(device);
        self.get_schema(device).await
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DeviceId, Arc<DeviceSchema>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
