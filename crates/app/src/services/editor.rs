//! Action editor: drives the chain builder against the backend.

use std::sync::Arc;

use lens_domain::action::Action;
use lens_domain::editor::{ChainBuilder, Completion, Edit, Effect, EditorView, render};
use lens_domain::error::{BackendError, LensError};
use lens_domain::id::{ActionId, DeviceId};
use lens_domain::schema::DeviceSchema;

use crate::ports::{ActionsBackend, Notice, Notifier};
use crate::services::device_directory::DeviceDirectory;
use crate::services::schema_cache::SchemaCache;

/// Session-wide collaborators shared by every editor opened in it.
pub struct EditorSession<B> {
    backend: B,
    schemas: SchemaCache<B>,
    devices: DeviceDirectory<B>,
}

impl<B: ActionsBackend + Clone> EditorSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            schemas: SchemaCache::new(backend.clone()),
            devices: DeviceDirectory::new(backend.clone()),
            backend,
        }
    }
}

impl<B: ActionsBackend> EditorSession<B> {
    #[must_use]
    pub fn schemas(&self) -> &SchemaCache<B> {
        &self.schemas
    }

    #[must_use]
    pub fn devices(&self) -> &DeviceDirectory<B> {
        &self.devices
    }

    /// Perform the backend work an [`Effect`] asks for.
    pub async fn fulfil(&self, effect: Effect) -> Completion {
        match effect {
            Effect::LoadSchema { slot, device } => Completion::SchemaLoaded {
                slot,
                device,
                schema: self.schemas.get_schema(device).await,
            },
            Effect::FilterResultDevices { wanted } => {
                let mut schemas: Vec<(DeviceId, Arc<DeviceSchema>)> = Vec::new();
                for device in self.devices.devices().await.into_iter().filter(|d| d.enabled) {
                    schemas.push((device.id, self.schemas.get_schema(device.id).await));
                }
                Completion::result_devices(
                    wanted,
                    schemas.iter().map(|(id, schema)| (*id, schema.as_ref())),
                )
            }
        }
    }

    /// Open an empty form.
    pub async fn open_new(&self) -> ActionEditor<'_, B> {
        let builder = ChainBuilder::new(self.devices.devices().await);
        ActionEditor {
            session: self,
            builder,
        }
    }

    /// Fetch a stored action and rebuild the form from it.
    ///
    /// # Errors
    ///
    /// Returns the [`BackendError`] when the action cannot be fetched.
    #[tracing::instrument(skip(self))]
    pub async fn open_existing(&self, id: ActionId) -> Result<ActionEditor<'_, B>, BackendError> {
        let action = self.backend.get_action(id).await?;
        Ok(self.open_from(Some(id), &action).await)
    }

    /// Rebuild the form from an action that did not come from the backend.
    pub async fn open_from(&self, id: Option<ActionId>, action: &Action) -> ActionEditor<'_, B> {
        let devices = self.devices.devices().await;
        let builder = match id {
            Some(id) => ChainBuilder::editing(id, devices),
            None => ChainBuilder::new(devices),
        };
        let mut editor = ActionEditor {
            session: self,
            builder,
        };
        for edit in ChainBuilder::restore(action) {
            editor.edit(edit).await;
        }
        editor
    }
}

/// One open action form.
pub struct ActionEditor<'s, B> {
    session: &'s EditorSession<B>,
    builder: ChainBuilder,
}

impl<B: ActionsBackend> ActionEditor<'_, B> {
    #[must_use]
    pub fn builder(&self) -> &ChainBuilder {
        &self.builder
    }

    #[must_use]
    pub fn view(&self) -> EditorView {
        render(&self.builder)
    }

    /// Apply an edit and settle the backend work it triggers.
    pub async fn edit(&mut self, edit: Edit) {
        let effects = self.builder.apply(edit);
        for effect in effects {
            let completion = self.session.fulfil(effect).await;
            self.absorb(completion);
        }
    }

    /// Apply an edit without fulfilling its effects.
    ///
    /// The caller runs them through [`EditorSession::fulfil`] and feeds the
    /// answers to [`ActionEditor::absorb`], in any order.
    pub fn dispatch(&mut self, edit: Edit) -> Vec<Effect> {
        self.builder.apply(edit)
    }

    /// Returns `false` when the answer was stale and discarded.
    pub fn absorb(&mut self, completion: Completion) -> bool {
        let applied = self.builder.complete(completion);
        if !applied {
            tracing::debug!("discarded a stale backend answer");
        }
        applied
    }

    /// Serialize the form and persist it.
    ///
    /// Invalid forms are reported without any request. On a backend failure
    /// the form is left untouched so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::Form`] for invalid fields or
    /// [`LensError::Backend`] when the backend rejects the action or does
    /// not acknowledge a created one with its id.
    #[tracing::instrument(skip(self, notifier), fields(action_id = ?self.builder.id()))]
    pub async fn save(&mut self, notifier: &impl Notifier) -> Result<Action, LensError> {
        let checked = self
            .builder
            .to_action()
            .map_err(LensError::from)
            .and_then(|action| {
                action.validate()?;
                Ok(action)
            });
        let mut action = match checked {
            Ok(action) => action,
            Err(err) => {
                notifier.notify(Notice::danger(err.user_message()));
                return Err(err);
            }
        };

        let backend = &self.session.backend;
        let outcome = match self.builder.id() {
            Some(id) => backend.update_action(id, &action).await.map(|()| id),
            None => backend.create_action(&action).await,
        };
        match outcome {
            Ok(id) => {
                self.builder.set_id(id);
                action.id = Some(id);
                tracing::info!(name = %action.name, "action saved");
                notifier.notify(Notice::success("Saved"));
                Ok(action)
            }
            Err(err) => {
                tracing::warn!(error = %err, "saving action failed");
                notifier.notify(Notice::danger(err.user_message()));
                Err(err.into())
            }
        }
    }
}
