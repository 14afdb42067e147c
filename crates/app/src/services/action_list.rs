//! Action list: the table of stored actions.

use lens_domain::action::ActionSummary;
use lens_domain::error::BackendError;
use lens_domain::id::ActionId;

use crate::ports::{ActionsBackend, Notice, Notifier};

/// Rows of the actions table, kept in sync with the backend.
pub struct ActionList<B> {
    backend: B,
    rows: Vec<ActionSummary>,
}

impl<B: ActionsBackend> ActionList<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[ActionSummary] {
        &self.rows
    }

    /// Refetch the rows. A failed fetch leaves the table empty.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&mut self) -> &[ActionSummary] {
        self.rows = match self.backend.list_actions().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "action list fetch failed");
                Vec::new()
            }
        };
        &self.rows
    }

    /// Delete an action and reload the table.
    ///
    /// On failure the backend's message is shown and the rows are kept.
    ///
    /// # Errors
    ///
    /// Returns the [`BackendError`] reported by the backend.
    #[tracing::instrument(skip(self, notifier))]
    pub async fn delete(
        &mut self,
        id: ActionId,
        notifier: &impl Notifier,
    ) -> Result<(), BackendError> {
        if let Err(err) = self.backend.delete_action(id).await {
            tracing::warn!(error = %err, "deleting action failed");
            notifier.notify(Notice::danger(err.user_message()));
            return Err(err);
        }
        tracing::info!("action deleted");
        notifier.notify(Notice::success("Deleted"));
        self.reload().await;
        Ok(())
    }
}
