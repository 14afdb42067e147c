//! In-memory notice board backing the [`Notifier`] port.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::TimeDelta;
use lens_domain::time::Timestamp;

use crate::ports::{Notice, Notifier};

/// How long a notice stays visible, in milliseconds.
pub const NOTICE_LIFETIME_MS: i64 = 2500;

/// Collects notices and answers which ones are still on screen.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices raised less than [`NOTICE_LIFETIME_MS`] before `at`.
    #[must_use]
    pub fn visible_at(&self, at: Timestamp) -> Vec<Notice> {
        let lifetime = TimeDelta::milliseconds(NOTICE_LIFETIME_MS);
        self.notices()
            .iter()
            .filter(|notice| notice.raised_at <= at && at - notice.raised_at < lifetime)
            .cloned()
            .collect()
    }

    /// Drop notices that expired before `at`.
    pub fn prune(&self, at: Timestamp) {
        let lifetime = TimeDelta::milliseconds(NOTICE_LIFETIME_MS);
        self.notices()
            .retain(|notice| at - notice.raised_at < lifetime);
    }

    #[must_use]
    pub fn latest(&self) -> Option<Notice> {
        self.notices().last().cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Notice> {
        self.notices().clone()
    }

    fn notices(&self) -> MutexGuard<'_, Vec<Notice>> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for NoticeBoard {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice raised");
        self.notices().push(notice);
    }
}
