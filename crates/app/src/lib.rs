//! # lens-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ActionsBackend`: the REST endpoints the editor depends on
//!   - `Notifier`: sink for transient notifications
//! - Define **use-case services**:
//!   - `SchemaCache`: session-scoped per-device schema memo
//!   - `DeviceDirectory`: device list for the selects
//!   - `EditorSession` / `ActionEditor`: drive the chain builder, load and save actions
//!   - `ActionList`: the actions table, reload and delete
//! - Provide **in-process infrastructure** (`NoticeBoard`) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `lens-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod notice;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
