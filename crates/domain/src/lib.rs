//! # lens-domain
//!
//! Pure domain model for the Factory-Lens rule-chain editor.
//!
//! ## Responsibilities
//! - Foundational types: numeric identifiers, error conventions, timestamps
//! - Define **Device summaries** (the device list the editor offers)
//! - Define **Device schemas** (topics a device reports, commands it accepts)
//! - Define **Actions** and their persisted `chain` (IF → THEN → EVALUATE)
//! - Drive the **chain builder**: the per-slot state machine behind the
//!   action form, its serializer, and a pure view description
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod device;
pub mod editor;
pub mod schema;
