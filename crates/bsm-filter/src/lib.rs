//! Privacy filtering for Basic Safety Messages.
//!
//! The hot path is a single-pass streaming pipeline: an event-based JSON
//! reader ([`events`]) drives the [`handler::BsmHandler`], which captures the
//! handful of fields the privacy filters need, evaluates each filter the
//! moment its inputs are complete, and reconstructs the canonical JSON for
//! messages that survive. Messages that fail a filter are cut off at the
//! offending token and reported with a latched suppression reason.
//!
//! Around that sit the small pieces the handler composes: the reusable
//! [`bsm::Bsm`] record, the velocity filter and id redactor ([`filters`]),
//! and an out-of-pipeline structural redactor over materialized JSON
//! ([`redaction`]).

pub mod bsm;
pub mod events;
pub mod filters;
pub mod handler;
pub mod redaction;

use std::collections::HashMap;

/// Flat configuration: raw `key = value` pairs from the properties file.
pub type ConfigMap = HashMap<String, String>;

pub use bsm::Bsm;
pub use filters::{IdRedactor, VelocityFilter};
pub use handler::{BsmHandler, Geofence, ResultStatus};
