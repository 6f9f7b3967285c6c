// src/actions/mod.rs

//! Per-task action enablement.
//!
//! - [`codes`] holds the fixed universe of action codes and the predefined
//!   groups the lifecycle toggles as a unit.
//! - [`ledger`] holds the per-task enable/disable table and its recency stamps.

pub mod codes;
pub mod ledger;

pub use codes::{ActionCode, ActionGroup, MAX_ACTION};
pub use ledger::{ActionCounter, ActionLedger};
