// src/transaction/mod.rs

//! Logical transactions shared between cooperating tasks.

pub mod registry;

pub use registry::{Transaction, TransactionRegistry};

/// Identifier of a logical transaction as sent by the server.
pub type TransId = String;
