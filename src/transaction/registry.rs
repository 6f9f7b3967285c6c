// src/transaction/registry.rs

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::task::TaskId;
use crate::transaction::TransId;
use crate::types::TransLevel;

/// A logical unit of commit/rollback.
///
/// Shared by every task that references its id, but only mutated on behalf
/// of its single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransId,
    pub owner: Option<TaskId>,
    pub level: TransLevel,
    pub after_retry_reason: Option<String>,
}

impl Transaction {
    fn new(id: TransId) -> Self {
        Self {
            id,
            owner: None,
            level: TransLevel::None,
            after_retry_reason: None,
        }
    }
}

/// Lookup and creation of transactions by id.
///
/// Tasks hold the id; the registry holds the single shared record.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    transactions: BTreeMap<TransId, Transaction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the transaction with `id`, creating a non-owned one on first
    /// reference.
    pub fn resolve_or_create(&mut self, id: &str) -> &mut Transaction {
        self.transactions.entry(id.to_string()).or_insert_with(|| {
            debug!(trans = %id, "created transaction on first reference");
            Transaction::new(id.to_string())
        })
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn owner_of(&self, id: &str) -> Option<TaskId> {
        self.transactions.get(id).and_then(|t| t.owner)
    }

    pub fn level_of(&self, id: &str) -> TransLevel {
        self.transactions
            .get(id)
            .map_or(TransLevel::None, |t| t.level)
    }

    pub fn is_owned_by(&self, id: &str, task: TaskId) -> bool {
        self.owner_of(id) == Some(task)
    }

    /// Hand ownership of `id` to `task`. Returns the previous owner.
    pub fn transfer_ownership(&mut self, id: &str, task: TaskId) -> Option<TaskId> {
        let trans = self.resolve_or_create(id);
        let previous = trans.owner.replace(task);
        debug!(trans = %id, ?previous, new_owner = ?task, "transferred transaction ownership");
        previous
    }

    pub fn set_level(&mut self, id: &str, level: TransLevel) {
        self.resolve_or_create(id).level = level;
    }

    pub fn set_after_retry_reason(&mut self, id: &str, reason: Option<String>) {
        self.resolve_or_create(id).after_retry_reason = reason;
    }

    /// The owner releases the transaction; the record is destroyed.
    ///
    /// Returns `false` (and keeps the record) when `task` is not the owner.
    pub fn clear(&mut self, id: &str, task: TaskId) -> bool {
        if !self.is_owned_by(id, task) {
            warn!(trans = %id, ?task, "non-owner attempted to clear transaction");
            return false;
        }
        self.transactions.remove(id);
        debug!(trans = %id, "transaction cleared by owner");
        true
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
