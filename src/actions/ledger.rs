// src/actions/ledger.rs

//! Enable/disable state and recency ordering for a task's actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::actions::codes::{ActionCode, MAX_ACTION};

/// Process-wide, monotonically increasing enable counter.
///
/// Every ledger created by the same engine shares one counter, so stamps are
/// comparable across tasks.
#[derive(Debug, Clone, Default)]
pub struct ActionCounter(Arc<AtomicU64>);

impl ActionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    enabled: bool,
    act_count: u64,
}

/// Fixed-size table indexed by action code.
///
/// The ledger is pure bookkeeping: it reports which codes changed and the
/// caller forwards those changes to the presentation layer.
#[derive(Debug, Clone)]
pub struct ActionLedger {
    slots: Vec<Slot>,
    counter: ActionCounter,
}

impl ActionLedger {
    pub fn new(counter: ActionCounter) -> Self {
        Self {
            slots: vec![Slot::default(); MAX_ACTION],
            counter,
        }
    }

    fn slot(&self, code: ActionCode) -> Option<&Slot> {
        self.slots.get(code as usize)
    }

    pub fn is_enabled(&self, code: ActionCode) -> bool {
        self.slot(code).is_some_and(|s| s.enabled)
    }

    /// Counter value stamped the last time `code` was enabled (0 if never).
    pub fn act_count(&self, code: ActionCode) -> u64 {
        self.slot(code).map_or(0, |s| s.act_count)
    }

    /// Set the state of `code`.
    ///
    /// Returns `true` when the stored state changed, i.e. when the caller must
    /// notify the presentation layer. Enabling always refreshes the recency
    /// stamp, even when the code was already enabled.
    pub fn enable(&mut self, code: ActionCode, on: bool) -> bool {
        let counter = &self.counter;
        let Some(slot) = self.slots.get_mut(code as usize) else {
            trace!(code, "action code out of range; ignoring");
            return false;
        };

        let changed = slot.enabled != on;
        slot.enabled = on;
        if on {
            slot.act_count = counter.next();
        }
        changed
    }

    /// Apply [`enable`](Self::enable) to each code.
    ///
    /// With `only_if_changed`, codes already at the target state are skipped
    /// entirely (their recency stamp is left alone). Returns the codes whose
    /// state changed, in input order.
    pub fn enable_list(
        &mut self,
        codes: &[ActionCode],
        on: bool,
        only_if_changed: bool,
    ) -> Vec<ActionCode> {
        let mut changed = Vec::new();
        for &code in codes {
            if only_if_changed && self.is_enabled(code) == on {
                continue;
            }
            if self.enable(code, on) {
                changed.push(code);
            }
        }
        changed
    }

    /// Among `candidates`, the enabled code with the highest recency stamp.
    pub fn most_recently_enabled(&self, candidates: &[ActionCode]) -> Option<ActionCode> {
        candidates
            .iter()
            .copied()
            .filter(|&c| self.is_enabled(c))
            .max_by_key(|&c| self.act_count(c))
    }
}
