//! Service statistics and result history.
//!
//! Every `infer` call produces one [`CallRecord`]; the dispatcher applies it
//! to [`DispatchState`] under a single lock so counters and history always
//! move together.

use crate::result::DispatchResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Snapshot of process-lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Every `infer` call, including ones that returned an error.
    pub total_calls: u64,
    /// Calls that produced a successful result.
    pub successful_predictions: u64,
    /// Invocations per tier, skips excluded. Every registered tier is listed.
    pub tier_invocations: BTreeMap<String, u64>,
    pub validation_failures: u64,
    /// Tier invocations that returned a failure.
    pub tier_failures: u64,
    pub last_tier_used: Option<String>,
    pub history_len: usize,
}

impl ServiceStats {
    /// Invocation count for `tier` (zero if unknown).
    pub fn invocations(&self, tier: &str) -> u64 {
        self.tier_invocations.get(tier).copied().unwrap_or(0)
    }

    /// Successful predictions as a fraction of all calls.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.successful_predictions as f64 / self.total_calls as f64
        }
    }

    /// Whether every counter is zero and history is empty.
    pub fn is_zeroed(&self) -> bool {
        self.total_calls == 0
            && self.successful_predictions == 0
            && self.validation_failures == 0
            && self.tier_failures == 0
            && self.last_tier_used.is_none()
            && self.history_len == 0
            && self.tier_invocations.values().all(|n| *n == 0)
    }
}

/// In-memory result log, optionally bounded (oldest evicted first).
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<DispatchResult>,
    capacity: Option<usize>,
}

impl History {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, result: DispatchResult) {
        if self.capacity == Some(0) {
            return;
        }
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<DispatchResult> {
        self.entries.iter().cloned().collect()
    }
}

/// Everything one call changes, gathered lock-free and applied at once.
#[derive(Debug, Default)]
pub(crate) struct CallRecord {
    pub invoked: Vec<String>,
    pub tier_failures: u64,
    pub validation_failed: bool,
    pub result: Option<DispatchResult>,
}

/// Mutable dispatcher state guarded by the dispatcher's lock.
#[derive(Debug)]
pub(crate) struct DispatchState {
    stats: ServiceStats,
    history: History,
}

impl DispatchState {
    pub fn new<'a>(tier_names: impl IntoIterator<Item = &'a str>, capacity: Option<usize>) -> Self {
        let tier_invocations = tier_names
            .into_iter()
            .map(|name| (name.to_string(), 0))
            .collect();
        Self {
            stats: ServiceStats {
                tier_invocations,
                ..Default::default()
            },
            history: History::new(capacity),
        }
    }

    pub fn apply(&mut self, record: CallRecord) {
        let stats = &mut self.stats;
        stats.total_calls += 1;
        stats.tier_failures += record.tier_failures;
        if record.validation_failed {
            stats.validation_failures += 1;
        }
        for tier in record.invoked {
            *stats.tier_invocations.entry(tier).or_insert(0) += 1;
        }
        if let Some(result) = record.result {
            if result.success {
                stats.successful_predictions += 1;
                stats.last_tier_used = result.tier_used.clone();
            }
            self.history.push(result);
        }
        stats.history_len = self.history.len();
    }

    pub fn snapshot(&self) -> ServiceStats {
        self.stats.clone()
    }

    pub fn history(&self) -> Vec<DispatchResult> {
        self.history.snapshot()
    }

    pub fn reset(&mut self) {
        let tier_invocations = std::mem::take(&mut self.stats.tier_invocations)
            .into_keys()
            .map(|name| (name, 0))
            .collect();
        self.stats = ServiceStats {
            tier_invocations,
            ..Default::default()
        };
        self.history.clear();
    }
}
