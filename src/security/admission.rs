//! Per-key admission limiter for mirrored traffic.
//!
//! Weights only ever grow: the limiter enforces a lifetime quota per key for
//! as long as its handler lives, not a live concurrency cap. Nothing is
//! released when a mirrored request completes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("max connections reached for '{key}': {max_weight}")]
pub struct LimitExceeded {
    pub key: String,
    pub max_weight: u64,
}

#[derive(Debug, Default)]
struct Weights {
    per_key: HashMap<String, u64>,
    total: u64,
}

/// Cumulative weight cap per key.
#[derive(Debug)]
pub struct AdmissionLimiter {
    max_weight: u64,
    weights: Mutex<Weights>,
}

impl AdmissionLimiter {
    /// `max_weight == 0` admits everything.
    pub fn new(max_weight: u64) -> Self {
        Self {
            max_weight,
            weights: Mutex::new(Weights::default()),
        }
    }

    /// Admit `weight` for `key`, or refuse without touching any state.
    ///
    /// The ceiling is compared against the weight recorded *before* this
    /// call, so a key one unit below the maximum is admitted and may end up
    /// above it.
    pub fn acquire(&self, key: &str, weight: u64) -> Result<(), LimitExceeded> {
        let mut weights = self.lock();

        let current = weights.per_key.get(key).copied().unwrap_or(0);
        if self.max_weight > 0 && current >= self.max_weight {
            return Err(LimitExceeded {
                key: key.to_string(),
                max_weight: self.max_weight,
            });
        }

        let entry = weights.per_key.entry(key.to_string()).or_insert(0);
        *entry = entry.saturating_add(weight);
        weights.total = weights.total.saturating_add(weight);
        Ok(())
    }

    /// Weight recorded for `key` so far.
    pub fn weight(&self, key: &str) -> u64 {
        self.lock().per_key.get(key).copied().unwrap_or(0)
    }

    /// Weight admitted across all keys.
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    pub fn max_weight(&self) -> u64 {
        self.max_weight
    }

    fn lock(&self) -> MutexGuard<'_, Weights> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.weights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
