//! Fixed-capacity slot pool for one class of GPU consumers.
//!
//! Built on a FIFO-fair `tokio::sync::Semaphore` so acquisition suspends
//! cooperatively when the pool is saturated, plus an active-id map for
//! utilization reporting and idempotent release.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;

/// Snapshot of one pool's occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total_slots: usize,
    pub available_slots: usize,
    pub utilization_pct: f64,
    pub total_processed: u64,
}

pub(crate) struct SlotPool {
    name: &'static str,
    max_slots: usize,
    semaphore: Semaphore,
    /// request_id -> acquisition timestamp.
    active: Mutex<HashMap<String, DateTime<Utc>>>,
    total_processed: AtomicU64,
}

impl SlotPool {
    pub(crate) fn new(name: &'static str, max_slots: usize) -> Self {
        Self {
            name,
            max_slots,
            semaphore: Semaphore::new(max_slots),
            active: Mutex::new(HashMap::new()),
            total_processed: AtomicU64::new(0),
        }
    }

    /// Suspend until a slot is free, then record `request_id` as active.
    ///
    /// Empty request ids fail fast with `false`, without waiting and
    /// without consuming a slot. A zero-slot pool never grants.
    pub(crate) async fn acquire(&self, request_id: &str) -> bool {
        if request_id.trim().is_empty() {
            tracing::warn!(pool = self.name, "rejected acquire with empty request id");
            return false;
        }
        if self.active.lock().contains_key(request_id) {
            tracing::warn!(
                pool = self.name,
                request_id,
                "rejected duplicate acquire for active request"
            );
            return false;
        }

        let Ok(permit) = self.semaphore.acquire().await else {
            return false;
        };
        permit.forget();

        let prev = self.active.lock().insert(request_id.to_string(), Utc::now());
        if prev.is_some() {
            // Lost a duplicate-acquire race; give the slot back.
            self.semaphore.add_permits(1);
            return false;
        }
        tracing::debug!(pool = self.name, request_id, "slot acquired");
        true
    }

    /// Free the slot held by `request_id` and wake the next waiter.
    /// Unknown or already-released ids are a no-op.
    pub(crate) fn release(&self, request_id: &str) {
        if self.active.lock().remove(request_id).is_none() {
            return;
        }
        self.semaphore.add_permits(1);
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = self.name, request_id, "slot released");
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let in_use = self.active.lock().len();
        let available = self.max_slots.saturating_sub(in_use);
        let utilization_pct = if self.max_slots == 0 {
            0.0
        } else {
            (self.max_slots - available) as f64 / self.max_slots as f64 * 100.0
        };
        PoolStatus {
            total_slots: self.max_slots,
            available_slots: available,
            utilization_pct,
            total_processed: self.total_processed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn active_ids(&self) -> Vec<String> {
        self.active.lock().keys().cloned().collect()
    }
}
