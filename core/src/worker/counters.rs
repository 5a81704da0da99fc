//! Shared invocation counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic invocation counters shared by every worker of a run
///
/// Slot 0 is the aggregate across workers, slots `1..=workers` belong to one
/// worker each. Counters only ever go up.
#[derive(Debug)]
pub struct Counters {
    slots: Box<[AtomicU64]>,
}

impl Counters {
    /// Create counters for `workers` workers
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..=workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Number of per-worker slots
    pub fn workers(&self) -> usize {
        self.slots.len() - 1
    }

    /// Count one accepted invocation for `worker_id`
    ///
    /// The worker's own slot is bumped before the aggregate, so a concurrent
    /// reader never sees an aggregate ahead of the per-worker sum.
    pub fn record(&self, worker_id: usize) {
        debug_assert!(worker_id >= 1 && worker_id <= self.workers());
        if let Some(slot) = self.slots.get(worker_id).filter(|_| worker_id > 0) {
            slot.fetch_add(1, Ordering::SeqCst);
            self.slots[0].fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Aggregate count across all workers
    pub fn total(&self) -> u64 {
        self.slots[0].load(Ordering::SeqCst)
    }

    /// Count for one worker; 0 for ids outside `1..=workers`
    pub fn by_worker(&self, worker_id: usize) -> u64 {
        if worker_id == 0 {
            return 0;
        }
        self.slots
            .get(worker_id)
            .map(|slot| slot.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Per-worker counts, indexed from worker 1
    pub fn per_worker(&self) -> Vec<u64> {
        self.slots[1..]
            .iter()
            .map(|slot| slot.load(Ordering::SeqCst))
            .collect()
    }
}
