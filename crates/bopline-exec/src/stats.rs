//! Per-operator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters owned by one running operator. Atomic so sinks and monitors can
/// touch them without locking.
#[derive(Debug, Default)]
pub struct BopStats {
    chunks_in: AtomicU64,
    units_in: AtomicU64,
    chunks_out: AtomicU64,
    units_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub chunks_in: u64,
    pub units_in: u64,
    pub chunks_out: u64,
    pub units_out: u64,
}

impl BopStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk_in(&self, units: usize) {
        self.chunks_in.fetch_add(1, Ordering::Relaxed);
        self.units_in.fetch_add(units as u64, Ordering::Relaxed);
    }

    pub fn add_chunk_out(&self, units: usize) {
        self.chunks_out.fetch_add(1, Ordering::Relaxed);
        self.units_out.fetch_add(units as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            units_in: self.units_in.load(Ordering::Relaxed),
            chunks_out: self.chunks_out.load(Ordering::Relaxed),
            units_out: self.units_out.load(Ordering::Relaxed),
        }
    }
}
