//! Memory-pressure collaborator interface.
//!
//! Writers report their estimated RAM use while indexing; the collaborator
//! answers with a directive. The engine honours `FlushAndReduce` by
//! committing and reloading the reader, which releases the writer arena.

use std::sync::atomic::{AtomicU64, Ordering};

/// What the collaborator wants the writer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureDirective {
    Continue,
    FlushAndReduce,
}

/// Receives RAM estimates from index writers.
///
/// Implementations must be cheap: the report runs on the indexing path.
pub trait MemoryPressure: Send + Sync {
    fn report(&self, estimated_bytes: u64) -> PressureDirective;
}

/// Default collaborator: flush once the estimate crosses a fixed threshold.
pub struct ThresholdPressure {
    limit_bytes: u64,
    reported: AtomicU64,
}

impl ThresholdPressure {
    #[must_use]
    pub fn new(limit_bytes: u64) -> Self {
        Self {
            limit_bytes,
            reported: AtomicU64::new(0),
        }
    }

    /// Last reported estimate (diagnostics).
    #[must_use]
    pub fn last_reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl MemoryPressure for ThresholdPressure {
    fn report(&self, estimated_bytes: u64) -> PressureDirective {
        self.reported.store(estimated_bytes, Ordering::Relaxed);
        if estimated_bytes >= self.limit_bytes {
            PressureDirective::FlushAndReduce
        } else {
            PressureDirective::Continue
        }
    }
}

/// Collaborator that never requests a flush (tests, CLI one-shots).
pub struct NoPressure;

impl MemoryPressure for NoPressure {
    fn report(&self, _estimated_bytes: u64) -> PressureDirective {
        PressureDirective::Continue
    }
}
