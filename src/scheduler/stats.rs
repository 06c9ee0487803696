//! Aggregate execution statistics reported alongside the finalized output.

use serde::{Deserialize, Serialize};

/// Per-item wall-clock duration summary over completed items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub min_ms: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

impl DurationStats {
    /// `None` when there are no samples.
    pub fn from_samples(samples: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut count = 0u64;
        let mut total = 0u128;
        let mut min_ms = u64::MAX;
        let mut max_ms = 0u64;
        for sample in samples {
            count += 1;
            total += u128::from(sample);
            min_ms = min_ms.min(sample);
            max_ms = max_ms.max(sample);
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            min_ms,
            avg_ms: total as f64 / count as f64,
            max_ms,
        })
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub index: usize,
    /// Entries in the batch as planned.
    pub size: usize,
    pub launched: usize,
    pub skipped_completed: usize,
    pub skipped_invalid: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Run-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub run_id: String,
    pub plan_fingerprint: String,
    pub total_units: usize,
    pub total_items: usize,
    pub total_batches: usize,
    pub batch_size: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped_invalid: usize,
    pub duration: Option<DurationStats>,
    pub batches: Vec<BatchSummary>,
    pub elapsed_ms: u64,
}

impl ExecutionStats {
    /// Stats for a run that never reached batch execution.
    pub fn empty(run_id: impl Into<String>, total_units: usize) -> Self {
        Self {
            run_id: run_id.into(),
            plan_fingerprint: String::new(),
            total_units,
            total_items: 0,
            total_batches: 0,
            batch_size: 0,
            completed: 0,
            failed: 0,
            skipped_invalid: 0,
            duration: None,
            batches: Vec::new(),
            elapsed_ms: 0,
        }
    }
}
