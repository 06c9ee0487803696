//! Balanced batch planner.
//!
//! Work items are ordered by `(relative_position, module_id)`: every parent's first sub-unit
//! comes before any parent's second one, so sub-units of a large parent are spread across the
//! whole sequence instead of clustering into one batch. The ordered sequence is then cut into
//! consecutive chunks of `batch_size`.

use crate::error::PipelineError;
use crate::plan::decompose::WorkItem;
use crate::types::UnitKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Keys processed together, in planned order.
pub type Batch = Vec<UnitKey>;

/// The full, ordered batch sequence for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn total_items(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// All keys in processing order.
    pub fn ordered_keys(&self) -> impl Iterator<Item = UnitKey> + '_ {
        self.batches.iter().flatten().copied()
    }

    /// Stable digest of the batch sequence; equal hierarchies and batch sizes share it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.batch_size as u64).to_le_bytes());
        for batch in &self.batches {
            hasher.update(&(batch.len() as u64).to_le_bytes());
            for key in batch {
                hasher.update(&(key.module_id as u64).to_le_bytes());
                hasher.update(&(key.sub_id as u64).to_le_bytes());
            }
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

fn distribution_order(a: &WorkItem, b: &WorkItem) -> Ordering {
    a.relative_position
        .total_cmp(&b.relative_position)
        .then(a.module_id.cmp(&b.module_id))
        .then(a.sub_id.cmp(&b.sub_id))
}

/// Order work items for balanced distribution and split them into batches of `batch_size`.
pub fn plan_batches(mut items: Vec<WorkItem>, batch_size: usize) -> Result<BatchPlan, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::InvalidPlan(
            "Batch size must be at least 1".to_string(),
        ));
    }

    items.sort_by(distribution_order);
    let batches = items
        .chunks(batch_size)
        .map(|chunk| chunk.iter().map(WorkItem::key).collect())
        .collect();

    Ok(BatchPlan {
        batch_size,
        batches,
    })
}
