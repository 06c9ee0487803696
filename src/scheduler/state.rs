//! Pipeline state: the batch sequence, the cursor into it, and the per-item records.
//!
//! Owned by the driving loop. Read access is public; mutation goes through the reducer and the
//! state machine only.

use crate::plan::{Batch, BatchPlan};
use crate::processor::{ProcessorOutput, StageTimings, UnitPayload};
use crate::scheduler::stats::BatchSummary;
use crate::types::{SubId, UnitKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Error,
}

/// Outcome of processing one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub status: RecordStatus,
    #[serde(default)]
    pub payload: Option<UnitPayload>,
    #[serde(default)]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub timings: Option<StageTimings>,
}

impl ProcessingRecord {
    pub fn completed(output: ProcessorOutput, elapsed_ms: u64) -> Self {
        Self {
            status: RecordStatus::Completed,
            payload: Some(output.payload),
            error: None,
            elapsed_ms,
            timings: output.timings,
        }
    }

    pub fn failed(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: RecordStatus::Error,
            payload: None,
            error: Some(message.into()),
            elapsed_ms,
            timings: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RecordStatus::Completed
    }
}

/// A completed item copied out of the hierarchy, waiting for the finalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedResult {
    pub key: UnitKey,
    pub title: String,
    pub description: String,
    pub order: usize,
    pub payload: UnitPayload,
}

impl CollectedResult {
    pub fn sub_id(&self) -> SubId {
        self.key.sub_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    plan: BatchPlan,
    current_index: usize,
    records: BTreeMap<UnitKey, ProcessingRecord>,
    results: Vec<CollectedResult>,
    collected: HashSet<UnitKey>,
    batch_summaries: Vec<BatchSummary>,
}

impl PipelineState {
    pub fn new(plan: BatchPlan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    /// Index of the next batch to run; equals the number of batches already run.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_batch(&self) -> Option<&Batch> {
        self.plan.batches.get(self.current_index)
    }

    pub fn records(&self) -> &BTreeMap<UnitKey, ProcessingRecord> {
        &self.records
    }

    pub fn record(&self, key: UnitKey) -> Option<&ProcessingRecord> {
        self.records.get(&key)
    }

    pub fn is_completed(&self, key: UnitKey) -> bool {
        self.records.get(&key).is_some_and(ProcessingRecord::is_completed)
    }

    /// Completed items in the order they were reduced.
    pub fn results(&self) -> &[CollectedResult] {
        &self.results
    }

    pub fn batch_summaries(&self) -> &[BatchSummary] {
        &self.batch_summaries
    }

    pub fn completed_count(&self) -> usize {
        self.records.values().filter(|r| r.is_completed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.len() - self.completed_count()
    }

    /// Keys of already-run batches that hold a record of either status.
    pub fn processed_count(&self) -> usize {
        self.plan
            .batches
            .iter()
            .take(self.current_index)
            .flatten()
            .filter(|key| self.records.contains_key(key))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.plan.total_items()
    }

    pub(crate) fn advance(&mut self) {
        self.current_index += 1;
    }

    /// Write a record unless the key is already completed. Returns whether it was written.
    pub(crate) fn write_record(&mut self, key: UnitKey, record: ProcessingRecord) -> bool {
        if self.is_completed(key) {
            return false;
        }
        self.records.insert(key, record);
        true
    }

    /// Append a result once per key. Returns whether it was appended.
    pub(crate) fn collect(&mut self, result: CollectedResult) -> bool {
        if !self.collected.insert(result.key) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub(crate) fn push_summary(&mut self, summary: BatchSummary) {
        self.batch_summaries.push(summary);
    }
}
