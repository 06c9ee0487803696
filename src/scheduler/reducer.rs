//! Result reducer: folds one batch's outcomes into the pipeline state.
//!
//! Writes are keyed by `(module_id, sub_id)`, so the result does not depend on the order in
//! which outcomes completed.

use crate::hierarchy::{lookup, Unit};
use crate::scheduler::executor::{BatchExecution, OutcomeStatus};
use crate::scheduler::state::{CollectedResult, PipelineState, ProcessingRecord};
use crate::scheduler::stats::BatchSummary;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Merge `execution` into `state` and return the batch summary that was recorded.
///
/// Outcomes for keys outside the executed batch are dropped. Every completed entry of the batch
/// is collected once, including entries completed by an earlier run over the same state.
pub fn reduce(state: &mut PipelineState, units: &[Unit], execution: BatchExecution) -> BatchSummary {
    let batch_keys: HashSet<_> = execution.keys.iter().copied().collect();
    let mut succeeded = 0;
    let mut failed = 0;

    for outcome in execution.outcomes {
        if !batch_keys.contains(&outcome.key) {
            warn!(
                batch_index = execution.index,
                key = %outcome.key,
                "outcome for a key outside the batch dropped"
            );
            continue;
        }
        let record = match outcome.status {
            OutcomeStatus::Completed(output) => {
                succeeded += 1;
                ProcessingRecord::completed(output, outcome.elapsed_ms)
            }
            OutcomeStatus::Failed { message } => {
                failed += 1;
                ProcessingRecord::failed(message, outcome.elapsed_ms)
            }
        };
        if !state.write_record(outcome.key, record) {
            debug!(key = %outcome.key, "record already completed; keeping the first result");
        }
    }

    for &key in &execution.keys {
        let Some(payload) = state
            .record(key)
            .filter(|record| record.is_completed())
            .and_then(|record| record.payload.clone())
        else {
            continue;
        };
        let Some((_, sub_unit)) = lookup(units, key) else {
            warn!(%key, "completed key no longer resolves against the hierarchy");
            continue;
        };
        state.collect(CollectedResult {
            key,
            title: sub_unit.title.clone(),
            description: sub_unit.description.clone(),
            order: sub_unit.order,
            payload,
        });
    }

    let summary = BatchSummary {
        index: execution.index,
        size: execution.keys.len(),
        launched: succeeded + failed,
        skipped_completed: execution.skipped_completed.len(),
        skipped_invalid: execution.skipped_invalid.len(),
        succeeded,
        failed,
        elapsed_ms: execution.elapsed_ms,
    };
    state.push_summary(summary.clone());
    summary
}
