//! Bounded-concurrency executor: runs one batch through the unit processor.
//!
//! Every eligible item is launched at once and a semaphore keeps at most `concurrency` processor
//! calls in flight. Failures, timeouts and panics become per-item outcomes; `execute` itself
//! always returns once every launched item has settled.

use crate::config::SchedulerConfig;
use crate::error::{panic_message, PipelineError};
use crate::hierarchy::{lookup, Unit};
use crate::processor::{ProcessorOutput, UnitContext, UnitProcessor};
use crate::scheduler::state::PipelineState;
use crate::telemetry::ProgressRuntime;
use crate::types::UnitKey;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Run-wide inputs shared by every item of every batch.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionScope<'a> {
    pub topic: &'a str,
    pub language: &'a str,
    pub units: &'a [Unit],
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Completed(ProcessorOutput),
    Failed { message: String },
}

/// Result of one launched item.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub key: UnitKey,
    pub status: OutcomeStatus,
    /// Wall-clock time of the processor call, excluding the wait for a slot.
    pub elapsed_ms: u64,
}

impl UnitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Completed(_))
    }
}

/// Everything the executor observed for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchExecution {
    pub index: usize,
    /// The batch as planned.
    pub keys: Vec<UnitKey>,
    /// In completion order.
    pub outcomes: Vec<UnitOutcome>,
    pub skipped_completed: Vec<UnitKey>,
    pub skipped_invalid: Vec<UnitKey>,
    pub elapsed_ms: u64,
}

impl BatchExecution {
    pub fn launched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.launched() - self.succeeded()
    }
}

pub struct BatchExecutor {
    concurrency: usize,
    unit_timeout: Option<Duration>,
    progress: Option<Arc<ProgressRuntime>>,
}

impl BatchExecutor {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            unit_timeout: None,
            progress: None,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.submodule_concurrency).with_unit_timeout(config.unit_timeout())
    }

    pub fn with_unit_timeout(mut self, unit_timeout: Option<Duration>) -> Self {
        self.unit_timeout = unit_timeout;
        self
    }

    pub fn with_progress(mut self, progress: Option<Arc<ProgressRuntime>>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every entry of `batch` that is not already completed in `state`.
    ///
    /// Entries that do not resolve against `scope.units` are logged and skipped.
    pub async fn execute<P: UnitProcessor + ?Sized>(
        &self,
        processor: &P,
        scope: ExecutionScope<'_>,
        batch_index: usize,
        batch: &[UnitKey],
        state: &PipelineState,
    ) -> BatchExecution {
        let started = Instant::now();
        let mut skipped_completed = Vec::new();
        let mut skipped_invalid = Vec::new();
        let mut seen = HashSet::with_capacity(batch.len());
        let mut eligible = Vec::with_capacity(batch.len());

        for &key in batch {
            if !seen.insert(key) {
                warn!(batch_index, %key, "duplicate batch entry ignored");
                continue;
            }
            if state.is_completed(key) {
                debug!(batch_index, %key, "already completed; skipping");
                skipped_completed.push(key);
                continue;
            }
            match lookup(scope.units, key) {
                Some((unit, sub_unit)) => eligible.push((
                    key,
                    UnitContext {
                        topic: scope.topic,
                        language: scope.language,
                        unit,
                        sub_unit,
                        units: scope.units,
                    },
                )),
                None => {
                    warn!(batch_index, %key, "batch entry outside the hierarchy; skipping");
                    skipped_invalid.push(key);
                }
            }
        }

        info!(
            batch_index,
            batch_size = batch.len(),
            launching = eligible.len(),
            skipped_completed = skipped_completed.len(),
            concurrency = self.concurrency,
            "executing batch"
        );
        self.emit(
            "batch_started",
            format!(
                "Processing batch {} with {} sub-units",
                batch_index + 1,
                eligible.len()
            ),
            json!({
                "batch_index": batch_index,
                "batch_size": batch.len(),
                "launching": eligible.len(),
                "skipped_completed": skipped_completed.len(),
                "skipped_invalid": skipped_invalid.len(),
            }),
        );

        let semaphore = Semaphore::new(self.concurrency);
        let mut futures = FuturesUnordered::new();
        for (key, ctx) in eligible {
            let semaphore = &semaphore;
            futures.push(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return UnitOutcome {
                            key,
                            status: OutcomeStatus::Failed {
                                message: "concurrency limiter closed".to_string(),
                            },
                            elapsed_ms: 0,
                        }
                    }
                };
                self.emit(
                    "unit_started",
                    format!(
                        "Processing sub-unit {}/{} of unit {}: {}",
                        key.sub_id + 1,
                        ctx.parent_size(),
                        key.module_id + 1,
                        ctx.sub_unit.title
                    ),
                    json!({
                        "batch_index": batch_index,
                        "module_id": key.module_id,
                        "sub_id": key.sub_id,
                        "title": ctx.sub_unit.title,
                    }),
                );
                let call_started = Instant::now();
                let status = match self.call(processor, key, ctx).await {
                    Ok(output) => OutcomeStatus::Completed(output),
                    Err(err) => OutcomeStatus::Failed {
                        message: err.to_string(),
                    },
                };
                UnitOutcome {
                    key,
                    status,
                    elapsed_ms: call_started.elapsed().as_millis() as u64,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(futures.len());
        while let Some(outcome) = futures.next().await {
            self.report_outcome(batch_index, &outcome);
            outcomes.push(outcome);
        }

        BatchExecution {
            index: batch_index,
            keys: batch.to_vec(),
            outcomes,
            skipped_completed,
            skipped_invalid,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn call<P: UnitProcessor + ?Sized>(
        &self,
        processor: &P,
        key: UnitKey,
        ctx: UnitContext<'_>,
    ) -> Result<ProcessorOutput, PipelineError> {
        let guarded = AssertUnwindSafe(processor.process(ctx)).catch_unwind();
        let settled = match self.unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(settled) => settled,
                Err(_) => {
                    return Err(PipelineError::UnitTimedOut {
                        module_id: key.module_id,
                        sub_id: key.sub_id,
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => guarded.await,
        };
        match settled {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(PipelineError::ProcessorFailed {
                module_id: key.module_id,
                sub_id: key.sub_id,
                message: format!("{err:#}"),
            }),
            Err(payload) => Err(PipelineError::ProcessorPanicked {
                module_id: key.module_id,
                sub_id: key.sub_id,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    fn report_outcome(&self, batch_index: usize, outcome: &UnitOutcome) {
        let key = outcome.key;
        match &outcome.status {
            OutcomeStatus::Completed(output) => {
                debug!(
                    batch_index,
                    %key,
                    elapsed_ms = outcome.elapsed_ms,
                    content_chars = output.payload.content.chars().count(),
                    "sub-unit completed"
                );
                self.emit(
                    "unit_completed",
                    format!(
                        "Completed sub-unit {} of unit {} in {}ms",
                        key.sub_id + 1,
                        key.module_id + 1,
                        outcome.elapsed_ms
                    ),
                    json!({
                        "batch_index": batch_index,
                        "module_id": key.module_id,
                        "sub_id": key.sub_id,
                        "elapsed_ms": outcome.elapsed_ms,
                        "timings": output.timings,
                    }),
                );
            }
            OutcomeStatus::Failed { message } => {
                warn!(batch_index, %key, error = %message, "sub-unit failed");
                self.emit(
                    "unit_failed",
                    format!(
                        "Error processing sub-unit {} of unit {}: {}",
                        key.sub_id + 1,
                        key.module_id + 1,
                        message
                    ),
                    json!({
                        "batch_index": batch_index,
                        "module_id": key.module_id,
                        "sub_id": key.sub_id,
                        "elapsed_ms": outcome.elapsed_ms,
                        "error": message,
                    }),
                );
            }
        }
    }

    fn emit(&self, event_type: &str, message: String, data: Value) {
        if let Some(progress) = self.progress.as_ref() {
            progress.emit_event_best_effort(event_type, message, data);
        }
    }
}
