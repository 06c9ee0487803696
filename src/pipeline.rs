//! Pipeline entry points.
//!
//! Decompose -> plan batches -> {execute -> reduce -> advance} until terminal -> finalize.
//! Every run gets its own run id and, when a sink is configured, its own progress runtime.

use crate::config::StrataConfig;
use crate::error::PipelineError;
use crate::hierarchy::{Unit, UnitOutline};
use crate::plan::{decompose, plan_batches, plan_hierarchy, HierarchyPlanRequest};
use crate::processor::{UnitPlanner, UnitProcessor};
use crate::scheduler::{
    finalize, reduce, BatchExecutor, BatchStateMachine, CompletionSummary, ExecutionScope,
    ExecutionStats, FinalizedPlan, PipelineState, Transition,
};
use crate::telemetry::{ProgressRuntime, ProgressSink};
use crate::types::new_run_id;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

pub struct Pipeline {
    config: StrataConfig,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Pipeline {
    /// Build a pipeline from validated configuration.
    pub fn new(config: StrataConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config: config.validated()?,
            sink: None,
        })
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// Run the scheduler over an already planned hierarchy.
    ///
    /// `units[i]` is addressed as `module_id = i` and its `sub_units[j]` as `sub_id = j`.
    pub async fn run<P: UnitProcessor + ?Sized>(
        &self,
        topic: &str,
        units: &[Unit],
        processor: &P,
    ) -> FinalizedPlan {
        let run_id = new_run_id();
        let progress = self.start_progress(&run_id);
        let span = info_span!("pipeline_run", run_id = %run_id);
        let plan = self
            .execute(&run_id, progress.clone(), topic, units, processor)
            .instrument(span)
            .await;
        close_progress(progress).await;
        plan
    }

    /// Plan every outline's sub-units under the module cap, then run the scheduler.
    pub async fn plan_and_run<L, P>(
        &self,
        topic: &str,
        outlines: &[UnitOutline],
        planner: &L,
        processor: &P,
    ) -> FinalizedPlan
    where
        L: UnitPlanner + ?Sized,
        P: UnitProcessor + ?Sized,
    {
        let run_id = new_run_id();
        let progress = self.start_progress(&run_id);
        let span = info_span!("pipeline_run", run_id = %run_id);
        let plan = async {
            let scheduler = &self.config.scheduler;
            let units = plan_hierarchy(
                planner,
                HierarchyPlanRequest {
                    topic,
                    language: &scheduler.language,
                    outlines,
                    module_concurrency: scheduler.module_concurrency,
                    desired_sub_unit_count: scheduler.desired_sub_unit_count,
                },
                progress.as_deref(),
            )
            .await;
            self.execute(&run_id, progress.clone(), topic, &units, processor)
                .await
        }
        .instrument(span)
        .await;
        close_progress(progress).await;
        plan
    }

    fn start_progress(&self, run_id: &str) -> Option<Arc<ProgressRuntime>> {
        self.sink
            .as_ref()
            .map(|sink| Arc::new(ProgressRuntime::start(run_id, sink.clone())))
    }

    async fn execute<P: UnitProcessor + ?Sized>(
        &self,
        run_id: &str,
        progress: Option<Arc<ProgressRuntime>>,
        topic: &str,
        units: &[Unit],
        processor: &P,
    ) -> FinalizedPlan {
        let started = Instant::now();
        let scheduler = &self.config.scheduler;
        warn_on_inconsistent_ids(units);

        let items = decompose(units);
        if items.is_empty() {
            info!(units = units.len(), "no sub-units to process");
            let stats = ExecutionStats::empty(run_id, units.len());
            return finish(
                progress.as_deref(),
                topic,
                units,
                &PipelineState::default(),
                scheduler.summary_chars,
                stats,
            );
        }

        let batch_size = scheduler.effective_batch_size();
        let plan = match plan_batches(items, batch_size) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "batch planning failed");
                emit(
                    progress.as_deref(),
                    "finalization_failed",
                    format!("Error planning batches: {err}"),
                    json!({ "error": err.to_string() }),
                );
                return FinalizedPlan {
                    topic: topic.to_string(),
                    units: Vec::new(),
                    error: Some(err.to_string()),
                    stats: ExecutionStats::empty(run_id, units.len()),
                };
            }
        };

        let fingerprint = plan.fingerprint();
        info!(
            plan_fingerprint = %fingerprint,
            total_items = plan.total_items(),
            total_batches = plan.len(),
            batch_size,
            "batches planned"
        );
        emit(
            progress.as_deref(),
            "batches_planned",
            format!(
                "Organized {} sub-units into {} batches of up to {}",
                plan.total_items(),
                plan.len(),
                batch_size
            ),
            json!({
                "plan_fingerprint": fingerprint,
                "total_items": plan.total_items(),
                "total_batches": plan.len(),
                "batch_size": batch_size,
                "submodule_concurrency": scheduler.submodule_concurrency,
            }),
        );

        let mut state = PipelineState::new(plan);
        let executor = BatchExecutor::from_config(scheduler).with_progress(progress.clone());
        let scope = ExecutionScope {
            topic,
            language: &scheduler.language,
            units,
        };
        let mut machine = BatchStateMachine::new();
        let mut completion: Option<CompletionSummary> = None;

        while !machine.is_terminal() {
            let batch_index = state.current_index();
            let Some(batch) = state.current_batch().cloned() else {
                warn!(batch_index, "state machine ran past the batch plan");
                break;
            };
            let execution = executor
                .execute(processor, scope, batch_index, &batch, &state)
                .await;
            let summary = reduce(&mut state, units, execution);
            emit(
                progress.as_deref(),
                "batch_completed",
                format!(
                    "Completed batch {}: {} succeeded, {} failed",
                    batch_index + 1,
                    summary.succeeded,
                    summary.failed
                ),
                json!(summary),
            );

            match machine.advance(&mut state) {
                Transition::Continue(p) => emit(
                    progress.as_deref(),
                    "batch_progress",
                    format!(
                        "Progress: {}% ({}/{} sub-units processed)",
                        p.percentage, p.processed_count, p.total_count
                    ),
                    json!(p),
                ),
                Transition::Finished(summary) => {
                    emit(
                        progress.as_deref(),
                        "all_batches_processed",
                        format!(
                            "All {} batches processed: {} completed, {} failed",
                            summary.total_batches, summary.completed, summary.failed
                        ),
                        json!(summary),
                    );
                    completion = Some(summary);
                }
            }
        }

        let stats = ExecutionStats {
            run_id: run_id.to_string(),
            plan_fingerprint: fingerprint,
            total_units: units.len(),
            total_items: state.total_count(),
            total_batches: state.plan().len(),
            batch_size,
            completed: state.completed_count(),
            failed: state.failed_count(),
            skipped_invalid: state
                .batch_summaries()
                .iter()
                .map(|b| b.skipped_invalid)
                .sum(),
            duration: completion.and_then(|c| c.duration),
            batches: state.batch_summaries().to_vec(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        finish(
            progress.as_deref(),
            topic,
            units,
            &state,
            scheduler.summary_chars,
            stats,
        )
    }
}

fn finish(
    progress: Option<&ProgressRuntime>,
    topic: &str,
    units: &[Unit],
    state: &PipelineState,
    summary_chars: usize,
    stats: ExecutionStats,
) -> FinalizedPlan {
    let plan = finalize(topic, units, state.results(), summary_chars, stats);
    match &plan.error {
        None => emit(
            progress,
            "finalized",
            format!(
                "Finalized {} units with {} sub-units",
                plan.units.len(),
                plan.units.iter().map(|u| u.sub_units.len()).sum::<usize>()
            ),
            json!({
                "units": plan.units.len(),
                "completed": plan.stats.completed,
                "failed": plan.stats.failed,
            }),
        ),
        Some(err) => emit(
            progress,
            "finalization_failed",
            format!("Error finalizing plan: {err}"),
            json!({ "error": err }),
        ),
    }
    plan
}

fn warn_on_inconsistent_ids(units: &[Unit]) {
    for (module_id, unit) in units.iter().enumerate() {
        if unit.module_id != module_id {
            warn!(
                position = module_id,
                module_id = unit.module_id,
                "unit id differs from its position; position is used"
            );
        }
        for (sub_id, sub_unit) in unit.sub_units.iter().enumerate() {
            if sub_unit.module_id != module_id || sub_unit.sub_id != sub_id {
                warn!(
                    module_id,
                    sub_id,
                    recorded = %sub_unit.key(),
                    "sub-unit id differs from its position; position is used"
                );
            }
        }
    }
}

fn emit(
    progress: Option<&ProgressRuntime>,
    event_type: &str,
    message: String,
    data: serde_json::Value,
) {
    if let Some(progress) = progress {
        progress.emit_event_best_effort(event_type, message, data);
    }
}

async fn close_progress(progress: Option<Arc<ProgressRuntime>>) {
    if let Some(progress) = progress {
        let delivered = progress.close().await;
        info!(run_id = %progress.run_id(), delivered, "progress runtime closed");
    }
}
