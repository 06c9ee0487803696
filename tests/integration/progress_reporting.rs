//! Progress events: ordering, content, and sink failure tolerance.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use strata::config::StrataConfig;
use strata::processor::{ProcessorOutput, UnitContext, UnitPayload, UnitProcessor};
use strata::telemetry::{MemorySink, ProgressEvent, ProgressSink};
use strata::Pipeline;

use crate::integration::test_utils::{hierarchy, outlines, ScriptedPlanner, ScriptedProcessor};

fn pipeline_with(sink: Arc<MemorySink>, batch_size: usize) -> Pipeline {
    let mut config = StrataConfig::default();
    config.scheduler.batch_size = Some(batch_size);
    Pipeline::new(config).unwrap().with_progress_sink(sink)
}

#[tokio::test]
async fn run_reports_batches_in_order_with_sequence_numbers() {
    let sink = Arc::new(MemorySink::new());
    let units = hierarchy(&[3, 1]);
    let processor = ScriptedProcessor::new().failing_on([(0, 2)]);

    pipeline_with(sink.clone(), 2)
        .run("Rust", &units, &processor)
        .await;

    let events = sink.events();
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));
    assert_eq!(events[0].seq, 1);
    let run_id = &events[0].run_id;
    assert!(events.iter().all(|e| &e.run_id == run_id));

    let milestones: Vec<_> = sink
        .event_types()
        .into_iter()
        .filter(|t| !t.starts_with("unit_"))
        .collect();
    assert_eq!(
        milestones,
        vec![
            "batches_planned",
            "batch_started",
            "batch_completed",
            "batch_progress",
            "batch_started",
            "batch_completed",
            "all_batches_processed",
            "finalized",
        ]
    );

    let failed = events
        .iter()
        .find(|e| e.event_type == "unit_failed")
        .unwrap();
    assert_eq!(failed.data["module_id"], 0);
    assert_eq!(failed.data["sub_id"], 2);

    let progress = events
        .iter()
        .find(|e| e.event_type == "batch_progress")
        .unwrap();
    assert_eq!(progress.data["percentage"], 50);
    assert_eq!(progress.data["processed_count"], 2);
    assert_eq!(progress.data["total_count"], 4);

    let summary = events
        .iter()
        .find(|e| e.event_type == "all_batches_processed")
        .unwrap();
    assert_eq!(summary.data["completed"], 3);
    assert_eq!(summary.data["failed"], 1);
}

#[tokio::test]
async fn planning_events_precede_batch_events() {
    let sink = Arc::new(MemorySink::new());
    let planner = ScriptedPlanner::with_counts(&[2, 1]).failing_on([2]);

    pipeline_with(sink.clone(), 2)
        .plan_and_run("Rust", &outlines(3), &planner, &ScriptedProcessor::new())
        .await;

    let types = sink.event_types();
    assert_eq!(types.first().map(String::as_str), Some("planning_started"));
    let planning_done = types.iter().position(|t| t == "planning_completed").unwrap();
    let batches_planned = types.iter().position(|t| t == "batches_planned").unwrap();
    assert!(planning_done < batches_planned);
    assert_eq!(types.iter().filter(|t| *t == "unit_planned").count(), 2);
    assert_eq!(
        types.iter().filter(|t| *t == "unit_planning_failed").count(),
        1
    );
    assert_eq!(types.last().map(String::as_str), Some("finalized"));
}

#[tokio::test]
async fn failing_sink_never_changes_the_outcome() {
    let seen = Arc::new(Mutex::new(0usize));
    let counter = seen.clone();
    let sink = move |event: &ProgressEvent| -> anyhow::Result<()> {
        *counter.lock() += 1;
        if event.seq % 2 == 0 {
            panic!("sink crashed");
        }
        anyhow::bail!("sink unavailable")
    };
    let units = hierarchy(&[2, 2]);
    let mut config = StrataConfig::default();
    config.scheduler.batch_size = Some(2);
    let pipeline = Pipeline::new(config).unwrap().with_progress_sink(Arc::new(sink));

    let plan = pipeline
        .run("Rust", &units, &ScriptedProcessor::new())
        .await;

    assert!(plan.error.is_none());
    assert_eq!(plan.stats.completed, 4);
    assert!(*seen.lock() > 0);
}

/// Sleeps in several short steps, so a stalled worker thread eats into its timeout.
struct SteppedProcessor;

#[async_trait]
impl UnitProcessor for SteppedProcessor {
    async fn process(&self, ctx: UnitContext<'_>) -> anyhow::Result<ProcessorOutput> {
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(ProcessorOutput::new(UnitPayload::from_content(ctx.key().to_string())))
    }
}

/// Blocks the calling thread on every event before recording it.
struct BlockingSink {
    inner: MemorySink,
    delay: Duration,
}

impl ProgressSink for BlockingSink {
    fn report(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        self.inner.report(event)
    }
}

#[tokio::test]
async fn blocking_sink_does_not_consume_unit_timeouts() {
    let units = hierarchy(&[2, 2]);
    let mut config = StrataConfig::default();
    config.scheduler.batch_size = Some(4);
    config.scheduler.submodule_concurrency = 4;
    config.scheduler.unit_timeout_secs = Some(1);
    let sink = Arc::new(BlockingSink {
        inner: MemorySink::new(),
        delay: Duration::from_millis(400),
    });
    let pipeline = Pipeline::new(config).unwrap().with_progress_sink(sink.clone());

    let plan = pipeline.run("Rust", &units, &SteppedProcessor).await;

    assert!(plan.error.is_none());
    assert_eq!(plan.stats.completed, 4);
    assert_eq!(plan.stats.failed, 0);
    assert_eq!(plan.unit(1).map(|u| u.sub_units.len()), Some(2));

    let messages = sink.inner.messages();
    assert_eq!(
        messages.last().map(String::as_str),
        Some("Finalized 2 units with 4 sub-units")
    );
}

#[tokio::test]
async fn no_sink_means_no_reporting() {
    let units = hierarchy(&[1]);
    let pipeline = Pipeline::new(StrataConfig::default()).unwrap();
    let plan = pipeline
        .run("Rust", &units, &ScriptedProcessor::new())
        .await;
    assert_eq!(plan.stats.completed, 1);
}
