//! Failures, panics and timeouts stay with the item that caused them.

use std::time::Duration;
use strata::config::StrataConfig;
use strata::hierarchy::{lookup, Unit};
use strata::plan::{decompose, plan_batches};
use strata::processor::UnitPayload;
use strata::scheduler::{
    finalize, reduce, BatchExecutor, CollectedResult, ExecutionScope, ExecutionStats,
    PipelineState, RecordStatus,
};
use strata::types::UnitKey;
use strata::Pipeline;

use crate::integration::test_utils::{hierarchy, ScriptedProcessor};

fn pipeline(batch_size: usize) -> Pipeline {
    let mut config = StrataConfig::default();
    config.scheduler.batch_size = Some(batch_size);
    config.scheduler.submodule_concurrency = batch_size;
    Pipeline::new(config).unwrap()
}

#[tokio::test]
async fn failed_items_are_counted_but_excluded_from_content() {
    let units = hierarchy(&[3, 2]);
    let processor = ScriptedProcessor::new().failing_on([(0, 1), (1, 0)]);

    let plan = pipeline(2).run("Rust", &units, &processor).await;

    assert!(plan.error.is_none());
    assert_eq!(plan.stats.completed, 3);
    assert_eq!(plan.stats.failed, 2);
    let unit0: Vec<_> = plan.units[0].sub_units.iter().map(|s| s.id).collect();
    assert_eq!(unit0, vec![0, 2]);
    let unit1: Vec<_> = plan.units[1].sub_units.iter().map(|s| s.id).collect();
    assert_eq!(unit1, vec![1]);
}

#[tokio::test]
async fn unit_whose_sub_units_all_fail_is_kept_empty() {
    let units = hierarchy(&[2, 1]);
    let processor = ScriptedProcessor::new().failing_on([(1, 0)]);

    let plan = pipeline(3).run("Rust", &units, &processor).await;

    assert_eq!(plan.units.len(), 2);
    assert_eq!(plan.units[1].title, "unit1");
    assert!(plan.units[1].sub_units.is_empty());
}

#[tokio::test]
async fn panicking_processor_only_fails_its_item() {
    let units = hierarchy(&[2, 2]);
    let processor = ScriptedProcessor::new().panicking_on([(1, 1)]);

    let plan = pipeline(4).run("Rust", &units, &processor).await;

    assert_eq!(plan.stats.completed, 3);
    assert_eq!(plan.stats.failed, 1);
    assert_eq!(plan.units[1].sub_units.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_processor_times_out_and_the_run_finishes() {
    let units = hierarchy(&[2, 2]);
    let mut config = StrataConfig::default();
    config.scheduler.batch_size = Some(2);
    config.scheduler.unit_timeout_secs = Some(30);
    let pipeline = Pipeline::new(config).unwrap();
    let processor = ScriptedProcessor::new().hanging_on([(0, 0)]);

    let plan = pipeline.run("Rust", &units, &processor).await;

    assert_eq!(plan.stats.total_batches, 2);
    assert_eq!(plan.stats.completed, 3);
    assert_eq!(plan.stats.failed, 1);
    let ids: Vec<_> = plan.units[0].sub_units.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn error_records_carry_the_failure_message() {
    let units = hierarchy(&[2]);
    let mut state = PipelineState::new(plan_batches(decompose(&units), 2).unwrap());
    let processor = ScriptedProcessor::new()
        .failing_on([(0, 0)])
        .hanging_on([(0, 1)]);
    let executor = BatchExecutor::new(2).with_unit_timeout(Some(Duration::from_secs(2)));
    let scope = ExecutionScope {
        topic: "Rust",
        language: "en",
        units: &units,
    };

    let batch = state.plan().batches[0].clone();
    let execution = executor.execute(&processor, scope, 0, &batch, &state).await;
    reduce(&mut state, &units, execution);

    let failed = state.record(UnitKey::new(0, 0)).unwrap();
    assert_eq!(failed.status, RecordStatus::Error);
    assert_eq!(
        failed.error.as_deref(),
        Some("Processing failed for 0.0: development failed for 0.0")
    );
    let timed_out = state.record(UnitKey::new(0, 1)).unwrap();
    assert_eq!(
        timed_out.error.as_deref(),
        Some("Processing timed out for 0.1 after 2000ms")
    );
    assert!(state.results().is_empty());
}

#[tokio::test]
async fn malformed_batch_entries_are_skipped_and_counted() {
    let units = hierarchy(&[1]);
    let state = PipelineState::default();
    let processor = ScriptedProcessor::new();
    let scope = ExecutionScope {
        topic: "Rust",
        language: "en",
        units: &units,
    };
    let batch = vec![UnitKey::new(0, 0), UnitKey::new(3, 3)];
    assert!(lookup(&units, UnitKey::new(3, 3)).is_none());

    let execution = BatchExecutor::new(2)
        .execute(&processor, scope, 0, &batch, &state)
        .await;

    assert_eq!(execution.launched(), 1);
    assert_eq!(execution.skipped_invalid, vec![UnitKey::new(3, 3)]);
}

#[test]
fn finalization_failure_yields_well_formed_output() {
    let units: Vec<Unit> = hierarchy(&[1]);
    // A result for a unit the finalized hierarchy does not have.
    let results = vec![CollectedResult {
        key: UnitKey::new(1, 0),
        title: "stray".into(),
        description: String::new(),
        order: 1,
        payload: UnitPayload::from_content("x"),
    }];

    let plan = finalize("Rust", &units, &results, 200, ExecutionStats::empty("run-x", 1));

    assert_eq!(plan.topic, "Rust");
    assert!(plan.units.is_empty());
    assert!(plan.error.is_some());
    let value = serde_json::to_value(&plan).unwrap();
    assert!(value["error"].is_string());
}
