//! Top-level planning stage feeding the scheduler.

use strata::config::StrataConfig;
use strata::plan::{plan_hierarchy, HierarchyPlanRequest};
use strata::Pipeline;

use crate::integration::test_utils::{outlines, ScriptedPlanner, ScriptedProcessor};

#[tokio::test]
async fn planner_failure_keeps_an_empty_unit() {
    let planner = ScriptedPlanner::with_counts(&[3, 2, 2]).failing_on([1]);
    let pipeline = Pipeline::new(StrataConfig::default()).unwrap();

    let plan = pipeline
        .plan_and_run("Rust", &outlines(3), &planner, &ScriptedProcessor::new())
        .await;

    assert!(plan.error.is_none());
    let sizes: Vec<_> = plan.units.iter().map(|u| u.sub_units.len()).collect();
    assert_eq!(sizes, vec![3, 0, 2]);
    assert_eq!(plan.units[1].title, "unit1");
    assert_eq!(plan.stats.total_items, 5);
}

#[tokio::test]
async fn module_cap_bounds_planning_calls() {
    let planner = ScriptedPlanner::with_counts(&[1; 6]);
    let outlines = outlines(6);

    let units = plan_hierarchy(
        &planner,
        HierarchyPlanRequest {
            topic: "Rust",
            language: "en",
            outlines: &outlines,
            module_concurrency: 2,
            desired_sub_unit_count: None,
        },
        None,
    )
    .await;

    assert_eq!(units.len(), 6);
    assert!(planner.max_in_flight() <= 2);
    assert!(units.iter().enumerate().all(|(i, u)| u.module_id == i));
}

#[tokio::test]
async fn desired_count_trims_every_unit() {
    let planner = ScriptedPlanner::with_counts(&[5, 4, 1]);
    let mut config = StrataConfig::default();
    config.scheduler.desired_sub_unit_count = Some(2);
    let pipeline = Pipeline::new(config).unwrap();

    let plan = pipeline
        .plan_and_run("Rust", &outlines(3), &planner, &ScriptedProcessor::new())
        .await;

    let sizes: Vec<_> = plan.units.iter().map(|u| u.sub_units.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[tokio::test]
async fn every_planner_failing_finalizes_empty_units() {
    let planner = ScriptedPlanner::with_counts(&[2, 2]).failing_on([0, 1]);
    let pipeline = Pipeline::new(StrataConfig::default()).unwrap();

    let plan = pipeline
        .plan_and_run("Rust", &outlines(2), &planner, &ScriptedProcessor::new())
        .await;

    assert!(plan.error.is_none());
    assert_eq!(plan.units.len(), 2);
    assert!(plan.units.iter().all(|u| u.sub_units.is_empty()));
    assert_eq!(plan.stats.total_batches, 0);
}
