//! Top-level planning stage: asks the planner for every unit's sub-units under the module cap.
//!
//! One unit's planning failure never aborts the run; that unit is kept with no sub-units.

use crate::error::{panic_message, PipelineError};
use crate::hierarchy::{render_outline, SubUnitDraft, Unit, UnitOutline};
use crate::processor::{PlanningContext, UnitPlanner};
use crate::telemetry::ProgressRuntime;
use crate::types::ModuleId;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Inputs for [`plan_hierarchy`].
#[derive(Debug, Clone, Copy)]
pub struct HierarchyPlanRequest<'a> {
    pub topic: &'a str,
    pub language: &'a str,
    pub outlines: &'a [UnitOutline],
    pub module_concurrency: usize,
    pub desired_sub_unit_count: Option<usize>,
}

/// Plan every outline concurrently (at most `module_concurrency` at once).
///
/// The returned units are in outline order, with `module_id` equal to the outline index.
pub async fn plan_hierarchy<P: UnitPlanner + ?Sized>(
    planner: &P,
    request: HierarchyPlanRequest<'_>,
    progress: Option<&ProgressRuntime>,
) -> Vec<Unit> {
    let outlines = request.outlines;
    if outlines.is_empty() {
        warn!("no units to plan");
        return Vec::new();
    }

    let module_concurrency = request.module_concurrency.max(1);
    info!(
        unit_count = outlines.len(),
        module_concurrency, "planning sub-units"
    );
    emit(
        progress,
        "planning_started",
        format!(
            "Planning sub-units for {} units with parallelism of {}",
            outlines.len(),
            module_concurrency
        ),
        json!({
            "unit_count": outlines.len(),
            "module_concurrency": module_concurrency,
        }),
    );

    let plan_outline = render_outline(outlines);
    let semaphore = Semaphore::new(module_concurrency);
    let mut futures = FuturesUnordered::new();
    for (module_id, outline) in outlines.iter().enumerate() {
        let ctx = PlanningContext {
            topic: request.topic,
            language: request.language,
            module_id,
            outline,
            plan_outline: &plan_outline,
            desired_sub_unit_count: request.desired_sub_unit_count,
        };
        let semaphore = &semaphore;
        futures.push(async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => plan_one(planner, ctx).await,
                Err(_) => Err(PipelineError::PlanningFailed {
                    module_id,
                    message: "planning semaphore closed".to_string(),
                }),
            };
            (module_id, outcome)
        });
    }

    let mut planned: Vec<Option<Unit>> = vec![None; outlines.len()];
    while let Some((module_id, outcome)) = futures.next().await {
        let outline = &outlines[module_id];
        let unit = match outcome {
            Ok(drafts) => {
                let drafts = apply_desired_count(module_id, drafts, request.desired_sub_unit_count);
                let unit = Unit::from_drafts(module_id, outline, drafts);
                debug!(module_id, sub_unit_count = unit.sub_units.len(), "unit planned");
                emit(
                    progress,
                    "unit_planned",
                    format!(
                        "Planned {} sub-units for unit {}: {}",
                        unit.sub_units.len(),
                        module_id + 1,
                        outline.title
                    ),
                    json!({
                        "module_id": module_id,
                        "title": outline.title,
                        "sub_units": unit.sub_units.iter().map(|s| &s.title).collect::<Vec<_>>(),
                    }),
                );
                unit
            }
            Err(err) => {
                error!(module_id, error = %err, "planning failed; keeping unit without sub-units");
                emit(
                    progress,
                    "unit_planning_failed",
                    format!("Error planning sub-units for unit {}: {}", module_id + 1, err),
                    json!({
                        "module_id": module_id,
                        "title": outline.title,
                        "error": err.to_string(),
                    }),
                );
                Unit::empty(module_id, outline)
            }
        };
        planned[module_id] = Some(unit);
    }

    let units: Vec<Unit> = planned
        .into_iter()
        .enumerate()
        .map(|(module_id, unit)| unit.unwrap_or_else(|| Unit::empty(module_id, &outlines[module_id])))
        .collect();

    let total_sub_units: usize = units.iter().map(|u| u.sub_units.len()).sum();
    info!(
        unit_count = units.len(),
        total_sub_units, "planning completed"
    );
    emit(
        progress,
        "planning_completed",
        format!(
            "Planned {} sub-units across {} units",
            total_sub_units,
            units.len()
        ),
        json!({
            "unit_count": units.len(),
            "total_sub_units": total_sub_units,
        }),
    );
    units
}

async fn plan_one<P: UnitPlanner + ?Sized>(
    planner: &P,
    ctx: PlanningContext<'_>,
) -> Result<Vec<SubUnitDraft>, PipelineError> {
    let module_id = ctx.module_id;
    match AssertUnwindSafe(planner.plan_sub_units(ctx))
        .catch_unwind()
        .await
    {
        Ok(Ok(drafts)) => Ok(drafts),
        Ok(Err(err)) => Err(PipelineError::PlanningFailed {
            module_id,
            message: format!("{err:#}"),
        }),
        Err(payload) => Err(PipelineError::PlanningFailed {
            module_id,
            message: format!("planner panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn apply_desired_count(
    module_id: ModuleId,
    mut drafts: Vec<SubUnitDraft>,
    desired: Option<usize>,
) -> Vec<SubUnitDraft> {
    let Some(desired) = desired else {
        return drafts;
    };
    if drafts.len() > desired {
        info!(
            module_id,
            planned = drafts.len(),
            desired,
            "trimming sub-units to requested count"
        );
        drafts.truncate(desired);
    } else if drafts.len() < desired {
        warn!(
            module_id,
            planned = drafts.len(),
            desired,
            "planner returned fewer sub-units than requested"
        );
    }
    drafts
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
