//! Finalizer: regroups reduced results under their units.
//!
//! Results arrive interleaved across units (batches mix parents). They are grouped by
//! `module_id` and sorted by `sub_id`; every unit of the hierarchy appears in the output, with an
//! empty list when none of its sub-units survived.

use crate::error::{panic_message, PipelineError};
use crate::hierarchy::Unit;
use crate::scheduler::state::CollectedResult;
use crate::scheduler::stats::ExecutionStats;
use crate::types::{ModuleId, SubId, UnitKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubUnitResult {
    pub id: SubId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub order: usize,
    pub summary: String,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedUnit {
    pub id: ModuleId,
    pub title: String,
    pub description: String,
    pub sub_units: Vec<SubUnitResult>,
}

/// Final output of a run. Always well formed; `error` is set when assembly failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedPlan {
    pub topic: String,
    pub units: Vec<FinalizedUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: ExecutionStats,
}

impl FinalizedPlan {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn unit(&self, id: ModuleId) -> Option<&FinalizedUnit> {
        self.units.iter().find(|u| u.id == id)
    }
}

/// Assemble the output. Never fails: assembly errors and panics yield an empty unit list with
/// `error` set and the topic preserved.
pub fn finalize(
    topic: &str,
    units: &[Unit],
    results: &[CollectedResult],
    summary_chars: usize,
    stats: ExecutionStats,
) -> FinalizedPlan {
    let assembled = catch_unwind(AssertUnwindSafe(|| assemble(units, results, summary_chars)))
        .unwrap_or_else(|payload| {
            Err(PipelineError::FinalizationFailed(format!(
                "panic during assembly: {}",
                panic_message(payload.as_ref())
            )))
        });

    match assembled {
        Ok(finalized_units) => {
            info!(
                topic,
                units = finalized_units.len(),
                sub_units = results.len(),
                "finalized plan"
            );
            FinalizedPlan {
                topic: topic.to_string(),
                units: finalized_units,
                error: None,
                stats,
            }
        }
        Err(err) => {
            error!(topic, error = %err, "finalization failed; returning empty plan");
            FinalizedPlan {
                topic: topic.to_string(),
                units: Vec::new(),
                error: Some(err.to_string()),
                stats,
            }
        }
    }
}

fn assemble(
    units: &[Unit],
    results: &[CollectedResult],
    summary_chars: usize,
) -> Result<Vec<FinalizedUnit>, PipelineError> {
    let mut grouped: Vec<Vec<&CollectedResult>> = vec![Vec::new(); units.len()];
    let mut seen: HashSet<UnitKey> = HashSet::with_capacity(results.len());
    for result in results {
        if !seen.insert(result.key) {
            return Err(PipelineError::FinalizationFailed(format!(
                "duplicate result for {}",
                result.key
            )));
        }
        let group = grouped.get_mut(result.key.module_id).ok_or_else(|| {
            PipelineError::FinalizationFailed(format!(
                "result {} refers to unknown unit (hierarchy has {})",
                result.key,
                units.len()
            ))
        })?;
        group.push(result);
    }

    Ok(units
        .iter()
        .zip(grouped)
        .enumerate()
        .map(|(module_id, (unit, mut group))| {
            group.sort_by_key(|r| r.sub_id());
            FinalizedUnit {
                id: module_id,
                title: unit.title.clone(),
                description: unit.description.clone(),
                sub_units: group
                    .into_iter()
                    .map(|r| SubUnitResult {
                        id: r.sub_id(),
                        title: r.title.clone(),
                        description: r.description.clone(),
                        content: r.payload.content.clone(),
                        order: r.order,
                        summary: summarize(&r.payload.content, summary_chars),
                        search_queries: r.payload.search_queries.clone(),
                        sources: r.payload.sources.clone(),
                    })
                    .collect(),
            }
        })
        .collect())
}

/// First `max_chars` characters of `content`, trimmed, with `...` when cut short.
pub(crate) fn summarize(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", content[..cut].trim()),
        None => content.trim().to_string(),
    }
}
