//! Collaborator interfaces
//!
//! The scheduler treats sub-unit planning and content development as black boxes. Integrators
//! implement [`UnitPlanner`] and [`UnitProcessor`] (typically on top of an LLM client and a
//! retrieval backend); the scheduler only sees the results or the errors they report.

use crate::hierarchy::{SubUnit, SubUnitDraft, Unit, UnitOutline};
use crate::types::{ModuleId, UnitKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Content produced for one sub-unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitPayload {
    pub content: String,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
}

impl UnitPayload {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Processor-internal stage timings, surfaced verbatim when the processor reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub query_ms: u64,
    pub retrieve_ms: u64,
    pub develop_ms: u64,
}

/// Successful processor result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorOutput {
    pub payload: UnitPayload,
    #[serde(default)]
    pub timings: Option<StageTimings>,
}

impl ProcessorOutput {
    pub fn new(payload: UnitPayload) -> Self {
        Self {
            payload,
            timings: None,
        }
    }

    pub fn with_timings(mut self, timings: StageTimings) -> Self {
        self.timings = Some(timings);
        self
    }
}

/// Everything a processor may read about the item it is developing.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    pub topic: &'a str,
    pub language: &'a str,
    pub unit: &'a Unit,
    pub sub_unit: &'a SubUnit,
    pub units: &'a [Unit],
}

impl UnitContext<'_> {
    pub fn key(&self) -> UnitKey {
        self.sub_unit.key()
    }

    /// Number of siblings (including this sub-unit) under the same parent.
    pub fn parent_size(&self) -> usize {
        self.unit.sub_units.len()
    }
}

/// Develops the content of a single sub-unit.
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    async fn process(&self, ctx: UnitContext<'_>) -> anyhow::Result<ProcessorOutput>;
}

/// Inputs handed to a planner for one top-level unit.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub topic: &'a str,
    pub language: &'a str,
    pub module_id: ModuleId,
    pub outline: &'a UnitOutline,
    /// Numbered rendering of every unit in the plan.
    pub plan_outline: &'a str,
    pub desired_sub_unit_count: Option<usize>,
}

/// Breaks one top-level unit into sub-unit drafts.
#[async_trait]
pub trait UnitPlanner: Send + Sync {
    async fn plan_sub_units(&self, ctx: PlanningContext<'_>) -> anyhow::Result<Vec<SubUnitDraft>>;
}
