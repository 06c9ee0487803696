//! Strata: Hierarchical Bounded-Concurrency Batch Scheduling
//!
//! Develops a two-level content plan (units, each owning ordered sub-units) by flattening the
//! hierarchy into balanced batches, running each batch through an external processor under a
//! concurrency cap, reducing the outcomes into keyed state, and regrouping the results under
//! their units.

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod processor;
pub mod scheduler;
pub mod telemetry;
pub mod types;

pub use config::{ConfigLoader, SchedulerConfig, StrataConfig};
pub use error::PipelineError;
pub use hierarchy::{SubUnit, SubUnitDraft, Unit, UnitOutline};
pub use pipeline::Pipeline;
pub use processor::{
    PlanningContext, ProcessorOutput, StageTimings, UnitContext, UnitPayload, UnitPlanner,
    UnitProcessor,
};
pub use scheduler::{ExecutionStats, FinalizedPlan, FinalizedUnit, SubUnitResult};
pub use types::UnitKey;
