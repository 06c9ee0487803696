//! Batch scheduler
//!
//! Runs a [`BatchPlan`](crate::plan::BatchPlan) batch by batch: the executor fans one batch out
//! under the sub-unit cap, the reducer folds the outcomes into [`PipelineState`], and the state
//! machine decides whether another batch follows. The finalizer turns the reduced state back
//! into the two-level hierarchy.

pub mod executor;
pub mod finalize;
pub mod machine;
pub mod reducer;
pub mod state;
pub mod stats;

pub use executor::{BatchExecution, BatchExecutor, ExecutionScope, OutcomeStatus, UnitOutcome};
pub use finalize::{finalize, FinalizedPlan, FinalizedUnit, SubUnitResult};
pub use machine::{BatchPhase, BatchProgress, BatchStateMachine, CompletionSummary, Transition};
pub use reducer::reduce;
pub use state::{CollectedResult, PipelineState, ProcessingRecord, RecordStatus};
pub use stats::{BatchSummary, DurationStats, ExecutionStats};
