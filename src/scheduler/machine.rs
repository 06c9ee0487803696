//! Batch-continuation state machine.
//!
//! Two states: `ProcessingBatch` (initial) and `AllBatchesProcessed` (terminal). After every
//! executor + reducer cycle the driving loop calls [`BatchStateMachine::advance`], which moves
//! the batch cursor forward and decides whether another batch follows.

use crate::scheduler::state::PipelineState;
use crate::scheduler::stats::DurationStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// Batches remain to be run
    ProcessingBatch,
    /// Every planned batch has been run and reduced
    AllBatchesProcessed,
}

impl BatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AllBatchesProcessed)
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessingBatch => write!(f, "processing_batch"),
            Self::AllBatchesProcessed => write!(f, "all_batches_processed"),
        }
    }
}

/// Progress reported while batches remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub batches_done: usize,
    pub total_batches: usize,
    /// Keys of the batches already run that hold a record.
    pub processed_count: usize,
    pub total_count: usize,
    /// Share of batches run, 0..=100.
    pub percentage: u32,
}

/// Summary reported once on reaching the terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub total_batches: usize,
    pub total_count: usize,
    pub completed: usize,
    pub failed: usize,
    /// Over completed items; `None` when nothing completed.
    pub duration: Option<DurationStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Continue(BatchProgress),
    Finished(CompletionSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStateMachine {
    phase: BatchPhase,
}

impl Default for BatchStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStateMachine {
    pub fn new() -> Self {
        Self {
            phase: BatchPhase::ProcessingBatch,
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Record that the current batch has been run, then decide what comes next.
    ///
    /// Once terminal, further calls leave the cursor alone and repeat the summary.
    pub fn advance(&mut self, state: &mut PipelineState) -> Transition {
        if !self.phase.is_terminal() {
            state.advance();
        }

        let total_batches = state.plan().len();
        if state.current_index() >= total_batches {
            self.phase = BatchPhase::AllBatchesProcessed;
            let summary = completion_summary(state);
            info!(
                total_batches,
                completed = summary.completed,
                failed = summary.failed,
                min_ms = summary.duration.map(|d| d.min_ms),
                avg_ms = summary.duration.map(|d| d.avg_ms),
                max_ms = summary.duration.map(|d| d.max_ms),
                "all batches processed"
            );
            return Transition::Finished(summary);
        }

        let batches_done = state.current_index();
        let progress = BatchProgress {
            batches_done,
            total_batches,
            processed_count: state.processed_count(),
            total_count: state.total_count(),
            percentage: ((batches_done * 100) / total_batches).min(100) as u32,
        };
        info!(
            batches_done,
            total_batches,
            processed = progress.processed_count,
            total = progress.total_count,
            percentage = progress.percentage,
            "batch progress"
        );
        Transition::Continue(progress)
    }
}

fn completion_summary(state: &PipelineState) -> CompletionSummary {
    let completed_durations = state
        .records()
        .values()
        .filter(|record| record.is_completed())
        .map(|record| record.elapsed_ms);
    CompletionSummary {
        total_batches: state.plan().len(),
        total_count: state.total_count(),
        completed: state.completed_count(),
        failed: state.failed_count(),
        duration: DurationStats::from_samples(completed_durations),
    }
}
