//! Error types for the strata scheduler.

use crate::types::{ModuleId, SubId};
use thiserror::Error;

/// Errors raised by planning, scheduling and the ambient layers.
///
/// Per-item failures never escape the executor as `Err`; they are rendered with
/// `to_string()` into the item's processing record instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Planning failed for unit {module_id}: {message}")]
    PlanningFailed { module_id: ModuleId, message: String },

    #[error("Processing failed for {module_id}.{sub_id}: {message}")]
    ProcessorFailed {
        module_id: ModuleId,
        sub_id: SubId,
        message: String,
    },

    #[error("Processing timed out for {module_id}.{sub_id} after {timeout_ms}ms")]
    UnitTimedOut {
        module_id: ModuleId,
        sub_id: SubId,
        timeout_ms: u64,
    },

    #[error("Processor panicked for {module_id}.{sub_id}: {message}")]
    ProcessorPanicked {
        module_id: ModuleId,
        sub_id: SubId,
        message: String,
    },

    #[error("Finalization failed: {0}")]
    FinalizationFailed(String),

    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
