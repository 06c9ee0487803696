//! Configuration System
//!
//! Typed configuration for the scheduler and logging, loaded from layered sources (defaults,
//! user file, workspace files, environment) and validated before a pipeline is built.

use crate::error::PipelineError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::environment::ENV_PREFIX;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler settings.
///
/// The two concurrency caps apply to different phases: every top-level unit finishes planning
/// before the first batch is launched, so at most `max(module_concurrency,
/// submodule_concurrency)` collaborator calls are in flight at any moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How many top-level units are planned at once.
    #[serde(default = "default_concurrency")]
    pub module_concurrency: usize,

    /// How many sub-units of one batch are processed at once.
    #[serde(default = "default_concurrency")]
    pub submodule_concurrency: usize,

    /// Items per batch; defaults to `submodule_concurrency`.
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Per-item processor timeout. `None` or `0` waits indefinitely.
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: Option<u64>,

    /// Forwarded to the planner; longer plans are trimmed to this many sub-units.
    #[serde(default)]
    pub desired_sub_unit_count: Option<usize>,

    /// Output language forwarded to collaborators.
    #[serde(default = "default_language")]
    pub language: String,

    /// Characters of content kept in each finalized sub-unit summary.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

fn default_concurrency() -> usize {
    2
}

fn default_unit_timeout_secs() -> Option<u64> {
    Some(300)
}

fn default_language() -> String {
    "en".to_string()
}

fn default_summary_chars() -> usize {
    200
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            module_concurrency: default_concurrency(),
            submodule_concurrency: default_concurrency(),
            batch_size: None,
            unit_timeout_secs: default_unit_timeout_secs(),
            desired_sub_unit_count: None,
            language: default_language(),
            summary_chars: default_summary_chars(),
        }
    }
}

impl SchedulerConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(self.submodule_concurrency)
    }

    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    /// Validate scheduler configuration
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.module_concurrency == 0 {
            errors.push(ValidationError::Scheduler(
                "module_concurrency must be at least 1".to_string(),
            ));
        }
        if self.submodule_concurrency == 0 {
            errors.push(ValidationError::Scheduler(
                "submodule_concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            errors.push(ValidationError::Scheduler(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.desired_sub_unit_count == Some(0) {
            errors.push(ValidationError::Scheduler(
                "desired_sub_unit_count must be at least 1".to_string(),
            ));
        }
        if self.language.trim().is_empty() {
            errors.push(ValidationError::Scheduler(
                "language cannot be empty".to_string(),
            ));
        }
        errors
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Scheduler(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Scheduler(msg) => write!(f, "Scheduler: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StrataConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.scheduler.validate();

        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Logging(format!(
                "format must be 'json' or 'text', got '{}'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "output must be 'stdout', 'stderr' or 'file', got '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into a single error.
    pub fn validated(self) -> Result<Self, PipelineError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
