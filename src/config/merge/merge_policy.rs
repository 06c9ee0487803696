//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; unset keys fall back to these defaults.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("scheduler.module_concurrency", 2)?
        .set_default("scheduler.submodule_concurrency", 2)?
        .set_default("scheduler.unit_timeout_secs", 300)?
        .set_default("scheduler.language", "en")?
        .set_default("scheduler.summary_chars", 200)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")
}
