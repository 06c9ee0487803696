//! Workspace config files.
//!
//! A workspace carries `config/config.toml` plus an optional per-environment overlay selected by
//! `STRATA_ENV` (default `development`). Both files use the `[scheduler]` and `[logging]` tables
//! of [`StrataConfig`](crate::config::StrataConfig); unknown tables are ignored.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_SELECTOR: &str = "STRATA_ENV";
const DEFAULT_ENV: &str = "development";

/// The workspace files that exist, base first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFiles {
    pub environment: String,
    pub base: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

impl WorkspaceFiles {
    pub fn discover(workspace_root: &Path) -> Self {
        let environment =
            std::env::var(ENV_SELECTOR).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = workspace_root.join("config");
        let existing = |path: PathBuf| path.is_file().then_some(path);
        Self {
            base: existing(config_dir.join("config.toml")),
            overlay: existing(config_dir.join(format!("{environment}.toml"))),
            environment,
        }
    }

    fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.base.iter().chain(self.overlay.iter())
    }
}

/// Layer the workspace base file, then the environment overlay, onto `builder`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let files = WorkspaceFiles::discover(workspace_root);
    debug!(
        environment = %files.environment,
        base = ?files.base,
        overlay = ?files.overlay,
        "workspace config files"
    );
    Ok(add_files(builder, &files))
}

fn add_files(
    builder: ConfigBuilder<DefaultState>,
    files: &WorkspaceFiles,
) -> ConfigBuilder<DefaultState> {
    files.paths().fold(builder, |builder, path| {
        builder.add_source(File::from(path.as_path()).format(FileFormat::Toml))
    })
}
