//! Configuration loading feeding a pipeline.

use std::fs;
use strata::config::{ConfigLoader, StrataConfig};
use strata::Pipeline;
use tempfile::TempDir;

use crate::integration::test_utils::{hierarchy, with_env, ScriptedProcessor};

#[tokio::test]
async fn workspace_config_drives_batching() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[scheduler]\nsubmodule_concurrency = 1\nbatch_size = 3\n",
    )
    .unwrap();

    let config = with_env(&[("STRATA_ENV", "integration-none")], || {
        ConfigLoader::load(temp_dir.path())
    })
    .unwrap();
    let processor = ScriptedProcessor::new();
    let plan = Pipeline::new(config)
        .unwrap()
        .run("Rust", &hierarchy(&[2, 2, 2]), &processor)
        .await;

    assert_eq!(plan.stats.batch_size, 3);
    assert_eq!(plan.stats.total_batches, 2);
    assert_eq!(processor.max_in_flight(), 1);
}

#[test]
fn invalid_file_values_are_rejected_by_the_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("strata.toml");
    fs::write(&path, "[scheduler]\nmodule_concurrency = 0\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let err = Pipeline::new(config).err().unwrap();
    assert!(err.to_string().contains("module_concurrency"));
}

#[test]
fn environment_overrides_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_env(&[("STRATA__SCHEDULER__UNIT_TIMEOUT_SECS", "12")], || {
        ConfigLoader::load(temp_dir.path())
    })
    .unwrap();
    assert_eq!(config.scheduler.unit_timeout_secs, Some(12));
}

#[test]
fn defaults_are_valid() {
    assert!(Pipeline::new(StrataConfig::default()).is_ok());
}
