//! Integration tests for the strata batch scheduler

mod config_integration;
mod error_isolation;
mod planning;
mod progress_reporting;
