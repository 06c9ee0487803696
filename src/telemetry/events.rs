//! Event schema for progress reporting.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event as delivered to a sink, sequenced per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ts: String,
    pub run_id: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub data: Value,
}

/// Event as placed on the bus, before sequencing.
#[derive(Debug, Clone)]
pub struct ProgressEnvelope {
    pub ts: String,
    pub run_id: String,
    pub event_type: String,
    pub message: String,
    pub data: Value,
}

impl ProgressEnvelope {
    pub fn with_now(
        run_id: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            run_id: run_id.into(),
            event_type: event_type.into(),
            message: message.into(),
            data,
        }
    }
}

impl ProgressEvent {
    pub fn from_envelope(envelope: ProgressEnvelope, seq: u64) -> Self {
        Self {
            ts: envelope.ts,
            run_id: envelope.run_id,
            seq,
            event_type: envelope.event_type,
            message: envelope.message,
            data: envelope.data,
        }
    }
}
