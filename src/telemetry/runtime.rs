//! Run-scoped progress runtime: owns the bus and the background ingestor task.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::telemetry::bus::ProgressBus;
use crate::telemetry::ingestor::EventIngestor;
use crate::telemetry::sinks::ProgressSink;

/// Fire-and-forget progress reporting for one pipeline run.
///
/// Emitting never blocks and never fails the caller; delivery happens on a background task.
pub struct ProgressRuntime {
    run_id: String,
    bus: Mutex<Option<ProgressBus>>,
    worker: Mutex<Option<JoinHandle<u64>>>,
}

impl ProgressRuntime {
    /// Start the ingestor task. Must be called from within a tokio runtime.
    pub fn start(run_id: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        let (bus, receiver) = ProgressBus::new_pair();
        let worker = tokio::spawn(EventIngestor::new(sink, receiver).run());
        Self {
            run_id: run_id.into(),
            bus: Mutex::new(Some(bus)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit_event_best_effort(
        &self,
        event_type: &str,
        message: impl Into<String>,
        data: Value,
    ) {
        let guard = self.bus.lock();
        let Some(bus) = guard.as_ref() else {
            debug!(event_type = %event_type, "progress runtime closed; dropping event");
            return;
        };
        if let Err(err) = bus.emit(self.run_id.clone(), event_type, message, data) {
            warn!(
                run_id = %self.run_id,
                event_type = %event_type,
                error = %err,
                "failed to emit progress event"
            );
        }
    }

    /// Stop accepting events and wait until everything already emitted was delivered.
    pub async fn close(&self) -> u64 {
        drop(self.bus.lock().take());
        let worker = self.worker.lock().take();
        match worker {
            Some(handle) => match handle.await {
                Ok(delivered) => delivered,
                Err(err) => {
                    warn!(run_id = %self.run_id, error = %err, "progress ingestor task failed");
                    0
                }
            },
            None => 0,
        }
    }
}
