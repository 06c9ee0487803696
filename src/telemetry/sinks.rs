//! Progress sinks: where sequenced events end up.

use parking_lot::Mutex;
use tracing::info;

use crate::telemetry::events::ProgressEvent;

/// Receiver of progress events. Failures are logged and otherwise ignored.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Writes each event's message to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        info!(
            run_id = %event.run_id,
            seq = event.seq,
            event_type = %event.event_type,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Keeps every event in memory; useful for embedding callers and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.message.clone()).collect()
    }
}

impl ProgressSink for MemorySink {
    fn report(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
