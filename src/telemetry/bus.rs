//! In-process event bus for progress events.

use serde_json::Value;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};

use crate::telemetry::events::ProgressEnvelope;

/// Sending half of the progress channel. Sends never block.
#[derive(Clone)]
pub struct ProgressBus {
    sender: UnboundedSender<ProgressEnvelope>,
}

impl ProgressBus {
    pub fn new_pair() -> (Self, UnboundedReceiver<ProgressEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(
        &self,
        run_id: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Result<(), SendError<ProgressEnvelope>> {
        let envelope = ProgressEnvelope::with_now(run_id, event_type, message, data);
        self.sender.send(envelope)
    }
}
