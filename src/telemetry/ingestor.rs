//! Event ingestion: sequence assignment and delivery to the sink.
//!
//! Sinks are synchronous and may block, so each delivery runs on tokio's blocking pool. The
//! ingestor awaits it before taking the next event, which keeps delivery in sequence order while
//! leaving the runtime's worker threads to the scheduler.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::error::panic_message;
use crate::telemetry::events::{ProgressEnvelope, ProgressEvent};
use crate::telemetry::sinks::ProgressSink;

pub struct EventIngestor {
    sink: Arc<dyn ProgressSink>,
    receiver: UnboundedReceiver<ProgressEnvelope>,
    next_seq: u64,
}

impl EventIngestor {
    pub fn new(sink: Arc<dyn ProgressSink>, receiver: UnboundedReceiver<ProgressEnvelope>) -> Self {
        Self {
            sink,
            receiver,
            next_seq: 1,
        }
    }

    /// Deliver events until every sender has been dropped.
    pub async fn run(mut self) -> u64 {
        while let Some(envelope) = self.receiver.recv().await {
            self.ingest_one(envelope).await;
        }
        self.next_seq - 1
    }

    async fn ingest_one(&mut self, envelope: ProgressEnvelope) {
        let event = ProgressEvent::from_envelope(envelope, self.next_seq);
        self.next_seq += 1;
        let sink = self.sink.clone();
        let delivery = tokio::task::spawn_blocking(move || {
            let delivered = catch_unwind(AssertUnwindSafe(|| sink.report(&event)));
            (event, delivered)
        });
        let (event, delivered) = match delivery.await {
            Ok(done) => done,
            Err(err) => {
                warn!(error = %err, "progress delivery task failed");
                return;
            }
        };
        match delivered {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                run_id = %event.run_id,
                event_type = %event.event_type,
                error = %err,
                "progress sink rejected event"
            ),
            Err(payload) => warn!(
                run_id = %event.run_id,
                event_type = %event.event_type,
                panic = %panic_message(payload.as_ref()),
                "progress sink panicked"
            ),
        }
    }
}
