//! Telemetry domain: progress events, the in-process bus, sinks, and the run-scoped runtime.

pub mod bus;
pub mod events;
pub mod ingestor;
pub mod runtime;
pub mod sinks;

pub use events::{ProgressEnvelope, ProgressEvent};
pub use runtime::ProgressRuntime;
pub use sinks::{MemorySink, ProgressSink, TracingSink};
