//! Event sinks for workflow observability.
//!
//! Sinks are handed to the controller explicitly; there is no process-wide
//! sink, so two runs in the same process never share an event stream
//! unless the caller passes them the same sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
