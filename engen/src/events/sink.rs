//! Event sink trait and implementations.

use crate::core::WorkflowEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Trait for sinks that receive workflow events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: WorkflowEvent);

    /// Emits an event without blocking.
    ///
    /// Must never fail; sinks log and drop whatever they cannot deliver.
    fn try_emit(&self, event: WorkflowEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: WorkflowEvent) {}

    fn try_emit(&self, _event: WorkflowEvent) {}
}

/// A sink that writes events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &WorkflowEvent) {
        let data = event.data_value();
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.event_type,
                event_data = %data,
                "Event: {}",
                event.event_type
            );
        } else {
            info!(
                event_type = %event.event_type,
                event_data = %data,
                "Event: {}",
                event.event_type
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: WorkflowEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: WorkflowEvent) {
        self.log_event(&event);
    }
}

/// A sink that keeps every event in memory.
///
/// Used by tests and by the CLI to print a run timeline.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<WorkflowEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with a prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<WorkflowEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: WorkflowEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: WorkflowEvent) {
        self.events.write().push(event);
    }
}
