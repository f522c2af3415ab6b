//! Event hooks and the JSONL logger that subscribes to them.

mod logger;

pub use logger::{EventLogger, PendingEvents};
use tile_events::AgentEvent;

/// Anything that accepts agent events.
///
/// The agent core reports through this and never writes output itself.
pub trait EventSink {
    fn emit(&mut self, event: AgentEvent);
}

impl EventSink for Vec<AgentEvent> {
    fn emit(&mut self, event: AgentEvent) {
        self.push(event);
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: AgentEvent) {}
}
