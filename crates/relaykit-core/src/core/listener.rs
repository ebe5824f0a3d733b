//! Event listener capability
//!
//! Producers (log capture, output controller, input source) report state
//! changes through this trait instead of a process-wide callback.

use crate::event_bus::Topic;
use std::sync::Arc;

/// Sink for state-change notifications
///
/// Implementations must not block: producers call this from request
/// handlers, edge handlers and the logging path.
pub trait EventListener: Send + Sync {
    /// Report `text` under `topic`
    fn publish(&self, topic: Topic, text: &str);
}

/// Listener shared between producers
pub type SharedListener = Arc<dyn EventListener>;

/// Listener that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl EventListener for NullListener {
    fn publish(&self, _topic: Topic, _text: &str) {}
}
