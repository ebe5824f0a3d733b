//! Message types carried by the event bus.
//!
//! Every message belongs to exactly one topic; channels subscribe to one
//! topic and never see another topic's traffic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Websocket endpoint serving [`Topic::GpioStatus`]
pub const GPIO_STATUS_ENDPOINT: &str = "/ws_gpio_status";

/// Websocket endpoint serving [`Topic::LogStream`]
pub const LOG_STREAM_ENDPOINT: &str = "/ws_log";

/// Routing tag for bus messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Unassigned; never matches a published message
    #[default]
    None,
    /// Input and output level changes
    GpioStatus,
    /// Formatted log lines
    LogStream,
}

impl Topic {
    /// Map a websocket endpoint path to its topic
    pub fn from_endpoint(path: &str) -> Option<Topic> {
        match path {
            GPIO_STATUS_ENDPOINT => Some(Topic::GpioStatus),
            LOG_STREAM_ENDPOINT => Some(Topic::LogStream),
            _ => None,
        }
    }

    /// Websocket endpoint path for this topic
    pub fn endpoint(self) -> Option<&'static str> {
        match self {
            Topic::None => None,
            Topic::GpioStatus => Some(GPIO_STATUS_ENDPOINT),
            Topic::LogStream => Some(LOG_STREAM_ENDPOINT),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::None => write!(f, "none"),
            Topic::GpioStatus => write!(f, "gpio_status"),
            Topic::LogStream => write!(f, "log_stream"),
        }
    }
}

/// One queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Routing tag
    pub topic: Topic,
    /// Payload sent verbatim to subscribers
    pub text: String,
}

impl EventMessage {
    /// Create a message, truncating `text` to at most `max_len` bytes
    ///
    /// Truncation happens on a character boundary.
    pub fn new(topic: Topic, text: &str, max_len: usize) -> Self {
        let mut end = text.len().min(max_len);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            topic,
            text: text[..end].to_string(),
        }
    }

    /// Payload of a GPIO status change: `{"<name>":<0|1>}`
    pub fn gpio_status(name: &str, value: bool) -> String {
        let mut map = Map::new();
        map.insert(name.to_string(), Value::from(u8::from(value)));
        Value::Object(map).to_string()
    }
}
