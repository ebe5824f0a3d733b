//! # Event Bus Module
//!
//! Bounded fan-out of state-change messages to a fixed pool of push
//! channels.
//!
//! ## Overview
//!
//! - Producers publish `{topic, text}` messages without blocking; a full
//!   queue drops the message and counts the drop
//! - A single dispatcher thread drains the queue in FIFO order
//! - Each message reaches every ready channel subscribed to its topic, in
//!   slot order
//! - Connections beyond the pool size are rejected, not queued
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaykit_core::event_bus::{EventBroadcastBus, EventBusConfig, Topic};
//!
//! let (bus, dispatcher) = EventBroadcastBus::new(EventBusConfig::default(), transport)?;
//! let _thread = dispatcher.spawn()?;
//!
//! if bus.connect(conn, Topic::LogStream).is_accepted() {
//!     bus.mark_ready(&conn);
//! }
//!
//! bus.publish(Topic::LogStream, "boot complete\n");
//! bus.close(&conn);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
