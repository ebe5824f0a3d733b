//! # RelayKit Core
//!
//! Runtime core of a small network-attached controller.
//! Provides the fixed-memory RAM log, the bounded push event bus and the
//! timed GPIO outputs, plus the capability traits the surrounding glue
//! (HTTP handlers, websocket transport, pin drivers, clock) plugs into.

pub mod core;
pub mod error;
pub mod event_bus;
pub mod gpio;
pub mod ramlog;
pub mod types;

pub use crate::core::{
    Clock, EventListener, InputDriver, ManualClock, MonotonicClock, NullListener, OutputDriver,
    SharedListener, Timestamp, Transport,
};

pub use error::{BusError, DriverError, GpioError, RamLogError, TransportError};

// Re-export event bus for convenience
pub use event_bus::{
    Admission, BusPublisher, BusStats, ChannelId, ChannelState, Dispatcher, EventBroadcastBus,
    EventBusConfig, EventMessage, Topic,
};

pub use gpio::{
    InputChannel, InputEventSource, InputId, InputSpec, OutputChannel, OutputId, OutputSpec,
    RequestOutcome, SimulatedGpio, TimedOutputController,
};

pub use ramlog::{LogCapture, LogCursor, LogEntry, RingLogStore, StreamMute};

pub use types::{thread_safe_vec, ThreadSafeVec};
