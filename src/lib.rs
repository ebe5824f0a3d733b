//! # RelayKit
//!
//! Runtime core for a small network-attached I/O controller:
//! - Fixed-memory RAM log fed by `tracing`
//! - Bounded push event bus for GPIO status and live log streams
//! - Named digital outputs with self-reverting timed sets
//! - Edge-driven digital inputs
//!
//! ## Architecture
//!
//! RelayKit is organized as a workspace with multiple crates:
//!
//! 1. **relaykit-core** - RAM log store, event bus, GPIO controllers, capability traits
//! 2. **relaykit-settings** - Configuration files, defaults and validation
//! 3. **relaykit** - Logging setup, runtime wiring and the demo binary
//!
//! HTTP routing, websocket framing and real pin drivers live outside this
//! workspace and plug in through the `Transport`, `OutputDriver`,
//! `InputDriver` and `Clock` traits.

pub mod logging;
pub mod runtime;
pub mod transport;

pub use relaykit_core::{
    Admission, BusStats, Clock, EventBroadcastBus, EventListener, InputEventSource, LogCapture,
    ManualClock, MonotonicClock, OutputSpec, RingLogStore, SimulatedGpio, TimedOutputController,
    Timestamp, Topic, Transport,
};
pub use relaykit_settings::Config;

pub use logging::{format_line, RamLogLayer};
pub use runtime::{Drivers, Runtime};
pub use transport::StdoutTransport;

use std::sync::Arc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Build the RAM log capture described by `config`
///
/// The capture is not connected to any logger; see [`init_logging`].
pub fn ram_log_capture(config: &Config) -> anyhow::Result<Arc<LogCapture>> {
    let store = RingLogStore::new(config.ramlog.capacity_bytes, config.ramlog.slot_size)?;
    Ok(Arc::new(LogCapture::new(Arc::new(store))))
}

/// Initialize logging and the RAM log
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - Capture into the RAM log at the configured level
///
/// Returns the capture so the runtime can attach the log stream to the bus.
pub fn init_logging(config: &Config) -> anyhow::Result<Arc<LogCapture>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = config.ramlog.level()?;
    let capture = ram_log_capture(config)?;

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    let ram_layer = RamLogLayer::new(capture.clone(), level, config.ramlog.max_line_len);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(ram_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    Ok(capture)
}
