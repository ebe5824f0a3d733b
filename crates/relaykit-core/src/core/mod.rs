//! Capabilities consumed by the runtime core
//!
//! The core never touches hardware, sockets or the wall clock directly. It
//! calls through these traits, which are injected at construction time:
//! - [`Clock`]: monotonic millisecond time source
//! - [`Transport`]: delivers bytes to one connected push channel
//! - [`OutputDriver`] / [`InputDriver`]: physical pin access
//! - [`EventListener`]: sink for state-change notifications

pub mod clock;
pub mod driver;
pub mod listener;
pub mod transport;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use driver::{InputDriver, OutputDriver};
pub use listener::{EventListener, NullListener, SharedListener};
pub use transport::Transport;
