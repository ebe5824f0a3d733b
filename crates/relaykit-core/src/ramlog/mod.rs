//! # RAM Log Module
//!
//! Fixed-memory diagnostic log kept in a circular buffer of equally sized
//! slots, plus the capture front end the logging backend writes through.
//!
//! ## Usage
//!
//! ```rust
//! use relaykit_core::ramlog::RingLogStore;
//!
//! let store = RingLogStore::new(256, 64).unwrap();
//! store.write_line("booted\n");
//!
//! let mut cursor = store.begin_snapshot();
//! loop {
//!     let (line, next) = store.next(cursor);
//!     match line {
//!         Some(line) => print!("{line}"),
//!         None => break,
//!     }
//!     cursor = next;
//! }
//! ```

mod capture;
mod store;

pub use capture::{LogCapture, StreamMute};
pub use store::*;
