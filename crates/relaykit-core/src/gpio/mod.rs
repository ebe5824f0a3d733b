//! # GPIO Module
//!
//! Named digital outputs with self-reverting timed sets, and edge-driven
//! digital inputs. Both tables are fixed at construction and addressed by
//! small integer ids.
//!
//! ## Overview
//!
//! - [`TimedOutputController`]: `set`, `tick`, defaults, name lookup and the
//!   bulk request/status reports used by the HTTP glue
//! - [`InputEventSource`]: re-reads inputs on an edge and reports the change
//! - [`SimulatedGpio`]: in-memory driver for both, used by the demo and tests
//!
//! Every level change is published as a `GpioStatus` message of the form
//! `{"<name>":<0|1>}`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaykit_core::gpio::{OutputSpec, TimedOutputController};
//!
//! let outputs = TimedOutputController::new(&specs, driver, clock, listener)?;
//! let led = outputs.lookup_by_name("led1").unwrap();
//! outputs.set(led, true, Duration::from_millis(500));
//!
//! // from the scheduler
//! outputs.tick(clock.now());
//! ```

mod inputs;
mod outputs;
mod sim;

pub use inputs::*;
pub use outputs::*;
pub use sim::SimulatedGpio;

use crate::error::GpioError;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Number of pins on one port; pin indices must be below this
pub const PINS_PER_PORT: u8 = 32;

/// Check a channel table for empty or duplicate names and bad pins
pub fn validate_table<'a>(entries: impl IntoIterator<Item = (&'a str, u8)>) -> Result<(), GpioError> {
    let mut seen = HashSet::new();
    for (name, pin) in entries {
        if name.is_empty() {
            return Err(GpioError::EmptyName);
        }
        if pin >= PINS_PER_PORT {
            return Err(GpioError::InvalidPin {
                name: name.to_string(),
                pin,
            });
        }
        if !seen.insert(name) {
            return Err(GpioError::DuplicateName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// `{"name":0|1,...}` for a table of levels
fn levels_json<'a>(levels: impl IntoIterator<Item = (&'a str, bool)>) -> String {
    let map: Map<String, Value> = levels
        .into_iter()
        .map(|(name, level)| (name.to_string(), Value::from(u8::from(level))))
        .collect();
    Value::Object(map).to_string()
}
