//! Edge-driven digital inputs

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{levels_json, validate_table};
use crate::core::{InputDriver, SharedListener};
use crate::error::GpioError;
use crate::event_bus::{EventMessage, Topic};

/// Index of an input in the source's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(pub usize);

impl std::fmt::Display for InputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "In({})", self.0)
    }
}

/// Static description of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Unique name used in status messages
    pub name: String,
    /// Port device the pin belongs to, e.g. `GPIOA`
    pub port: String,
    /// Pin index within the port (0..32)
    pub pin: u8,
}

impl InputSpec {
    /// Describe an input
    pub fn new(name: impl Into<String>, port: impl Into<String>, pin: u8) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            pin,
        }
    }
}

/// Runtime state of one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputChannel {
    /// Name from the input table
    pub name: String,
    /// Port device
    pub port: String,
    /// Pin index on the port
    pub pin: u8,
    /// Level read on the last edge, or at startup
    pub current_value: bool,
}

/// Inputs that report every edge
///
/// No debouncing: each call to [`on_edge`](Self::on_edge) re-reads and
/// publishes the matching inputs.
pub struct InputEventSource {
    channels: Mutex<Vec<InputChannel>>,
    driver: Arc<dyn InputDriver>,
    listener: SharedListener,
}

impl InputEventSource {
    /// Build the input table and read the initial levels
    pub fn new(
        specs: &[InputSpec],
        driver: Arc<dyn InputDriver>,
        listener: SharedListener,
    ) -> Result<Self, GpioError> {
        validate_table(specs.iter().map(|s| (s.name.as_str(), s.pin)))?;

        let channels = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let current_value = driver.read(InputId(index)).unwrap_or_else(|e| {
                    tracing::error!("Failed to read input {}: {}", spec.name, e);
                    false
                });
                InputChannel {
                    name: spec.name.clone(),
                    port: spec.port.clone(),
                    pin: spec.pin,
                    current_value,
                }
            })
            .collect::<Vec<_>>();
        tracing::info!("Initialized {} inputs", channels.len());

        Ok(Self {
            channels: Mutex::new(channels),
            driver,
            listener,
        })
    }

    /// Handle an edge on `port` for the pins set in `pin_mask`
    ///
    /// Every configured input on that port whose pin bit is in the mask is
    /// re-read and published. Returns the number of inputs reported.
    pub fn on_edge(&self, port: &str, pin_mask: u32) -> usize {
        let mut channels = self.channels.lock();
        let mut reported = 0;
        for (index, channel) in channels.iter_mut().enumerate() {
            if channel.port != port || pin_mask & (1u32 << channel.pin) == 0 {
                continue;
            }

            let level = match self.driver.read(InputId(index)) {
                Ok(level) => level,
                Err(e) => {
                    tracing::error!("Failed to read input {}: {}", channel.name, e);
                    continue;
                }
            };
            channel.current_value = level;
            tracing::debug!("{} = {}", channel.name, u8::from(level));
            self.listener
                .publish(Topic::GpioStatus, &EventMessage::gpio_status(&channel.name, level));
            reported += 1;
        }
        reported
    }

    /// Find an input by name
    pub fn lookup_by_name(&self, name: &str) -> Option<InputId> {
        self.channels
            .lock()
            .iter()
            .position(|c| c.name == name)
            .map(InputId)
    }

    /// Last level seen on input `id`
    pub fn value(&self, id: InputId) -> Option<bool> {
        self.channels.lock().get(id.0).map(|c| c.current_value)
    }

    /// Last level seen on the named input
    pub fn value_by_name(&self, name: &str) -> Result<bool, GpioError> {
        self.channels
            .lock()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.current_value)
            .ok_or_else(|| GpioError::UnknownInput {
                name: name.to_string(),
            })
    }

    /// Copy of every input's state, in table order
    pub fn snapshot(&self) -> Vec<InputChannel> {
        self.channels.lock().clone()
    }

    /// Number of configured inputs
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// True if no inputs are configured
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Levels of all inputs as `{"name":0|1,...}`
    pub fn status_json(&self) -> String {
        let channels = self.channels.lock();
        levels_json(channels.iter().map(|c| (c.name.as_str(), c.current_value)))
    }
}

impl std::fmt::Debug for InputEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputEventSource")
            .field("channels", &*self.channels.lock())
            .finish()
    }
}
