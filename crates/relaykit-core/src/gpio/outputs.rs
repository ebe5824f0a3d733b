//! Timed digital outputs
//!
//! An output set with a positive delay remembers when it should flip back.
//! The periodic [`TimedOutputController::tick`] performs the flip.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{levels_json, validate_table};
use crate::core::{Clock, OutputDriver, SharedListener, Timestamp};
use crate::error::GpioError;
use crate::event_bus::{EventMessage, Topic};

/// Index of an output in the controller's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub usize);

impl std::fmt::Display for OutputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Out({})", self.0)
    }
}

/// Static description of one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Name used in requests and status messages
    pub name: String,
    /// Port device, e.g. `GPIOB`
    pub port: String,
    /// Pin index on the port
    pub pin: u8,
    /// Level applied at startup and by `set_default`
    #[serde(default)]
    pub default_value: bool,
}

impl OutputSpec {
    /// Describe an output that defaults to off
    pub fn new(name: impl Into<String>, port: impl Into<String>, pin: u8) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            pin,
            default_value: false,
        }
    }
}

/// Runtime state of one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChannel {
    /// Name from the output table
    pub name: String,
    /// Port device
    pub port: String,
    /// Pin index on the port
    pub pin: u8,
    /// Level last driven
    pub current_value: bool,
    /// Level restored by `set_default`
    pub default_value: bool,
    /// When the output flips back; `None` if it holds its level
    pub expiry: Option<Timestamp>,
}

/// Result of [`TimedOutputController::apply_request`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOutcome {
    /// Outputs that were set
    pub applied: Vec<String>,
    /// Entries that were refused, with the reason
    pub rejected: Vec<(String, GpioError)>,
}

impl RequestOutcome {
    /// True if every entry was applied
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Named outputs with deferred auto-revert
///
/// `set`, `tick` and the default setters serialize on one mutex, so a tick
/// never races a request handler.
pub struct TimedOutputController {
    channels: Mutex<Vec<OutputChannel>>,
    driver: Arc<dyn OutputDriver>,
    clock: Arc<dyn Clock>,
    listener: SharedListener,
}

impl TimedOutputController {
    /// Build the output table and drive every output to its default
    ///
    /// Startup defaults are written to the driver but not published.
    pub fn new(
        specs: &[OutputSpec],
        driver: Arc<dyn OutputDriver>,
        clock: Arc<dyn Clock>,
        listener: SharedListener,
    ) -> Result<Self, GpioError> {
        validate_table(specs.iter().map(|s| (s.name.as_str(), s.pin)))?;

        let channels: Vec<OutputChannel> = specs
            .iter()
            .map(|spec| OutputChannel {
                name: spec.name.clone(),
                port: spec.port.clone(),
                pin: spec.pin,
                current_value: spec.default_value,
                default_value: spec.default_value,
                expiry: None,
            })
            .collect();

        for (index, channel) in channels.iter().enumerate() {
            if let Err(e) = driver.write(OutputId(index), channel.default_value) {
                tracing::error!("Failed to set output {}: {}", channel.name, e);
            }
        }
        tracing::info!("Initialized {} outputs", channels.len());

        Ok(Self {
            channels: Mutex::new(channels),
            driver,
            clock,
            listener,
        })
    }

    /// Set output `id` to `value`
    ///
    /// A non-zero `delay` schedules the opposite level at `now + delay`; a
    /// zero delay cancels any pending revert.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the table. External callers resolve names
    /// with [`lookup_by_name`](Self::lookup_by_name) first.
    pub fn set(&self, id: OutputId, value: bool, delay: Duration) {
        let mut channels = self.channels.lock();
        self.set_locked(&mut channels, id, value, delay);
    }

    /// Resolve `name` and set it
    pub fn set_by_name(&self, name: &str, value: bool, delay: Duration) -> Result<OutputId, GpioError> {
        let id = self.resolve(name)?;
        self.set(id, value, delay);
        Ok(id)
    }

    /// Return output `id` to its default level and cancel any revert
    pub fn set_default(&self, id: OutputId) {
        let mut channels = self.channels.lock();
        assert!(id.0 < channels.len(), "output {} out of range", id);
        let value = channels[id.0].default_value;
        self.set_locked(&mut channels, id, value, Duration::ZERO);
    }

    /// Resolve `name` and return it to its default
    pub fn set_default_by_name(&self, name: &str) -> Result<OutputId, GpioError> {
        let id = self.resolve(name)?;
        self.set_default(id);
        Ok(id)
    }

    /// Return every output to its default level
    pub fn set_all_defaults(&self) {
        let mut channels = self.channels.lock();
        for index in 0..channels.len() {
            let value = channels[index].default_value;
            self.set_locked(&mut channels, OutputId(index), value, Duration::ZERO);
        }
    }

    /// Flip every output whose expiry has passed
    ///
    /// Returns the number of outputs reverted.
    pub fn tick(&self, now: Timestamp) -> usize {
        let mut channels = self.channels.lock();
        let mut reverted = 0;
        for index in 0..channels.len() {
            let due = match channels[index].expiry {
                Some(expiry) => now >= expiry,
                None => false,
            };
            if due {
                let value = !channels[index].current_value;
                self.set_locked(&mut channels, OutputId(index), value, Duration::ZERO);
                reverted += 1;
            }
        }
        reverted
    }

    /// Find an output by name
    pub fn lookup_by_name(&self, name: &str) -> Option<OutputId> {
        self.channels
            .lock()
            .iter()
            .position(|c| c.name == name)
            .map(OutputId)
    }

    /// Current level of output `id`
    pub fn value(&self, id: OutputId) -> Option<bool> {
        self.channels.lock().get(id.0).map(|c| c.current_value)
    }

    /// Copy of the state of output `id`
    pub fn channel(&self, id: OutputId) -> Option<OutputChannel> {
        self.channels.lock().get(id.0).cloned()
    }

    /// Copy of every output's state, in table order
    pub fn snapshot(&self) -> Vec<OutputChannel> {
        self.channels.lock().clone()
    }

    /// Number of configured outputs
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// True if no outputs are configured
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Levels of all outputs as `{"name":0|1,...}`
    pub fn status_json(&self) -> String {
        let channels = self.channels.lock();
        levels_json(channels.iter().map(|c| (c.name.as_str(), c.current_value)))
    }

    /// Apply a bulk set request
    ///
    /// Each entry maps an output name to a level (`true`/`false` or an
    /// integer) or to `{"value": <level>, "delay_ms": <ms>}`. Valid entries
    /// are applied even when others are rejected.
    pub fn apply_request(&self, request: &Map<String, Value>) -> RequestOutcome {
        let mut outcome = RequestOutcome::default();
        for (name, entry) in request {
            let result = parse_entry(name, entry)
                .and_then(|(value, delay)| self.set_by_name(name, value, delay));
            match result {
                Ok(_) => outcome.applied.push(name.clone()),
                Err(e) => {
                    tracing::warn!("Rejected set request for {}: {}", name, e);
                    outcome.rejected.push((name.clone(), e));
                }
            }
        }
        outcome
    }

    fn resolve(&self, name: &str) -> Result<OutputId, GpioError> {
        self.lookup_by_name(name).ok_or_else(|| GpioError::UnknownOutput {
            name: name.to_string(),
        })
    }

    fn set_locked(&self, channels: &mut [OutputChannel], id: OutputId, value: bool, delay: Duration) {
        assert!(
            id.0 < channels.len(),
            "output {} out of range ({} outputs)",
            id,
            channels.len()
        );
        let channel = &mut channels[id.0];

        if let Err(e) = self.driver.write(id, value) {
            tracing::error!("Failed to set output {}: {}", channel.name, e);
        }

        channel.current_value = value;
        channel.expiry = if delay.is_zero() {
            None
        } else {
            Some(self.clock.now().saturating_add(delay))
        };

        match channel.expiry {
            Some(expiry) => tracing::debug!("{} = {} until {}", channel.name, u8::from(value), expiry),
            None => tracing::debug!("{} = {}", channel.name, u8::from(value)),
        }
        self.listener
            .publish(Topic::GpioStatus, &EventMessage::gpio_status(&channel.name, value));
    }
}

impl std::fmt::Debug for TimedOutputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedOutputController")
            .field("channels", &*self.channels.lock())
            .finish()
    }
}

fn parse_level(name: &str, value: &Value) -> Result<bool, GpioError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(level) => Ok(level != 0),
            None => Err(invalid(name, "level must be an integer")),
        },
        _ => Err(invalid(name, "expected a boolean or integer level")),
    }
}

fn parse_entry(name: &str, entry: &Value) -> Result<(bool, Duration), GpioError> {
    let Value::Object(fields) = entry else {
        return parse_level(name, entry).map(|value| (value, Duration::ZERO));
    };

    let value = fields
        .get("value")
        .ok_or_else(|| invalid(name, "missing \"value\""))
        .and_then(|v| parse_level(name, v))?;

    let delay = match fields.get("delay_ms") {
        None => Duration::ZERO,
        Some(ms) => ms
            .as_u64()
            .map(Duration::from_millis)
            .ok_or_else(|| invalid(name, "\"delay_ms\" must be a non-negative integer"))?,
    };
    Ok((value, delay))
}

fn invalid(name: &str, reason: &str) -> GpioError {
    GpioError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
