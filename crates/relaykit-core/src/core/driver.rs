//! Physical pin capabilities

use crate::error::DriverError;
use crate::gpio::{InputId, OutputId};

/// Writes a digital output
pub trait OutputDriver: Send + Sync {
    /// Drive output `id` to `value`
    fn write(&self, id: OutputId, value: bool) -> Result<(), DriverError>;
}

/// Reads a digital input
pub trait InputDriver: Send + Sync {
    /// Current level of input `id`
    fn read(&self, id: InputId) -> Result<bool, DriverError>;
}
