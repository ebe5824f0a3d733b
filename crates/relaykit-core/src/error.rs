//! Error handling for RelayKit
//!
//! Provides error types for every layer of the runtime core:
//! - RAM log geometry errors (slot and capacity layout)
//! - Event bus configuration errors
//! - GPIO table and name validation errors
//! - Transport and driver failures reported by external capabilities
//!
//! Resource exhaustion (full ring, full channel pool, full message queue) is
//! not an error anywhere in this crate; those outcomes are handled by eviction,
//! rejection or dropping. All error types use `thiserror`.

use thiserror::Error;

/// RAM log error type
///
/// Raised only when a ring log store is constructed with an invalid geometry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RamLogError {
    /// Slot cannot hold the header plus one UTF-8 character
    #[error("Slot size {slot_size} is too small, minimum is {min} bytes")]
    SlotTooSmall {
        /// The requested slot size.
        slot_size: usize,
        /// The smallest accepted slot size.
        min: usize,
    },

    /// Capacity is not an exact multiple of the slot size
    #[error("Capacity {capacity} is not a multiple of slot size {slot_size}")]
    MisalignedCapacity {
        /// The requested capacity in bytes.
        capacity: usize,
        /// The requested slot size in bytes.
        slot_size: usize,
    },

    /// Capacity is zero or too large for the cursor arithmetic
    #[error("Capacity {capacity} out of range (1..={max} bytes)")]
    CapacityOutOfRange {
        /// The requested capacity in bytes.
        capacity: usize,
        /// The largest accepted capacity.
        max: usize,
    },
}

/// Event bus error type
///
/// Represents configuration problems detected while building the bus and
/// failures to start the dispatcher thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Channel pool must have at least one slot
    #[error("Channel pool size must be > 0")]
    EmptyPool,

    /// Message queue must hold at least one message
    #[error("Message queue depth must be > 0")]
    EmptyQueue,

    /// Message size limit too small to carry any payload
    #[error("Message length limit {limit} is too small")]
    MessageLimitTooSmall {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// Dispatcher thread could not be spawned
    #[error("Failed to spawn dispatcher thread: {reason}")]
    DispatcherSpawn {
        /// The reason the spawn failed.
        reason: String,
    },
}

/// GPIO error type
///
/// Represents invalid references to named channels and invalid channel tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// No output with this name exists
    #[error("Unknown output: {name}")]
    UnknownOutput {
        /// The name that failed to resolve.
        name: String,
    },

    /// No input with this name exists
    #[error("Unknown input: {name}")]
    UnknownInput {
        /// The name that failed to resolve.
        name: String,
    },

    /// Two channels in one table share a name
    #[error("Duplicate channel name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Channel name is empty
    #[error("Channel name must not be empty")]
    EmptyName,

    /// Pin index does not fit the 32-bit pin mask
    #[error("Invalid pin {pin} for {name}")]
    InvalidPin {
        /// The channel name.
        name: String,
        /// The rejected pin index.
        pin: u8,
    },

    /// Requested value cannot be interpreted as a level
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// The channel name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Transport error type
///
/// Reported by a [`Transport`](crate::core::Transport) when a push to a
/// connected channel fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer already went away
    #[error("Connection closed")]
    Closed,

    /// Write to the connection failed
    #[error("Send failed: {reason}")]
    SendFailed {
        /// The reason for the failure.
        reason: String,
    },
}

/// Driver error type
///
/// Reported by output and input drivers when the physical layer fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Driver has no line with this index
    #[error("Unknown line {line}")]
    UnknownLine {
        /// The line index.
        line: usize,
    },

    /// Writing the pin failed
    #[error("Failed to set output: {reason}")]
    WriteFailed {
        /// The reason for the failure.
        reason: String,
    },

    /// Reading the pin failed
    #[error("Failed to read input: {reason}")]
    ReadFailed {
        /// The reason for the failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RamLogError::MisalignedCapacity {
            capacity: 100,
            slot_size: 64,
        };
        assert_eq!(err.to_string(), "Capacity 100 is not a multiple of slot size 64");

        let err = GpioError::UnknownOutput {
            name: "led9".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown output: led9");

        let err = DriverError::WriteFailed {
            reason: "bus fault".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to set output: bus fault");

        let err = TransportError::Closed;
        assert_eq!(err.to_string(), "Connection closed");
    }
}
