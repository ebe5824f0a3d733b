//! In-memory GPIO driver

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{InputId, OutputId};
use crate::core::{InputDriver, OutputDriver};
use crate::error::DriverError;

/// Simulated port lines
///
/// Output writes are recorded; input levels are set by the caller. Writes and
/// reads can be made to fail to exercise the error paths.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    outputs: Mutex<Vec<bool>>,
    inputs: Mutex<Vec<bool>>,
    writes: Mutex<Vec<(OutputId, bool)>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl SimulatedGpio {
    /// Create `outputs` output lines and `inputs` input lines, all low
    pub fn new(outputs: usize, inputs: usize) -> Self {
        Self {
            outputs: Mutex::new(vec![false; outputs]),
            inputs: Mutex::new(vec![false; inputs]),
            ..Default::default()
        }
    }

    /// Level last written to output `id`
    pub fn output(&self, id: OutputId) -> Option<bool> {
        self.outputs.lock().get(id.0).copied()
    }

    /// Drive input `id` as if from outside
    pub fn set_input(&self, id: InputId, level: bool) -> Result<(), DriverError> {
        let mut inputs = self.inputs.lock();
        let line = inputs
            .get_mut(id.0)
            .ok_or(DriverError::UnknownLine { line: id.0 })?;
        *line = level;
        Ok(())
    }

    /// Every successful write, oldest first
    pub fn writes(&self) -> Vec<(OutputId, bool)> {
        self.writes.lock().clone()
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl OutputDriver for SimulatedGpio {
    fn write(&self, id: OutputId, value: bool) -> Result<(), DriverError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DriverError::WriteFailed {
                reason: "simulated fault".to_string(),
            });
        }
        let mut outputs = self.outputs.lock();
        let line = outputs
            .get_mut(id.0)
            .ok_or(DriverError::UnknownLine { line: id.0 })?;
        *line = value;
        self.writes.lock().push((id, value));
        Ok(())
    }
}

impl InputDriver for SimulatedGpio {
    fn read(&self, id: InputId) -> Result<bool, DriverError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DriverError::ReadFailed {
                reason: "simulated fault".to_string(),
            });
        }
        self.inputs
            .lock()
            .get(id.0)
            .copied()
            .ok_or(DriverError::UnknownLine { line: id.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let gpio = SimulatedGpio::new(2, 1);
        gpio.write(OutputId(1), true).unwrap();
        assert_eq!(gpio.output(OutputId(1)), Some(true));
        assert_eq!(gpio.writes(), vec![(OutputId(1), true)]);

        gpio.set_input(InputId(0), true).unwrap();
        assert_eq!(gpio.read(InputId(0)), Ok(true));
    }

    #[test]
    fn test_unknown_lines() {
        let gpio = SimulatedGpio::new(1, 0);
        assert_eq!(
            gpio.write(OutputId(3), true),
            Err(DriverError::UnknownLine { line: 3 })
        );
        assert_eq!(gpio.read(InputId(0)), Err(DriverError::UnknownLine { line: 0 }));
        assert!(gpio.set_input(InputId(0), true).is_err());
    }

    #[test]
    fn test_fail_writes() {
        let gpio = SimulatedGpio::new(1, 0);
        gpio.set_fail_writes(true);
        assert!(matches!(
            gpio.write(OutputId(0), true),
            Err(DriverError::WriteFailed { .. })
        ));
        assert_eq!(gpio.output(OutputId(0)), Some(false));
        assert!(gpio.writes().is_empty());
    }

    #[test]
    fn test_fail_reads() {
        let gpio = SimulatedGpio::new(0, 1);
        gpio.set_fail_reads(true);
        assert!(matches!(gpio.read(InputId(0)), Err(DriverError::ReadFailed { .. })));
        gpio.set_fail_reads(false);
        assert_eq!(gpio.read(InputId(0)), Ok(false));
    }
}
