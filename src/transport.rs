//! Stdout push transport for the demo binary

use relaykit_core::error::TransportError;
use relaykit_core::Transport;
use std::io::Write;

/// Prints each pushed message as `[client <id>] <text>`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTransport;

impl Transport for StdoutTransport {
    type Connection = u32;

    fn send(&self, connection: &u32, payload: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(payload);
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[client {}] {}", connection, text.trim_end()).map_err(|e| {
            TransportError::SendFailed {
                reason: e.to_string(),
            }
        })
    }
}
