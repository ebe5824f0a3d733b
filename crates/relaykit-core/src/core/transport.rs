//! Push transport capability
//!
//! Implemented by the websocket layer. The bus only needs to compare
//! connections and push bytes to them.

use crate::error::TransportError;
use std::fmt;

/// Delivers bytes to a connected push channel
pub trait Transport: Send + Sync + 'static {
    /// Handle identifying one live connection
    type Connection: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Push `payload` to `connection`
    ///
    /// A failure is reported to the caller only; detecting dead peers and
    /// closing them is the transport's own job.
    fn send(&self, connection: &Self::Connection, payload: &[u8]) -> Result<(), TransportError>;
}
