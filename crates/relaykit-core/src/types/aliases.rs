//! Type aliases for commonly used shared-state types.
//!
//! Gives names to the `Arc<Mutex<..>>` shapes shared between the request
//! handlers, the edge handler and the dispatcher thread.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaykit_core::types::*;
//!
//! // Instead of: Arc<Mutex<Vec<ChannelSlot>>>
//! let pool: ThreadSafeVec<ChannelSlot> = thread_safe_vec(slots);
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe vector, used for fixed-size arenas indexed by small integers.
///
/// Uses `parking_lot::Mutex`: no poisoning, and short critical sections
/// spin briefly before parking.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// Wrap a vector for cross-thread sharing
pub fn thread_safe_vec<T>(items: Vec<T>) -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(items))
}
