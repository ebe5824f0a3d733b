//! Type system utilities and aliases.
//!
//! ## Modules
//!
//! - [`aliases`]: Type aliases for shared arenas.

pub mod aliases;

pub use aliases::*;
