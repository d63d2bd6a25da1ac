//! Plugins bundled with the registry, loaded first during bootstrap.
//!
//! Each is gated behind a cargo feature so embedders can start from an empty
//! registry.

#[cfg(feature = "std-physics")]
pub mod abs;
#[cfg(feature = "std-datasources")]
pub mod datasrc;
