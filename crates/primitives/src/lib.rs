//! Shared building blocks for the ncfactory crates.
//!
//! Nothing in here knows about plugins, factories or caches. The types are the
//! vocabulary the other crates speak at their boundaries:
//!
//! - [`NcError`] - the error taxonomy every fallible operation reports with
//! - [`UniqueId`] - process-unique identity of shareable source objects
//! - [`units`] - unit suffix parsing for temperatures, lengths and angles
//! - [`RuntimeOptions`] - injected diagnostics and plugin-path switches
//! - [`TextData`], [`Info`] and [`Process`] - source objects and products

/// Error taxonomy.
pub mod error;
/// Runtime switches for plugin loading and caching.
pub mod options;
/// Boundary trait for physics products.
pub mod process;
/// Source objects: raw text data and parsed material information.
pub mod source;
/// Process-unique identifiers.
pub mod uid;
/// Unit conversion for parameter values.
pub mod units;

pub use error::{ErrorKind, NcError, Result};
pub use options::RuntimeOptions;
pub use process::Process;
pub use source::{Info, InfoBuilder, TextData};
pub use uid::{UniqueId, UniqueIdentifiable};
