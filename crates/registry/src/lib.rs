//! Plugin registry and factory selection.
//!
//! A [`Registry`] owns the loaded plugins and the factory tables they fill.
//! Plugins load lazily and exactly once, on the first call that needs them:
//!
//! 1. bundled data sources (`stddatasrc`, feature `std-datasources`)
//! 2. bundled physics (`stdabs`, feature `std-physics`)
//! 3. [`BuiltinPlugin`]s submitted through `inventory`, sorted by name
//! 4. builtins supplied through [`RegistryBuilder::builtin`]
//! 5. shared libraries named in [`RuntimeOptions::extra_plugin_paths`]
//!
//! Factories are selected per request by [`Registry::select`]: an explicit
//! name in the request wins, otherwise the highest priority among the
//! factories able to handle it, earliest registration first on ties.
//!
//! Shared libraries talk to the host only through the C ABI in [`cabi`]:
//! `ncplugin_register` receives a table of host callbacks and registers its
//! process factories through them.
//!
//! [`RuntimeOptions::extra_plugin_paths`]: ncfactory_primitives::RuntimeOptions::extra_plugin_paths

/// Logs at `info` when verbose plugin diagnostics are on, at `debug` otherwise.
macro_rules! plugin_event {
	($verbose:expr, $($arg:tt)+) => {
		if $verbose {
			tracing::info!($($arg)+)
		} else {
			tracing::debug!($($arg)+)
		}
	};
}

mod active;
/// Bundled plugins.
pub mod builtins;
mod dynload;
/// Factory traits and request types.
pub mod factory;
mod host;
mod plugin;
mod registry;
mod table;

pub use factory::{
	AbsorptionRequest, Factory, FactoryKind, FactoryRequest, FactorySet, InfoRequest, ScatterRequest, TextDataRequest,
};
pub use inventory;
pub use ncfactory_cabi as cabi;
pub use plugin::{BuiltinPlugin, PluginKind, PluginRecord};
pub use registry::{BootstrapFailure, Registry, RegistryBuilder, global};
