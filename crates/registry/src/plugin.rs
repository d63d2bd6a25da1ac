use std::fmt;
use std::path::PathBuf;

use ncfactory_primitives::Result;

use crate::Registry;

/// How a plugin entered the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
	/// Linked into the host binary.
	Builtin,
	/// Loaded from a shared library.
	Dynamic,
}

impl fmt::Display for PluginKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Builtin => "builtin",
			Self::Dynamic => "dynamic",
		})
	}
}

/// A loaded plugin. Records are never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
	pub name: String,
	pub kind: PluginKind,
	/// Shared library the plugin came from, for dynamic plugins.
	pub file: Option<PathBuf>,
	/// Registration entry point the plugin was loaded through.
	pub entry_point: String,
}

/// A builtin plugin contributed at link time.
///
/// ```ignore
/// ncfactory_registry::inventory::submit! {
///     ncfactory_registry::BuiltinPlugin::new("myplugin", register)
/// }
/// ```
pub struct BuiltinPlugin {
	pub name: &'static str,
	pub register: fn(&Registry) -> Result<()>,
}

inventory::collect!(BuiltinPlugin);

impl BuiltinPlugin {
	pub const fn new(name: &'static str, register: fn(&Registry) -> Result<()>) -> Self {
		Self { name, register }
	}
}

/// Submitted builtins in load order.
pub(crate) fn submitted() -> Vec<&'static BuiltinPlugin> {
	let mut plugins: Vec<&'static BuiltinPlugin> = inventory::iter::<BuiltinPlugin>.into_iter().collect();
	plugins.sort_by(|a, b| a.name.cmp(b.name));
	plugins
}
