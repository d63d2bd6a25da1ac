use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use ncfactory_primitives::{NcError, Result, RuntimeOptions};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::dynload::{self, REGISTER_SYMBOL};
use crate::factory::{Factory, FactoryKind, FactoryRequest, FactorySet};
use crate::plugin::{self, PluginKind, PluginRecord};

mod bootstrap;
mod select;

use bootstrap::{BootstrapGate, Entry};

/// Entry point recorded for plugins registered through a Rust function.
const BUILTIN_ENTRY_POINT: &str = "register";

/// In-memory files served by the `virtual` data source.
pub(crate) type VirtualFiles = Arc<RwLock<FxHashMap<String, Arc<str>>>>;

type RegisterFn = Box<dyn FnOnce(&Registry) -> Result<()> + Send>;

struct CustomBuiltin {
	name: String,
	register: RegisterFn,
}

/// A plugin that failed to load during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFailure {
	/// Plugin name, or the library path for shared libraries.
	pub plugin: String,
	pub error: NcError,
}

/// Loaded plugins and the factories they registered.
///
/// Plugins load on first use (see [`Registry::ensure_loaded`]). Tests and
/// embedding applications construct independent registries; [`global`]
/// provides a process-wide one configured from the environment.
pub struct Registry {
	options: RuntimeOptions,
	gate: BootstrapGate,
	/// Serializes whole plugin loads, including the plugin's own
	/// registration calls. Reentrant so registration may load further plugins.
	load_lock: ReentrantMutex<()>,
	plugins: Mutex<Vec<PluginRecord>>,
	pending_builtins: Mutex<Vec<CustomBuiltin>>,
	failures: Mutex<Vec<BootstrapFailure>>,
	factories: FactorySet,
	virtual_files: VirtualFiles,
}

impl Registry {
	pub fn new(options: RuntimeOptions) -> Self {
		Self {
			options,
			gate: BootstrapGate::default(),
			load_lock: ReentrantMutex::new(()),
			plugins: Mutex::new(Vec::new()),
			pending_builtins: Mutex::new(Vec::new()),
			failures: Mutex::new(Vec::new()),
			factories: FactorySet::default(),
			virtual_files: VirtualFiles::default(),
		}
	}

	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::default()
	}

	pub fn options(&self) -> &RuntimeOptions {
		&self.options
	}

	/// Loads every bootstrap plugin exactly once.
	///
	/// The first caller runs the bootstrap. Calls made from inside it (a
	/// plugin registering factories, say) return immediately; callers on
	/// other threads block until it has finished. A plugin that fails to load
	/// is logged, recorded in [`Registry::bootstrap_failures`], and skipped.
	pub fn ensure_loaded(&self) {
		if let Entry::Leader = self.gate.enter() {
			let _finish = FinishOnDrop(&self.gate);
			self.bootstrap();
		}
	}

	/// True once the bootstrap has completed.
	pub fn is_loaded(&self) -> bool {
		self.gate.is_finished()
	}

	fn bootstrap(&self) {
		let verbose = self.options.verbose_plugin_load;
		plugin_event!(verbose, "loading plugins");

		#[cfg(feature = "std-datasources")]
		self.note_failure(
			crate::builtins::datasrc::PLUGIN_NAME,
			self.install_builtin(crate::builtins::datasrc::PLUGIN_NAME.to_string(), crate::builtins::datasrc::register),
		);
		#[cfg(feature = "std-physics")]
		self.note_failure(
			crate::builtins::abs::PLUGIN_NAME,
			self.install_builtin(crate::builtins::abs::PLUGIN_NAME.to_string(), crate::builtins::abs::register),
		);

		for submitted in plugin::submitted() {
			self.note_failure(
				submitted.name,
				self.install_builtin(submitted.name.to_string(), submitted.register),
			);
		}

		let custom = std::mem::take(&mut *self.pending_builtins.lock());
		for builtin in custom {
			let name = builtin.name.clone();
			self.note_failure(&name, self.install_builtin(builtin.name, builtin.register));
		}

		for path in &self.options.extra_plugin_paths {
			self.note_failure(path, self.install_dynamic(Path::new(path), None));
		}

		plugin_event!(
			verbose,
			plugins = self.plugins.lock().len(),
			failures = self.failures.lock().len(),
			"plugin bootstrap finished"
		);
	}

	fn note_failure(&self, plugin: &str, result: Result<PluginRecord>) {
		if let Err(error) = result {
			tracing::error!(plugin, %error, "failed to load plugin");
			self.failures.lock().push(BootstrapFailure {
				plugin: plugin.to_string(),
				error,
			});
		}
	}

	/// Loads a plugin whose registration is the Rust function `register`.
	///
	/// Fails with `CalcError` if a plugin of that name is already loaded, in
	/// which case `register` is not called. If `register` fails, no record
	/// is added and its error is returned.
	pub fn load_builtin(
		&self,
		name: impl Into<String>,
		register: impl FnOnce(&Registry) -> Result<()>,
	) -> Result<PluginRecord> {
		self.ensure_loaded();
		self.install_builtin(name.into(), register)
	}

	/// Loads a plugin from the shared library at `path`.
	///
	/// The plugin's name comes from its `ncplugin_getname` export unless
	/// `explicit_name` is given. Fails with `FileNotFound` if the library
	/// does not exist and with `CalcError` if it cannot be opened, lacks an
	/// entry point, reuses a loaded name, rejects the host's ABI version or
	/// reports a failed registration. Factories registered before a failure
	/// stay registered.
	pub fn load_dynamic(&self, path: impl AsRef<Path>, explicit_name: Option<&str>) -> Result<PluginRecord> {
		self.ensure_loaded();
		self.install_dynamic(path.as_ref(), explicit_name)
	}

	fn install_builtin(&self, name: String, register: impl FnOnce(&Registry) -> Result<()>) -> Result<PluginRecord> {
		let record = PluginRecord {
			name,
			kind: PluginKind::Builtin,
			file: None,
			entry_point: BUILTIN_ENTRY_POINT.to_string(),
		};
		self.install(record, register)
	}

	fn install_dynamic(&self, path: &Path, explicit_name: Option<&str>) -> Result<PluginRecord> {
		plugin_event!(
			self.options.verbose_plugin_load,
			file = %path.display(),
			"opening plugin library"
		);
		let _serial = self.load_lock.lock();
		let library = dynload::open(path, explicit_name)?;
		let record = PluginRecord {
			name: library.name.clone(),
			kind: PluginKind::Dynamic,
			file: Some(path.to_path_buf()),
			entry_point: REGISTER_SYMBOL.to_string(),
		};
		self.install(record, |registry| library.register(registry))
	}

	fn install(&self, record: PluginRecord, register: impl FnOnce(&Registry) -> Result<()>) -> Result<PluginRecord> {
		let verbose = self.options.verbose_plugin_load;
		let _serial = self.load_lock.lock();
		if self.plugins.lock().iter().any(|p| p.name == record.name) {
			return Err(NcError::calc(format!(
				"attempting to load plugin named \"{}\" more than once",
				record.name
			)));
		}

		plugin_event!(verbose, plugin = %record.name, kind = %record.kind, "loading plugin");
		register(self)?;
		self.plugins.lock().push(record.clone());
		plugin_event!(verbose, plugin = %record.name, "loaded plugin");
		Ok(record)
	}

	/// Loaded plugins in load order.
	pub fn list_loaded(&self) -> Vec<PluginRecord> {
		self.ensure_loaded();
		self.plugins.lock().clone()
	}

	/// Plugins that failed to load during bootstrap.
	pub fn bootstrap_failures(&self) -> Vec<BootstrapFailure> {
		self.failures.lock().clone()
	}

	/// Adds a factory to the table of its capability.
	///
	/// Fails with `CalcError` if a factory of the same name already provides
	/// that capability.
	pub fn register_factory<R, F>(&self, factory: F) -> Result<()>
	where
		R: FactoryRequest,
		F: Factory<R> + 'static,
	{
		self.register_shared_factory(Arc::new(factory))
	}

	pub fn register_shared_factory<R: FactoryRequest>(&self, factory: Arc<dyn Factory<R>>) -> Result<()> {
		self.ensure_loaded();
		let name = factory.name().to_string();
		let priority = factory.priority();
		R::table(&self.factories).insert(factory)?;
		plugin_event!(
			self.options.verbose_plugin_load,
			kind = %R::KIND,
			factory = %name,
			priority,
			"registered factory"
		);
		Ok(())
	}

	/// Names of the factories providing `kind`, in registration order.
	pub fn list_factories(&self, kind: FactoryKind) -> Vec<String> {
		self.ensure_loaded();
		self.factories.names(kind)
	}

	/// Makes `content` available to the `virtual` data source as `name`.
	pub fn register_virtual_file(&self, name: impl Into<String>, content: impl Into<Arc<str>>) {
		self.virtual_files.write().insert(name.into(), content.into());
	}

	#[cfg_attr(not(feature = "std-datasources"), allow(dead_code))]
	pub(crate) fn virtual_files(&self) -> VirtualFiles {
		Arc::clone(&self.virtual_files)
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::new(RuntimeOptions::default())
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("loaded", &self.is_loaded())
			.field("plugins", &*self.plugins.lock())
			.finish_non_exhaustive()
	}
}

struct FinishOnDrop<'a>(&'a BootstrapGate);

impl Drop for FinishOnDrop<'_> {
	fn drop(&mut self) {
		self.0.finish();
	}
}

/// Builds a [`Registry`] with custom builtins.
#[derive(Default)]
pub struct RegistryBuilder {
	options: RuntimeOptions,
	builtins: Vec<CustomBuiltin>,
}

impl RegistryBuilder {
	pub fn options(mut self, options: RuntimeOptions) -> Self {
		self.options = options;
		self
	}

	/// Adds a builtin loaded during bootstrap, after the bundled and
	/// submitted ones and before shared libraries.
	pub fn builtin(
		mut self,
		name: impl Into<String>,
		register: impl FnOnce(&Registry) -> Result<()> + Send + 'static,
	) -> Self {
		self.builtins.push(CustomBuiltin {
			name: name.into(),
			register: Box::new(register),
		});
		self
	}

	pub fn build(self) -> Registry {
		let registry = Registry::new(self.options);
		*registry.pending_builtins.lock() = self.builtins;
		registry
	}
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, configured from the environment.
pub fn global() -> &'static Registry {
	GLOBAL.get_or_init(|| {
		let options = RuntimeOptions::from_env().unwrap_or_else(|error| {
			tracing::error!(%error, "invalid plugin environment; using defaults");
			RuntimeOptions::default()
		});
		Registry::new(options)
	})
}
