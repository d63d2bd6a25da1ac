use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use ncfactory_cache::{CacheOptions, CacheRef, CacheStats, DerivedCache};
use ncfactory_config::descriptor::parse_descriptor;
use ncfactory_config::{DataHolder, MatCfg, ParamId, RecordingSpy};
use ncfactory_primitives::{Info, NcError, Process, Result, RuntimeOptions, TextData, UniqueId, UniqueIdentifiable};
use ncfactory_registry::{AbsorptionRequest, FactoryRequest, InfoRequest, Registry, ScatterRequest, TextDataRequest};

use crate::signature::{ABSORPTION_PARAMS, INFO_PARAMS, SCATTER_PARAMS};

/// Cache key of a derived product: the identity of the object it was built
/// from plus the cache signature of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductKey {
	pub source: UniqueId,
	pub signature: String,
}

impl fmt::Display for ProductKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}|{}", self.source, self.signature)
	}
}

/// Cached text data, keyed by locator.
pub type TextDataHandle = CacheRef<String, TextData>;

/// Cached [`Info`], holding on to the text data it was resolved from.
#[derive(Clone)]
pub struct InfoHandle {
	info: CacheRef<ProductKey, Info>,
	data: Arc<TextData>,
	_holder: Option<DataHolder>,
}

impl InfoHandle {
	pub fn info(&self) -> &Arc<Info> {
		self.info.value()
	}

	pub fn key(&self) -> &ProductKey {
		self.info.key()
	}

	/// Text data the info was built from.
	pub fn text_data(&self) -> &Arc<TextData> {
		&self.data
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		self.info.ptr_eq(&other.info)
	}
}

impl fmt::Debug for InfoHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InfoHandle")
			.field("info", &self.info)
			.field("data", &self.data)
			.finish_non_exhaustive()
	}
}

impl Deref for InfoHandle {
	type Target = Info;

	fn deref(&self) -> &Info {
		&self.info
	}
}

/// A cached scatter or absorption process, holding on to its [`Info`].
#[derive(Debug, Clone)]
pub struct ProcessHandle {
	process: CacheRef<ProductKey, dyn Process>,
	info: InfoHandle,
}

impl ProcessHandle {
	pub fn process(&self) -> &Arc<dyn Process> {
		self.process.value()
	}

	pub fn info(&self) -> &InfoHandle {
		&self.info
	}

	pub fn key(&self) -> &ProductKey {
		self.process.key()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		self.process.ptr_eq(&other.process)
	}
}

impl Deref for ProcessHandle {
	type Target = dyn Process;

	fn deref(&self) -> &(dyn Process + 'static) {
		&*self.process
	}
}

enum RegistryRef {
	Global(&'static Registry),
	Owned(Arc<Registry>),
}

impl Deref for RegistryRef {
	type Target = Registry;

	fn deref(&self) -> &Registry {
		match self {
			Self::Global(registry) => registry,
			Self::Owned(registry) => registry,
		}
	}
}

/// Creates text data, [`Info`] and processes from configurations.
///
/// Every product is cached. Text data is keyed by locator; the other products
/// by their source object's [`UniqueId`] and the cache signature of the
/// parameters their capability may read (see [`crate::signature`]). A
/// provider that reads a parameter outside that set is rejected with
/// `CalcError`, since its products could otherwise be shared between
/// configurations it would treat differently.
///
/// Rows live while a handle to them does, unless the options retain caches
/// forever.
pub struct FactoryContext {
	registry: RegistryRef,
	text_data: DerivedCache<String, TextData>,
	infos: DerivedCache<ProductKey, Info>,
	scatters: DerivedCache<ProductKey, dyn Process>,
	absorptions: DerivedCache<ProductKey, dyn Process>,
}

impl FactoryContext {
	/// A context over its own registry.
	pub fn new(options: RuntimeOptions) -> Self {
		Self::with_registry(Arc::new(Registry::new(options)))
	}

	pub fn with_registry(registry: Arc<Registry>) -> Self {
		Self::from_ref(RegistryRef::Owned(registry))
	}

	/// A context over the process-wide registry.
	pub fn global() -> Self {
		Self::from_ref(RegistryRef::Global(ncfactory_registry::global()))
	}

	fn from_ref(registry: RegistryRef) -> Self {
		let options = CacheOptions::from(registry.options());
		Self {
			text_data: DerivedCache::new("text data", options),
			infos: DerivedCache::new("info", options),
			scatters: DerivedCache::new("scatter", options),
			absorptions: DerivedCache::new("absorption", options),
			registry,
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Resolves `locator` through the text-data sources.
	pub fn create_text_data(&self, locator: &str) -> Result<TextDataHandle> {
		self.text_data
			.get_or_build(locator.to_string(), |locator| self.registry.create(&TextDataRequest::new(locator)))
	}

	/// Parses `descriptor` against the text data its locator resolves to, so
	/// parameters embedded in the data apply.
	///
	/// The returned cfg and its clones hold the text-data row, so products
	/// derived from equal descriptors share one source identity.
	pub fn create_cfg(&self, descriptor: &str) -> Result<MatCfg> {
		let parsed = parse_descriptor(descriptor)?;
		let data = self.create_text_data(&parsed.locator)?;
		let mut cfg = MatCfg::parse_with_data(descriptor, Arc::clone(data.value()))?;
		cfg.set_data_holder(Arc::new(data));
		Ok(cfg)
	}

	pub fn create_info(&self, cfg: &MatCfg) -> Result<InfoHandle> {
		cfg.check_consistency()?;
		let (data, holder) = match cfg.text_data() {
			Some(data) => (Arc::clone(data), cfg.data_holder().cloned()),
			None => {
				let handle = self.create_text_data(cfg.locator())?;
				(Arc::clone(handle.value()), Some(Arc::new(handle) as DataHolder))
			}
		};
		let key = ProductKey {
			source: data.unique_id(),
			signature: cfg.cache_signature(INFO_PARAMS),
		};
		let info = self.infos.get_or_build(key, |_| {
			let request = InfoRequest::new(Arc::clone(&data), cfg.clone());
			self.produce(&request, request.cfg(), INFO_PARAMS)
		})?;
		Ok(InfoHandle {
			info,
			data,
			_holder: holder,
		})
	}

	pub fn create_scatter(&self, cfg: &MatCfg) -> Result<ProcessHandle> {
		let info = self.create_info(cfg)?;
		let key = ProductKey {
			source: info.unique_id(),
			signature: cfg.cache_signature(SCATTER_PARAMS),
		};
		let process = self.scatters.get_or_build(key, |_| {
			let request = ScatterRequest::new(Arc::clone(info.info()), cfg.clone());
			self.produce(&request, request.cfg(), SCATTER_PARAMS)
		})?;
		Ok(ProcessHandle { process, info })
	}

	pub fn create_absorption(&self, cfg: &MatCfg) -> Result<ProcessHandle> {
		let info = self.create_info(cfg)?;
		let key = ProductKey {
			source: info.unique_id(),
			signature: cfg.cache_signature(ABSORPTION_PARAMS),
		};
		let process = self.absorptions.get_or_build(key, |_| {
			let request = AbsorptionRequest::new(Arc::clone(info.info()), cfg.clone());
			self.produce(&request, request.cfg(), ABSORPTION_PARAMS)
		})?;
		Ok(ProcessHandle { process, info })
	}

	/// Selects a provider and has it build `request` while `cfg` records the
	/// parameters it reads.
	fn produce<R: FactoryRequest>(&self, request: &R, cfg: &MatCfg, allowed: &[ParamId]) -> Result<R::Product> {
		let factory = self.registry.select(request)?;
		let spy = RecordingSpy::new();
		let product = {
			let _spy = cfg.spy(spy.clone());
			factory.produce(request)?
		};

		let stray: Vec<&str> = spy
			.accessed()
			.into_iter()
			.filter(|p| !allowed.contains(p))
			.map(ParamId::name)
			.collect();
		if !stray.is_empty() {
			return Err(NcError::calc(format!(
				"{} factory \"{}\" read parameters outside its cache signature while building {}: {}",
				R::KIND,
				factory.name(),
				request.describe(),
				stray.join(", ")
			)));
		}

		tracing::debug!(kind = %R::KIND, factory = factory.name(), request = %request.describe(), "built product");
		Ok(product)
	}

	/// Drops every cached row. Outstanding handles stay usable.
	pub fn clear_caches(&self) {
		self.text_data.clear();
		self.infos.clear();
		self.scatters.clear();
		self.absorptions.clear();
		tracing::debug!("cleared factory caches");
	}

	/// Removes rows nobody holds. Only relevant when caches retain rows.
	pub fn clear_unused(&self) -> usize {
		self.text_data.clear_unused()
			+ self.infos.clear_unused()
			+ self.scatters.clear_unused()
			+ self.absorptions.clear_unused()
	}

	/// Statistics of each cache, labelled by capability.
	pub fn cache_stats(&self) -> [(&'static str, CacheStats); 4] {
		[
			(self.text_data.name(), self.text_data.stats()),
			(self.infos.name(), self.infos.stats()),
			(self.scatters.name(), self.scatters.stats()),
			(self.absorptions.name(), self.absorptions.stats()),
		]
	}
}

impl fmt::Debug for FactoryContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FactoryContext")
			.field("registry", &*self.registry)
			.field("text_data", &self.text_data)
			.field("infos", &self.infos)
			.field("scatters", &self.scatters)
			.field("absorptions", &self.absorptions)
			.finish()
	}
}
