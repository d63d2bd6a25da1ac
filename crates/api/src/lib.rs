//! Configuration-driven object creation.
//!
//! A [`FactoryContext`] turns a descriptor such as `"Al_sg225.ncmat;temp=20C"`
//! into text data, material [`Info`] and physics processes. Each step is served
//! by the factory the [`Registry`] selects and is cached by the identity of its
//! source object plus the cache signature of the parameters that step may read:
//!
//! ```ignore
//! let ctx = FactoryContext::new(RuntimeOptions::from_env()?);
//! let cfg = ctx.create_cfg("Al_sg225.ncmat;temp=20C")?;
//! let absorption = ctx.create_absorption(&cfg)?;
//! println!("{}", absorption.cross_section(0.0253));
//! ```

mod context;
/// Parameters each capability's products may depend on.
pub mod signature;

pub use context::{FactoryContext, InfoHandle, ProcessHandle, ProductKey, TextDataHandle};
pub use ncfactory_cache::{CacheOptions, CacheRef, CacheStats, DerivedCache};
pub use ncfactory_config::{AccessSpy, MatCfg, OrientDir, ParamId, ParamValue, RecordingSpy, ScOrientation};
pub use ncfactory_primitives::{
	ErrorKind, Info, NcError, Process, Result, RuntimeOptions, TextData, UniqueId, UniqueIdentifiable,
};
pub use ncfactory_registry::{
	AbsorptionRequest, BuiltinPlugin, Factory, FactoryKind, FactoryRequest, InfoRequest, PluginKind, PluginRecord,
	Registry, RegistryBuilder, ScatterRequest, TextDataRequest,
};
