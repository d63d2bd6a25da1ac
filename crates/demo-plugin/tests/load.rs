//! Loads the built demo library through the registry's dynamic loader.

use std::path::PathBuf;
use std::sync::Arc;

use libloading::{Library, Symbol};
use ncfactory_config::{MatCfg, ParamId, RecordingSpy};
use ncfactory_demo_plugin::{ABSORPTION_FACTORY, DATA, DATA_FILE, PLUGIN_NAME, SCATTER_FACTORY};
use ncfactory_primitives::{ErrorKind, Info, RuntimeOptions};
use ncfactory_registry::{AbsorptionRequest, FactoryKind, PluginKind, Registry, ScatterRequest, TextDataRequest};

/// The cdylib cargo builds alongside this test binary.
fn library_path() -> PathBuf {
	let file = format!(
		"{}ncfactory_demo_plugin{}",
		std::env::consts::DLL_PREFIX,
		std::env::consts::DLL_SUFFIX
	);
	let exe = std::env::current_exe().unwrap();
	exe.ancestors()
		.skip(1)
		.take(2)
		.map(|dir| dir.join(&file))
		.find(|candidate| candidate.exists())
		.unwrap_or_else(|| panic!("{file} not found next to {}", exe.display()))
}

fn loaded_names(reg: &Registry) -> Vec<String> {
	reg.list_loaded().into_iter().map(|p| p.name).collect()
}

fn demo_info() -> Arc<Info> {
	Arc::new(Info::builder().temperature(77.0).absorption_xs(1.5).build())
}

/// Loading resolves both entry points and registers every provider.
#[test]
fn test_load_registers_providers() {
	let _ = tracing_subscriber::fmt::try_init();
	let path = library_path();
	let reg = Registry::new(RuntimeOptions {
		verbose_plugin_load: true,
		..RuntimeOptions::default()
	});

	let record = reg.load_dynamic(&path, None).unwrap();
	assert_eq!(record.name, PLUGIN_NAME);
	assert_eq!(record.kind, PluginKind::Dynamic);
	assert_eq!(record.file.as_deref(), Some(path.as_path()));
	assert_eq!(record.entry_point, "ncplugin_register");
	assert_eq!(loaded_names(&reg).last().map(String::as_str), Some(PLUGIN_NAME));

	assert_eq!(reg.list_factories(FactoryKind::Scatter), [SCATTER_FACTORY]);
	assert_eq!(reg.list_factories(FactoryKind::Absorption), ["stdabs", ABSORPTION_FACTORY]);

	let data = reg.create(&TextDataRequest::new(DATA_FILE)).unwrap();
	assert_eq!(data.content(), DATA);
	assert_eq!(data.data_source(), "virtual");
}

/// Processes built across the boundary evaluate through the plugin, read the
/// cfg through the host, and are handed back to the plugin when dropped.
#[test]
fn test_foreign_processes() {
	let path = library_path();
	let reg = Registry::default();
	reg.load_dynamic(&path, None).unwrap();

	// SAFETY: the library is already loaded; this only resolves a symbol.
	let library = unsafe { Library::new(&path) }.unwrap();
	let live: Symbol<extern "C" fn() -> usize> = unsafe { library.get(b"demo_live_processes\0") }.unwrap();
	let before = live();

	let data = reg.create(&TextDataRequest::new(DATA_FILE)).unwrap();
	let cfg = MatCfg::parse_with_data(DATA_FILE, data).unwrap();
	let spy = RecordingSpy::new();
	let request = ScatterRequest::new(demo_info(), cfg.clone());
	let scatter = {
		let _spy = request.cfg().spy(spy.clone());
		reg.create(&request).unwrap()
	};
	assert_eq!(scatter.name(), "DemoFlat");
	assert!((scatter.cross_section(0.025) - 0.77).abs() < 1e-12);
	assert!(spy.accessed().contains(&ParamId::Temp));

	let absorption = reg.create(&AbsorptionRequest::new(demo_info(), cfg.clone())).unwrap();
	assert_eq!(absorption.name(), "AbsOOV");

	let mut forced = cfg.clone();
	forced.set_absorptionfactory(ABSORPTION_FACTORY).unwrap();
	let foreign = reg.create(&AbsorptionRequest::new(demo_info(), forced.clone())).unwrap();
	assert_eq!(foreign.name(), "DemoAbs");
	assert_eq!(foreign.cross_section(1.0), 1.5);
	assert_eq!(live(), before + 2);

	drop(scatter);
	drop(foreign);
	assert_eq!(live(), before);

	let bare = Arc::new(Info::builder().build());
	let err = reg.create(&AbsorptionRequest::new(bare, forced)).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CalcError);
	assert!(err.message().contains(ABSORPTION_FACTORY));
	assert_eq!(live(), before);
}

/// A second load under a used name fails and leaves one record; a load
/// whose registration is refused fails without a record.
#[test]
fn test_name_collisions() {
	let path = library_path();
	let reg = Registry::default();
	reg.load_dynamic(&path, None).unwrap();

	let err = reg.load_dynamic(&path, None).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CalcError);
	let names = loaded_names(&reg);
	assert_eq!(names.iter().filter(|n| *n == PLUGIN_NAME).count(), 1);

	let err = reg.load_dynamic(&path, Some("demo-again")).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CalcError);
	assert!(err.message().contains(SCATTER_FACTORY), "{}", err.message());
	assert!(!loaded_names(&reg).contains(&"demo-again".to_string()));
	assert_eq!(reg.list_factories(FactoryKind::Scatter), [SCATTER_FACTORY]);
}

/// An explicit name replaces the exported one; an empty one does not.
#[test]
fn test_explicit_name() {
	let path = library_path();

	let reg = Registry::default();
	assert_eq!(reg.load_dynamic(&path, Some("renamed")).unwrap().name, "renamed");
	assert!(!loaded_names(&reg).contains(&PLUGIN_NAME.to_string()));

	let reg = Registry::default();
	assert_eq!(reg.load_dynamic(&path, Some("")).unwrap().name, PLUGIN_NAME);
}

/// Libraries on the plugin list load last during bootstrap.
#[test]
fn test_plugin_list_loads_library() {
	let path = library_path();
	let reg = Registry::new(RuntimeOptions {
		extra_plugin_paths: vec![path.display().to_string()],
		..RuntimeOptions::default()
	});

	let loaded = reg.list_loaded();
	assert!(reg.bootstrap_failures().is_empty());
	let last = loaded.last().unwrap();
	assert_eq!(last.name, PLUGIN_NAME);
	assert_eq!(last.kind, PluginKind::Dynamic);
	assert_eq!(loaded.iter().filter(|p| p.kind == PluginKind::Builtin).count(), loaded.len() - 1);
	assert_eq!(reg.list_factories(FactoryKind::Scatter), [SCATTER_FACTORY]);
}
