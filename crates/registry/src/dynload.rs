//! Shared-library plugins, speaking the C ABI of `ncfactory-cabi`.

use std::ffi::CStr;
use std::path::Path;

use libloading::{Library, Symbol};
use ncfactory_cabi::{NcGetNameFn, NcRegisterFn, NcStatus};
use ncfactory_primitives::{NcError, Result};

use crate::host::HOST;
use crate::{Registry, active};

pub(crate) const GETNAME_SYMBOL: &str = "ncplugin_getname";
pub(crate) const REGISTER_SYMBOL: &str = "ncplugin_register";

/// An opened plugin library with both entry points resolved.
pub(crate) struct PluginLibrary {
	pub name: String,
	pub entry: NcRegisterFn,
}

impl PluginLibrary {
	/// Runs the library's registration against `registry`.
	///
	/// Fails if the plugin rejects the host's ABI version, reports anything
	/// but success, or had one of its registration calls refused.
	pub(crate) fn register(&self, registry: &Registry) -> Result<()> {
		let entry = self.entry;
		// SAFETY: resolved with the ABI's signature; the library stays loaded
		// for the rest of the process and `HOST` is static.
		let (status, errors) = active::with_active(registry, || unsafe { entry(&HOST) });
		if let Some(error) = errors.into_iter().next() {
			return Err(error);
		}
		match status {
			NcStatus::Ok => Ok(()),
			NcStatus::Incompatible => Err(NcError::calc(format!(
				"plugin \"{}\" does not support host ABI version {}",
				self.name,
				ncfactory_cabi::NC_ABI_VERSION
			))),
			NcStatus::Failed => Err(NcError::calc(format!("plugin \"{}\" failed to register", self.name))),
		}
	}
}

/// Opens `path` and resolves both entry points.
///
/// On success the library is never closed again: code it registered may run
/// until process exit.
pub(crate) fn open(path: &Path, explicit_name: Option<&str>) -> Result<PluginLibrary> {
	// SAFETY: loading a library runs its initializers; plugin libraries are
	// trusted by whoever put them on the plugin list.
	let lib = unsafe { Library::new(path) }.map_err(|e| {
		if path.exists() {
			NcError::calc(format!("failed to load plugin library {}: {e}", path.display()))
		} else {
			NcError::file_not_found(format!("plugin library {} not found: {e}", path.display()))
		}
	})?;

	let (reported, register) = {
		// SAFETY: the symbol types match the documented plugin ABI.
		let getname: Symbol<NcGetNameFn> = unsafe { lib.get(symbol(GETNAME_SYMBOL).as_bytes()) }
			.map_err(|e| missing_symbol(path, GETNAME_SYMBOL, &e))?;
		let register: Symbol<NcRegisterFn> = unsafe { lib.get(symbol(REGISTER_SYMBOL).as_bytes()) }
			.map_err(|e| missing_symbol(path, REGISTER_SYMBOL, &e))?;
		(*getname, *register)
	};

	let name = match explicit_name {
		Some(name) if !name.is_empty() => name.to_string(),
		_ => {
			// SAFETY: resolved above with the ABI's signature.
			let raw = unsafe { reported() };
			if raw.is_null() {
				return Err(NcError::calc(format!(
					"{GETNAME_SYMBOL} in {} returned a null pointer",
					path.display()
				)));
			}
			// SAFETY: the ABI requires a NUL-terminated string with static lifetime.
			let name = unsafe { CStr::from_ptr(raw) };
			let name = name.to_str().map_err(|_| {
				NcError::calc(format!("{GETNAME_SYMBOL} in {} returned invalid UTF-8", path.display()))
			})?;
			if name.is_empty() {
				return Err(NcError::calc(format!("{GETNAME_SYMBOL} in {} returned an empty name", path.display())));
			}
			name.to_string()
		}
	};

	std::mem::forget(lib);
	Ok(PluginLibrary { name, entry: register })
}

fn symbol(name: &str) -> String {
	format!("{name}\0")
}

fn missing_symbol(path: &Path, symbol: &str, err: &libloading::Error) -> NcError {
	NcError::calc(format!("plugin library {} does not export {symbol}: {err}", path.display()))
}
