//! Minimal shared-library plugin speaking the ncfactory C ABI.
//!
//! Registers the `demo-flat` scatter model, the `demo-abs` absorption model
//! and the virtual data file `demo.ncmat`. Both models have a constant cross
//! section: `temp / 100` barn for scattering, the material's absorption cross
//! section for absorption.

use std::ffi::{c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use ncfactory_cabi::{
	NC_ABI_VERSION, NcHostV1, NcInfoField, NcLogLevel, NcProcessFactoryV1, NcProcessKind, NcProcessV1, NcRequestV1,
	NcStatus, NcStr,
};

pub const PLUGIN_NAME: &str = "demoplugin";
pub const SCATTER_FACTORY: &str = "demo-flat";
pub const ABSORPTION_FACTORY: &str = "demo-abs";
pub const DATA_FILE: &str = "demo.ncmat";
pub const DATA: &str = "# NCMATCFG[temp=77]\nabsorption 1.5\n";

static LIVE_PROCESSES: AtomicUsize = AtomicUsize::new(0);

#[unsafe(no_mangle)]
pub extern "C" fn ncplugin_getname() -> *const c_char {
	c"demoplugin".as_ptr()
}

/// # Safety
/// `host` must be null or point to a host table that is valid for the
/// duration of this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ncplugin_register(host: *const NcHostV1) -> NcStatus {
	let Some(host) = (unsafe { host.as_ref() }) else {
		return NcStatus::Failed;
	};
	if host.abi_version != NC_ABI_VERSION {
		return NcStatus::Incompatible;
	}
	(host.log)(NcLogLevel::Debug, NcStr::from_static("registering demo providers"));

	let scatter = NcProcessFactoryV1 {
		kind: NcProcessKind::Scatter,
		name: NcStr::from_static(SCATTER_FACTORY),
		priority: 150,
		user_data: ptr::null_mut(),
		can_handle: handles_ncmat,
		produce: produce_flat,
	};
	let absorption = NcProcessFactoryV1 {
		kind: NcProcessKind::Absorption,
		name: NcStr::from_static(ABSORPTION_FACTORY),
		priority: 50,
		user_data: ptr::null_mut(),
		can_handle: handles_ncmat,
		produce: produce_absorption,
	};

	let status = (host.register_virtual_file)(NcStr::from_static(DATA_FILE), NcStr::from_static(DATA));
	if status != NcStatus::Ok {
		return status;
	}
	for factory in [&scatter, &absorption] {
		let status = (host.register_process_factory)(factory);
		if status != NcStatus::Ok {
			return status;
		}
	}
	NcStatus::Ok
}

/// Processes built by this library that the host has not destroyed yet.
#[unsafe(no_mangle)]
pub extern "C" fn demo_live_processes() -> usize {
	LIVE_PROCESSES.load(Ordering::SeqCst)
}

extern "C" fn handles_ncmat(_: *mut c_void, request: *const NcRequestV1) -> bool {
	// SAFETY: the host passes a request valid for this call.
	let Some(request) = (unsafe { request.as_ref() }) else {
		return false;
	};
	// SAFETY: the locator lives as long as the request.
	unsafe { request.locator.as_str() }.is_some_and(|locator| locator.ends_with(".ncmat"))
}

extern "C" fn produce_flat(_: *mut c_void, request: *const NcRequestV1, out: *mut NcProcessV1) -> NcStatus {
	// SAFETY: the host passes a request valid for this call.
	let Some(request) = (unsafe { request.as_ref() }) else {
		return NcStatus::Failed;
	};
	let mut temp = 0.0;
	let status = (request.param_f64)(request.ctx, NcStr::from_static("temp"), &mut temp);
	if status != NcStatus::Ok {
		return status;
	}
	// SAFETY: `out` comes from the host.
	unsafe { emit(out, "DemoFlat", temp / 100.0) }
}

extern "C" fn produce_absorption(_: *mut c_void, request: *const NcRequestV1, out: *mut NcProcessV1) -> NcStatus {
	// SAFETY: the host passes a request valid for this call.
	let Some(request) = (unsafe { request.as_ref() }) else {
		return NcStatus::Failed;
	};
	let mut xs = 0.0;
	let status = (request.info_f64)(request.ctx, NcInfoField::AbsorptionXs, &mut xs);
	if status != NcStatus::Ok {
		return status;
	}
	// SAFETY: `out` comes from the host.
	unsafe { emit(out, "DemoAbs", xs) }
}

/// # Safety
/// `out` must be null or valid for writes.
unsafe fn emit(out: *mut NcProcessV1, name: &'static str, xs: f64) -> NcStatus {
	if out.is_null() {
		return NcStatus::Failed;
	}
	LIVE_PROCESSES.fetch_add(1, Ordering::SeqCst);
	let process = NcProcessV1 {
		user_data: Box::into_raw(Box::new(xs)).cast(),
		name: NcStr::from_static(name),
		cross_section: constant_cross_section,
		destroy: Some(destroy_constant),
	};
	unsafe { out.write(process) };
	NcStatus::Ok
}

extern "C" fn constant_cross_section(user_data: *mut c_void, _ekin: f64) -> f64 {
	// SAFETY: `user_data` is the box allocated in `emit`, alive until destroyed.
	unsafe { *user_data.cast::<f64>() }
}

extern "C" fn destroy_constant(user_data: *mut c_void) {
	// SAFETY: called once per process with the box allocated in `emit`.
	drop(unsafe { Box::from_raw(user_data.cast::<f64>()) });
	LIVE_PROCESSES.fetch_sub(1, Ordering::SeqCst);
}
