//! Host side of the plugin C ABI: the callback table handed to
//! `ncplugin_register`, and adapters presenting foreign factories and
//! processes as ordinary [`Factory`] and [`Process`] objects.

use std::cell::RefCell;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use ncfactory_cabi::{
	NC_ABI_VERSION, NcHostV1, NcInfoField, NcLogLevel, NcProcessFactoryV1, NcProcessKind, NcProcessV1, NcRequestV1,
	NcStatus, NcStr,
};
use ncfactory_config::{MatCfg, ParamId, ParamValue};
use ncfactory_primitives::{Info, NcError, Process, Result};

use crate::active;
use crate::factory::{AbsorptionRequest, Factory, FactoryRequest, ScatterRequest};

/// Callback table passed to every `ncplugin_register`.
pub(crate) static HOST: NcHostV1 = NcHostV1 {
	abi_version: NC_ABI_VERSION,
	log: host_log,
	register_process_factory: host_register_process_factory,
	register_virtual_file: host_register_virtual_file,
};

/// Plugin-owned pointer the ABI requires to be usable from any thread.
#[derive(Clone, Copy)]
struct PluginPtr(*mut c_void);

// SAFETY: `NcProcessFactoryV1::user_data` and `NcProcessV1::user_data` must be
// thread-safe per the ABI.
unsafe impl Send for PluginPtr {}
unsafe impl Sync for PluginPtr {}

extern "C" fn host_log(level: NcLogLevel, message: NcStr) {
	// SAFETY: valid for the duration of this call per the ABI.
	let Some(message) = (unsafe { message.as_str() }) else {
		return;
	};
	match level {
		NcLogLevel::Error => tracing::error!(target: "ncfactory::plugin", "{message}"),
		NcLogLevel::Warn => tracing::warn!(target: "ncfactory::plugin", "{message}"),
		NcLogLevel::Info => tracing::info!(target: "ncfactory::plugin", "{message}"),
		NcLogLevel::Debug => tracing::debug!(target: "ncfactory::plugin", "{message}"),
	}
}

extern "C" fn host_register_process_factory(factory: *const NcProcessFactoryV1) -> NcStatus {
	// SAFETY: a non-null descriptor is valid for the duration of this call.
	let Some(desc) = (unsafe { factory.as_ref() }) else {
		return report(NcError::calc("plugin passed a null process factory"));
	};
	// SAFETY: valid for the duration of this call per the ABI.
	let name = match unsafe { desc.name.as_str() } {
		Some(name) if !name.is_empty() => name.to_string(),
		_ => return report(NcError::calc("plugin process factory has an empty or invalid name")),
	};
	let factory = ForeignFactory {
		name,
		priority: desc.priority,
		user_data: PluginPtr(desc.user_data),
		can_handle: desc.can_handle,
		produce: desc.produce,
	};
	let reached = active::register_with(|registry| match desc.kind {
		NcProcessKind::Scatter => registry.register_factory::<ScatterRequest, _>(factory),
		NcProcessKind::Absorption => registry.register_factory::<AbsorptionRequest, _>(factory),
	});
	status_of(reached)
}

extern "C" fn host_register_virtual_file(name: NcStr, content: NcStr) -> NcStatus {
	// SAFETY: both are valid for the duration of this call per the ABI.
	let (Some(name), Some(content)) = (unsafe { name.as_str() }, unsafe { content.as_str() }) else {
		return report(NcError::calc("plugin passed a virtual file with invalid UTF-8"));
	};
	let reached = active::register_with(|registry| {
		registry.register_virtual_file(name, content);
		Ok(())
	});
	status_of(reached)
}

/// Fails the surrounding load with `error`.
fn report(error: NcError) -> NcStatus {
	status_of(active::register_with(|_| Err(error)))
}

fn status_of(reached: Option<Result<()>>) -> NcStatus {
	match reached {
		Some(Ok(())) => NcStatus::Ok,
		_ => NcStatus::Failed,
	}
}

/// Requests a foreign process factory can serve.
trait ProcessRequest: FactoryRequest<Product = Arc<dyn Process>> {
	fn info(&self) -> &Arc<Info>;
	fn cfg(&self) -> &MatCfg;
}

impl ProcessRequest for ScatterRequest {
	fn info(&self) -> &Arc<Info> {
		ScatterRequest::info(self)
	}

	fn cfg(&self) -> &MatCfg {
		ScatterRequest::cfg(self)
	}
}

impl ProcessRequest for AbsorptionRequest {
	fn info(&self) -> &Arc<Info> {
		AbsorptionRequest::info(self)
	}

	fn cfg(&self) -> &MatCfg {
		AbsorptionRequest::cfg(self)
	}
}

type CanHandleFn = extern "C" fn(*mut c_void, *const NcRequestV1) -> bool;
type ProduceFn = extern "C" fn(*mut c_void, *const NcRequestV1, *mut NcProcessV1) -> NcStatus;

struct ForeignFactory {
	name: String,
	priority: i16,
	user_data: PluginPtr,
	can_handle: CanHandleFn,
	produce: ProduceFn,
}

impl<R: ProcessRequest> Factory<R> for ForeignFactory {
	fn name(&self) -> &str {
		&self.name
	}

	fn priority(&self) -> i16 {
		self.priority
	}

	fn can_handle(&self, request: &R) -> bool {
		let view = RequestView::new(request.cfg(), request.info());
		(self.can_handle)(self.user_data.0, &view.abi())
	}

	fn produce(&self, request: &R) -> Result<Arc<dyn Process>> {
		let view = RequestView::new(request.cfg(), request.info());
		let mut out = NcProcessV1 {
			user_data: std::ptr::null_mut(),
			name: NcStr::EMPTY,
			cross_section: unavailable_cross_section,
			destroy: None,
		};
		let status = (self.produce)(self.user_data.0, &view.abi(), &mut out);
		if status != NcStatus::Ok {
			return Err(NcError::calc(format!(
				"plugin factory \"{}\" failed to build {} ({status:?})",
				self.name,
				request.describe()
			)));
		}
		Ok(Arc::new(ForeignProcess::adopt(out)?))
	}
}

extern "C" fn unavailable_cross_section(_: *mut c_void, _: f64) -> f64 {
	f64::NAN
}

/// A process owned by a plugin, destroyed through the plugin when dropped.
struct ForeignProcess {
	name: String,
	user_data: PluginPtr,
	cross_section: extern "C" fn(*mut c_void, f64) -> f64,
	destroy: Option<extern "C" fn(*mut c_void)>,
}

impl ForeignProcess {
	/// Takes ownership of `raw`. A rejected process is handed straight back
	/// to the plugin's `destroy`.
	fn adopt(raw: NcProcessV1) -> Result<Self> {
		let mut process = Self {
			name: String::new(),
			user_data: PluginPtr(raw.user_data),
			cross_section: raw.cross_section,
			destroy: raw.destroy,
		};
		// SAFETY: valid until `destroy` per the ABI.
		match unsafe { raw.name.as_str() } {
			Some(name) if !name.is_empty() => {
				process.name = name.to_string();
				Ok(process)
			}
			_ => Err(NcError::calc("plugin process has an empty or invalid name")),
		}
	}
}

impl Process for ForeignProcess {
	fn name(&self) -> &str {
		&self.name
	}

	fn cross_section(&self, ekin: f64) -> f64 {
		(self.cross_section)(self.user_data.0, ekin)
	}
}

impl Drop for ForeignProcess {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy {
			destroy(self.user_data.0);
		}
	}
}

impl fmt::Debug for ForeignProcess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ForeignProcess").field("name", &self.name).finish_non_exhaustive()
	}
}

/// Backing state of one [`NcRequestV1`].
struct RequestView<'a> {
	cfg: &'a MatCfg,
	info: &'a Info,
	/// Strings handed out by `param_text`, alive until the view drops.
	texts: RefCell<Vec<String>>,
}

impl<'a> RequestView<'a> {
	fn new(cfg: &'a MatCfg, info: &'a Info) -> Self {
		Self {
			cfg,
			info,
			texts: RefCell::new(Vec::new()),
		}
	}

	fn abi(&self) -> NcRequestV1 {
		NcRequestV1 {
			ctx: self as *const Self as *const c_void,
			locator: NcStr::borrowed(self.cfg.locator()),
			param_f64: request_param_f64,
			param_text: request_param_text,
			info_f64: request_info_f64,
		}
	}

	/// # Safety
	/// `ctx` must come from [`RequestView::abi`] on a view that is still alive.
	unsafe fn from_ctx<'v>(ctx: *const c_void) -> &'v RequestView<'v> {
		unsafe { &*(ctx as *const RequestView<'v>) }
	}

	fn param(&self, name: NcStr) -> Option<(ParamId, ParamValue)> {
		// SAFETY: valid for the duration of the callback per the ABI.
		let name = unsafe { name.as_str() }?;
		let param = ParamId::from_name(name)?;
		self.cfg.get(param).map(|value| (param, value))
	}
}

extern "C" fn request_param_f64(ctx: *const c_void, name: NcStr, out: *mut f64) -> NcStatus {
	// SAFETY: the plugin passes back the ctx of the request it was given.
	let view = unsafe { RequestView::from_ctx(ctx) };
	match view.param(name).and_then(|(_, value)| value.as_f64()) {
		Some(v) if !out.is_null() => {
			// SAFETY: non-null output pointer supplied by the plugin.
			unsafe { out.write(v) };
			NcStatus::Ok
		}
		_ => NcStatus::Failed,
	}
}

extern "C" fn request_param_text(ctx: *const c_void, name: NcStr, out: *mut NcStr) -> NcStatus {
	// SAFETY: the plugin passes back the ctx of the request it was given.
	let view = unsafe { RequestView::from_ctx(ctx) };
	let Some((param, value)) = view.param(name) else {
		return NcStatus::Failed;
	};
	if out.is_null() {
		return NcStatus::Failed;
	}
	let mut texts = view.texts.borrow_mut();
	texts.push(param.render(&value));
	let Some(text) = texts.last() else {
		return NcStatus::Failed;
	};
	// SAFETY: the string's buffer lives in the view until the factory call
	// returns; later pushes move the `String` but not its buffer.
	unsafe { out.write(NcStr::borrowed(text)) };
	NcStatus::Ok
}

extern "C" fn request_info_f64(ctx: *const c_void, field: NcInfoField, out: *mut f64) -> NcStatus {
	// SAFETY: the plugin passes back the ctx of the request it was given.
	let view = unsafe { RequestView::from_ctx(ctx) };
	let value = match field {
		NcInfoField::Temperature => view.info.temperature(),
		NcInfoField::AbsorptionXs => view.info.absorption_xs(),
		NcInfoField::FreeScatteringXs => view.info.free_scattering_xs(),
	};
	match value {
		Some(v) if !out.is_null() => {
			// SAFETY: non-null output pointer supplied by the plugin.
			unsafe { out.write(v) };
			NcStatus::Ok
		}
		_ => NcStatus::Failed,
	}
}
