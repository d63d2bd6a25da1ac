#![allow(non_camel_case_types)]
//! C ABI between an ncfactory host and its shared-library plugins.
//!
//! A plugin library exports two C symbols:
//!
//! - `ncplugin_getname`: [`NcGetNameFn`], returning a NUL-terminated name
//!   with static lifetime
//! - `ncplugin_register`: [`NcRegisterFn`], called once with the host's
//!   [`NcHostV1`] table and registering the plugin's providers through it
//!
//! Plugins depend on this crate only. Everything crossing the boundary is
//! `#[repr(C)]`, so host and plugin need not share a compiler or any Rust
//! types.
//!
//! ```ignore
//! #[unsafe(no_mangle)]
//! pub extern "C" fn ncplugin_getname() -> *const c_char {
//!     c"myplugin".as_ptr()
//! }
//!
//! #[unsafe(no_mangle)]
//! pub unsafe extern "C" fn ncplugin_register(host: *const NcHostV1) -> NcStatus {
//!     let Some(host) = (unsafe { host.as_ref() }) else { return NcStatus::Failed };
//!     if host.abi_version != NC_ABI_VERSION {
//!         return NcStatus::Incompatible;
//!     }
//!     (host.register_process_factory)(&MY_FACTORY)
//! }
//! ```

use core::ffi::{c_char, c_void};

/// Bumped on every incompatible change to the types below.
pub const NC_ABI_VERSION: u32 = 1;

/// Exported as `ncplugin_getname`.
pub type NcGetNameFn = unsafe extern "C" fn() -> *const c_char;

/// Exported as `ncplugin_register`.
pub type NcRegisterFn = unsafe extern "C" fn(host: *const NcHostV1) -> NcStatus;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcStatus {
	Ok = 0,
	Failed = 1,
	Incompatible = 2,
}

/// Borrowed UTF-8 string. Valid for the duration of the call it is passed to
/// unless stated otherwise.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NcStr {
	pub ptr: *const u8,
	pub len: usize,
}

impl NcStr {
	pub const EMPTY: NcStr = NcStr {
		ptr: core::ptr::null(),
		len: 0,
	};

	pub const fn from_static(s: &'static str) -> Self {
		Self {
			ptr: s.as_ptr(),
			len: s.len(),
		}
	}

	/// Borrows `s`. The caller keeps `s` alive while the result is in use.
	pub fn borrowed(s: &str) -> Self {
		Self {
			ptr: s.as_ptr(),
			len: s.len(),
		}
	}

	/// # Safety
	/// `ptr` and `len` must describe memory that is valid for `'a`. A null
	/// `ptr` reads as the empty string.
	pub unsafe fn as_str<'a>(self) -> Option<&'a str> {
		if self.ptr.is_null() {
			return Some("");
		}
		let bytes = unsafe { core::slice::from_raw_parts(self.ptr, self.len) };
		core::str::from_utf8(bytes).ok()
	}
}

/// Capability of a process factory.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcProcessKind {
	Scatter = 0,
	Absorption = 1,
}

/// Material quantity a process factory may read from the request's info.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcInfoField {
	/// Kelvin.
	Temperature = 0,
	/// Barn at 2200 m/s.
	AbsorptionXs = 1,
	/// Barn.
	FreeScatteringXs = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcLogLevel {
	Error = 0,
	Warn = 1,
	Info = 2,
	Debug = 3,
}

/// A scatter or absorption request as seen by a plugin. Only valid during
/// the factory call it is passed to.
///
/// Parameter reads go through the host and count as reads of the request's
/// configuration, exactly like reads made by in-process factories.
#[repr(C)]
pub struct NcRequestV1 {
	pub ctx: *const c_void,
	/// Data locator of the configuration.
	pub locator: NcStr,
	/// Numeric value of parameter `name`, defaults included.
	pub param_f64: extern "C" fn(ctx: *const c_void, name: NcStr, out: *mut f64) -> NcStatus,
	/// Value of parameter `name` in descriptor form. The string stays valid
	/// until the factory call returns.
	pub param_text: extern "C" fn(ctx: *const c_void, name: NcStr, out: *mut NcStr) -> NcStatus,
	/// Fails when the info does not carry `field`.
	pub info_f64: extern "C" fn(ctx: *const c_void, field: NcInfoField, out: *mut f64) -> NcStatus,
}

/// A process built by a plugin. The host owns it from the moment `produce`
/// returns and calls `destroy` once, when the last user is gone.
#[repr(C)]
pub struct NcProcessV1 {
	pub user_data: *mut c_void,
	/// Model name. Must stay valid until `destroy`.
	pub name: NcStr,
	/// Cross section in barn at `ekin` eV. Called from any thread.
	pub cross_section: extern "C" fn(user_data: *mut c_void, ekin: f64) -> f64,
	pub destroy: Option<extern "C" fn(user_data: *mut c_void)>,
}

/// A process factory registered through [`NcHostV1::register_process_factory`].
///
/// The host copies the descriptor and its name. `user_data` must stay valid
/// for the rest of the process and be safe to use from any thread.
#[repr(C)]
pub struct NcProcessFactoryV1 {
	pub kind: NcProcessKind,
	pub name: NcStr,
	/// Higher wins among the factories able to handle a request.
	pub priority: i16,
	pub user_data: *mut c_void,
	pub can_handle: extern "C" fn(user_data: *mut c_void, request: *const NcRequestV1) -> bool,
	/// Writes the built process to `out` and returns [`NcStatus::Ok`], or
	/// returns any other status with `out` untouched.
	pub produce: extern "C" fn(user_data: *mut c_void, request: *const NcRequestV1, out: *mut NcProcessV1) -> NcStatus,
}

/// Host services available while `ncplugin_register` runs. Registration
/// calls made after it returns fail.
#[repr(C)]
pub struct NcHostV1 {
	pub abi_version: u32,
	pub log: extern "C" fn(level: NcLogLevel, message: NcStr),
	pub register_process_factory: extern "C" fn(factory: *const NcProcessFactoryV1) -> NcStatus,
	/// Serves `content` as `name` from the host's `virtual` data source.
	pub register_virtual_file: extern "C" fn(name: NcStr, content: NcStr) -> NcStatus,
}
