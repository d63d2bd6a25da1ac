//! While a shared library's `ncplugin_register` runs, the loading registry is
//! installed as the thread's *active* registry. The host callbacks handed to
//! the plugin reach it through [`register_with`]; errors reported there fail
//! the load of that library.

use std::cell::{Cell, RefCell};

use ncfactory_primitives::{NcError, Result};

use crate::Registry;

thread_local! {
	static ACTIVE: Cell<Option<*const Registry>> = const { Cell::new(None) };
	static ERRORS: RefCell<Vec<NcError>> = const { RefCell::new(Vec::new()) };
}

/// Runs `f` with `registry` active on this thread and returns the errors
/// reported through [`register_with`] meanwhile. Scopes nest.
pub(crate) fn with_active<T>(registry: &Registry, f: impl FnOnce() -> T) -> (T, Vec<NcError>) {
	struct Restore {
		registry: Option<*const Registry>,
		errors: Vec<NcError>,
	}
	impl Drop for Restore {
		fn drop(&mut self) {
			ACTIVE.with(|a| a.set(self.registry));
			let outer = std::mem::take(&mut self.errors);
			ERRORS.with(|e| *e.borrow_mut() = outer);
		}
	}

	let restore = Restore {
		registry: ACTIVE.with(|a| a.replace(Some(registry as *const Registry))),
		errors: ERRORS.with(|e| std::mem::take(&mut *e.borrow_mut())),
	};
	let out = f();
	let reported = ERRORS.with(|e| std::mem::take(&mut *e.borrow_mut()));
	drop(restore);
	(out, reported)
}

/// True while a registry is loading a shared library on this thread.
#[cfg(test)]
pub(crate) fn is_active() -> bool {
	ACTIVE.with(|a| a.get().is_some())
}

/// Calls `f` with the active registry and returns its result, or `None`
/// when no load is in progress on this thread.
///
/// An error from `f` is logged and also fails the surrounding plugin load.
pub(crate) fn register_with(f: impl FnOnce(&Registry) -> Result<()>) -> Option<Result<()>> {
	let Some(ptr) = ACTIVE.with(|a| a.get()) else {
		tracing::error!("plugin registration attempted outside of a plugin load");
		return None;
	};
	// SAFETY: the pointer is installed by `with_active` from a live reference
	// and removed before that borrow ends.
	let registry = unsafe { &*ptr };
	let result = f(registry);
	if let Err(e) = &result {
		tracing::error!(error = %e, "plugin registration failed");
		ERRORS.with(|errors| errors.borrow_mut().push(e.clone()));
	}
	Some(result)
}
