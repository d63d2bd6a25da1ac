//! Access spies observe parameter reads on a [`crate::MatCfg`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::param::ParamId;

/// Receives a callback for every parameter read while attached.
pub trait AccessSpy: Send + Sync {
	fn param_accessed(&self, param: ParamId);
}

/// Spy that remembers the set of parameters read.
#[derive(Default)]
pub struct RecordingSpy {
	seen: Mutex<BTreeSet<ParamId>>,
}

impl RecordingSpy {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Parameters read so far, in canonical order.
	pub fn accessed(&self) -> Vec<ParamId> {
		self.seen.lock().iter().copied().collect()
	}

	pub fn clear(&self) {
		self.seen.lock().clear();
	}
}

impl AccessSpy for RecordingSpy {
	fn param_accessed(&self, param: ParamId) {
		self.seen.lock().insert(param);
	}
}

impl fmt::Debug for RecordingSpy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RecordingSpy").field("accessed", &self.accessed()).finish()
	}
}

pub(crate) type SpyList = Mutex<Vec<Arc<dyn AccessSpy>>>;

/// Spies are compared by allocation, never by value.
pub(crate) fn same_spy(a: &Arc<dyn AccessSpy>, b: &Arc<dyn AccessSpy>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
