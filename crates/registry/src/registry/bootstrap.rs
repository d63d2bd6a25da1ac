use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

/// One-shot gate in front of plugin bootstrap.
///
/// The first caller wins an atomic test-and-set and runs the bootstrap.
/// Reentrant calls from that thread pass straight through; other threads
/// park until the bootstrap has finished.
#[derive(Default)]
pub(super) struct BootstrapGate {
	started: AtomicBool,
	finished: AtomicBool,
	loader: Mutex<Option<ThreadId>>,
	done: Mutex<bool>,
	cond: Condvar,
}

pub(super) enum Entry {
	/// This caller must run the bootstrap, then call [`BootstrapGate::finish`].
	Leader,
	/// Bootstrap already completed, or is running further up this thread's stack.
	Proceed,
}

impl BootstrapGate {
	pub(super) fn enter(&self) -> Entry {
		if self.finished.load(Ordering::Acquire) {
			return Entry::Proceed;
		}
		if self
			.started
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
		{
			*self.loader.lock() = Some(thread::current().id());
			return Entry::Leader;
		}
		if *self.loader.lock() == Some(thread::current().id()) {
			return Entry::Proceed;
		}
		let mut done = self.done.lock();
		while !*done {
			self.cond.wait(&mut done);
		}
		Entry::Proceed
	}

	pub(super) fn finish(&self) {
		*self.done.lock() = true;
		self.finished.store(true, Ordering::Release);
		self.cond.notify_all();
	}

	pub(super) fn is_finished(&self) -> bool {
		self.finished.load(Ordering::Acquire)
	}
}
