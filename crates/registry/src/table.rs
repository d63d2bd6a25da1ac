use std::sync::Arc;

use arc_swap::ArcSwap;
use ncfactory_primitives::{NcError, Result};
use parking_lot::Mutex;

use crate::factory::{Factory, FactoryRequest};

/// Factories of one capability in registration order.
///
/// Readers load a snapshot without locking; writers serialize on a mutex and
/// publish a new snapshot.
pub struct FactoryTable<R: FactoryRequest> {
	snapshot: ArcSwap<Vec<Arc<dyn Factory<R>>>>,
	write: Mutex<()>,
}

impl<R: FactoryRequest> Default for FactoryTable<R> {
	fn default() -> Self {
		Self {
			snapshot: ArcSwap::from_pointee(Vec::new()),
			write: Mutex::new(()),
		}
	}
}

impl<R: FactoryRequest> FactoryTable<R> {
	pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<dyn Factory<R>>>> {
		self.snapshot.load_full()
	}

	pub(crate) fn insert(&self, factory: Arc<dyn Factory<R>>) -> Result<()> {
		let _write = self.write.lock();
		let current = self.snapshot.load();
		if current.iter().any(|f| f.name() == factory.name()) {
			return Err(NcError::calc(format!(
				"a {} factory named \"{}\" is already registered",
				R::KIND,
				factory.name()
			)));
		}
		let mut next = Vec::with_capacity(current.len() + 1);
		next.extend(current.iter().cloned());
		next.push(factory);
		self.snapshot.store(Arc::new(next));
		Ok(())
	}

	pub(crate) fn names(&self) -> Vec<String> {
		self.snapshot.load().iter().map(|f| f.name().to_string()).collect()
	}
}
