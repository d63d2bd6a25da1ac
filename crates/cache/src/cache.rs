use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use ncfactory_primitives::{NcError, Result, RuntimeOptions};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::handle::CacheRef;
use crate::stats::{CacheStats, Counters};

/// Behaviour switches for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
	/// Keep rows after their last holder is gone.
	pub retain_forever: bool,
	/// Log hits, misses and evictions at `info` level.
	pub verbose: bool,
}

impl From<&RuntimeOptions> for CacheOptions {
	fn from(opts: &RuntimeOptions) -> Self {
		Self {
			retain_forever: opts.retain_cache_forever,
			verbose: opts.verbose_cache_trace,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
	Pending,
	Done,
	Failed,
}

/// Parks requesters of a key while its leader builds.
struct BuildGate {
	builder: ThreadId,
	state: Mutex<GateState>,
	cond: Condvar,
}

impl BuildGate {
	fn new() -> Self {
		Self {
			builder: thread::current().id(),
			state: Mutex::new(GateState::Pending),
			cond: Condvar::new(),
		}
	}

	fn wait(&self) {
		let mut state = self.state.lock();
		while *state == GateState::Pending {
			self.cond.wait(&mut state);
		}
	}

	fn open(&self, outcome: GateState) {
		*self.state.lock() = outcome;
		self.cond.notify_all();
	}
}

enum Slot<V: ?Sized> {
	Building(Arc<BuildGate>),
	Present { value: Arc<V>, holders: usize },
}

pub(crate) struct Shared<K, V: ?Sized> {
	name: &'static str,
	options: CacheOptions,
	table: Mutex<FxHashMap<K, Slot<V>>>,
	counters: Counters,
}

impl<K, V> Shared<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	/// Adds a holder to `key` if its row still holds `value`.
	pub(crate) fn acquire(&self, key: &K, value: &Arc<V>) {
		if let Some(Slot::Present { value: current, holders }) = self.table.lock().get_mut(key)
			&& Arc::ptr_eq(current, value)
		{
			*holders += 1;
		}
	}

	/// Drops a holder from `key`; the last one evicts the row.
	pub(crate) fn release(&self, key: &K, value: &Arc<V>) {
		let mut table = self.table.lock();
		let Some(Slot::Present { value: current, holders }) = table.get_mut(key) else {
			return;
		};
		if !Arc::ptr_eq(current, value) {
			return;
		}
		*holders = holders.saturating_sub(1);
		if *holders > 0 {
			return;
		}
		if self.options.retain_forever {
			cache_event!(self.options.verbose, cache = self.name, ?key, "last holder released; retained");
			return;
		}
		table.remove(key);
		drop(table);
		Counters::bump(&self.counters.evictions);
		cache_event!(self.options.verbose, cache = self.name, ?key, "evicted");
	}
}

/// Keyed, reference-counted cache that builds each key at most once at a time.
///
/// A build runs outside the table lock, so different keys build in parallel.
/// Requesters of a key that is being built block until the build finishes and
/// then share its value. A failed or panicking build removes its row; blocked
/// requesters then retry, and the first of them to get the lock becomes the
/// new builder.
pub struct DerivedCache<K, V: ?Sized> {
	shared: Arc<Shared<K, V>>,
}

impl<K, V> DerivedCache<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	/// Creates an empty cache labelled `name` in logs.
	pub fn new(name: &'static str, options: CacheOptions) -> Self {
		Self {
			shared: Arc::new(Shared {
				name,
				options,
				table: Mutex::new(FxHashMap::default()),
				counters: Counters::default(),
			}),
		}
	}

	pub fn name(&self) -> &'static str {
		self.shared.name
	}

	pub fn options(&self) -> CacheOptions {
		self.shared.options
	}

	/// Returns the value for `key`, building it with `build` on a miss.
	///
	/// Fails with `CalcError` when `build` (directly or indirectly) requests
	/// the key it is building on the same thread.
	pub fn get_or_build<F>(&self, key: K, build: F) -> Result<CacheRef<K, V>>
	where
		F: FnOnce(&K) -> Result<Arc<V>>,
	{
		let shared = &self.shared;
		loop {
			let gate = {
				let mut table = shared.table.lock();
				match table.entry(key.clone()) {
					Entry::Occupied(mut row) => match row.get_mut() {
						Slot::Present { value, holders } => {
							*holders += 1;
							Counters::bump(&shared.counters.hits);
							cache_event!(shared.options.verbose, cache = shared.name, ?key, "hit");
							return Ok(CacheRef::new(key, Arc::clone(value), Arc::downgrade(shared)));
						}
						Slot::Building(gate) => {
							if gate.builder == thread::current().id() {
								return Err(NcError::calc(format!(
									"{} cache: build of {key:?} requested itself recursively",
									shared.name
								)));
							}
							Arc::clone(gate)
						}
					},
					Entry::Vacant(row) => {
						let gate = Arc::new(BuildGate::new());
						row.insert(Slot::Building(Arc::clone(&gate)));
						drop(table);
						Counters::bump(&shared.counters.misses);
						cache_event!(shared.options.verbose, cache = shared.name, ?key, "miss; building");
						return self.lead(key, gate, build);
					}
				}
			};
			gate.wait();
		}
	}

	fn lead<F>(&self, key: K, gate: Arc<BuildGate>, build: F) -> Result<CacheRef<K, V>>
	where
		F: FnOnce(&K) -> Result<Arc<V>>,
	{
		let mut guard = LeaderGuard {
			shared: &self.shared,
			key: &key,
			gate,
			finished: false,
		};
		let value = build(&key)?;
		guard.complete(Arc::clone(&value));
		drop(guard);
		Ok(CacheRef::new(key, value, Arc::downgrade(&self.shared)))
	}

	/// Number of rows currently holding a value.
	pub fn len(&self) -> usize {
		count_present(&self.shared.table.lock())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, key: &K) -> bool {
		matches!(self.shared.table.lock().get(key), Some(Slot::Present { .. }))
	}

	/// Outstanding [`CacheRef`]s for `key`, or `None` without a row.
	pub fn holders(&self, key: &K) -> Option<usize> {
		match self.shared.table.lock().get(key) {
			Some(Slot::Present { holders, .. }) => Some(*holders),
			_ => None,
		}
	}

	/// Releases one holder. Same as dropping `handle`.
	pub fn release(&self, handle: CacheRef<K, V>) {
		drop(handle);
	}

	/// Removes rows nobody holds; only retained rows qualify.
	pub fn clear_unused(&self) -> usize {
		let mut table = self.shared.table.lock();
		let before = table.len();
		table.retain(|_, slot| !matches!(slot, Slot::Present { holders: 0, .. }));
		let removed = before - table.len();
		drop(table);
		if removed > 0 {
			cache_event!(self.shared.options.verbose, cache = self.shared.name, removed, "cleared unused rows");
		}
		removed
	}

	/// Drops every present row. Outstanding handles stay valid but no longer
	/// count towards any row.
	pub fn clear(&self) {
		self.shared
			.table
			.lock()
			.retain(|_, slot| matches!(slot, Slot::Building(_)));
	}

	pub fn stats(&self) -> CacheStats {
		let entries = self.len();
		self.shared.counters.snapshot(entries)
	}
}

impl<K, V: ?Sized> fmt::Debug for DerivedCache<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DerivedCache")
			.field("name", &self.shared.name)
			.field("options", &self.shared.options)
			.finish_non_exhaustive()
	}
}

fn count_present<K, V: ?Sized>(table: &FxHashMap<K, Slot<V>>) -> usize {
	table.values().filter(|s| matches!(s, Slot::Present { .. })).count()
}

/// Publishes the leader's outcome. Dropped without [`LeaderGuard::complete`]
/// (error or panic), it removes the row and wakes waiters to retry.
struct LeaderGuard<'a, K, V: ?Sized>
where
	K: Eq + Hash,
{
	shared: &'a Shared<K, V>,
	key: &'a K,
	gate: Arc<BuildGate>,
	finished: bool,
}

impl<K, V> LeaderGuard<'_, K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	fn complete(&mut self, value: Arc<V>) {
		self.shared
			.table
			.lock()
			.insert(self.key.clone(), Slot::Present { value, holders: 1 });
		Counters::bump(&self.shared.counters.builds);
		self.finished = true;
		self.gate.open(GateState::Done);
		cache_event!(self.shared.options.verbose, cache = self.shared.name, key = ?self.key, "built");
	}
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
	K: Eq + Hash,
	V: ?Sized,
{
	fn drop(&mut self) {
		if self.finished {
			return;
		}
		self.shared.table.lock().remove(self.key);
		self.gate.open(GateState::Failed);
		tracing::debug!(cache = self.shared.name, "build failed; row reverted to absent");
	}
}

#[cfg(test)]
mod tests;
