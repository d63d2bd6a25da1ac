use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::cache::Shared;

/// A holder of one cached value.
///
/// Each handle counts as one external holder of its row. Dropping the last
/// handle evicts the row, so the next request for the key builds afresh.
/// Handles outlive their cache safely.
pub struct CacheRef<K, V: ?Sized>
where
	K: Eq + Hash + Clone + fmt::Debug,
{
	key: K,
	value: Arc<V>,
	owner: Weak<Shared<K, V>>,
}

impl<K, V> CacheRef<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	pub(crate) fn new(key: K, value: Arc<V>, owner: Weak<Shared<K, V>>) -> Self {
		Self { key, value, owner }
	}

	pub fn key(&self) -> &K {
		&self.key
	}

	/// The shared value, detached from the cache's holder count.
	pub fn value(&self) -> &Arc<V> {
		&self.value
	}

	/// True if both handles point at the same built object.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.value, &other.value)
	}

	/// Gives up this holder.
	pub fn release(self) {}
}

impl<K, V> Clone for CacheRef<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	fn clone(&self) -> Self {
		if let Some(owner) = self.owner.upgrade() {
			owner.acquire(&self.key, &self.value);
		}
		Self {
			key: self.key.clone(),
			value: Arc::clone(&self.value),
			owner: Weak::clone(&self.owner),
		}
	}
}

impl<K, V> Drop for CacheRef<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	fn drop(&mut self) {
		if let Some(owner) = self.owner.upgrade() {
			owner.release(&self.key, &self.value);
		}
	}
}

impl<K, V> Deref for CacheRef<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized,
{
	type Target = V;

	fn deref(&self) -> &V {
		&self.value
	}
}

impl<K, V> fmt::Debug for CacheRef<K, V>
where
	K: Eq + Hash + Clone + fmt::Debug,
	V: ?Sized + fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CacheRef")
			.field("key", &self.key)
			.field("value", &&*self.value)
			.finish()
	}
}
