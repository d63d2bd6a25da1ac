use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Requests served from an existing row.
	pub hits: u64,
	/// Requests that found no row and started a build.
	pub misses: u64,
	/// Builds that completed successfully.
	pub builds: u64,
	/// Rows removed after their last holder released them.
	pub evictions: u64,
	/// Rows currently present.
	pub entries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
	pub hits: AtomicU64,
	pub misses: AtomicU64,
	pub builds: AtomicU64,
	pub evictions: AtomicU64,
}

impl Counters {
	pub fn bump(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self, entries: usize) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			builds: self.builds.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			entries,
		}
	}
}
