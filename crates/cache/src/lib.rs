//! Derived-object cache.
//!
//! [`DerivedCache`] maps a key (typically a source object's unique id plus a
//! configuration signature) to a shared, expensive-to-build value. Each key is
//! built at most once at a time; concurrent requesters wait on that build and
//! then share its result. Rows live exactly as long as some [`CacheRef`] to
//! them does, unless the cache retains everything forever.

/// Logs at `info` when verbose tracing is enabled, at `trace` otherwise.
macro_rules! cache_event {
	($verbose:expr, $($arg:tt)+) => {
		if $verbose {
			tracing::info!($($arg)+)
		} else {
			tracing::trace!($($arg)+)
		}
	};
}

mod cache;
mod handle;
mod stats;

pub use cache::{CacheOptions, DerivedCache};
pub use handle::CacheRef;
pub use stats::CacheStats;
