use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, immutable identity of a shareable source object.
///
/// Ids are handed out from a monotonically increasing counter and never
/// reused within a process, so they remain valid cache-key components even
/// after the object they identified is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueId(u64);

impl UniqueId {
	/// Allocates a fresh id.
	pub fn new() -> Self {
		Self(NEXT_UID.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn value(self) -> u64 {
		self.0
	}
}

impl Default for UniqueId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for UniqueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "uid:{}", self.0)
	}
}

/// Objects that can be built once and shared carry a [`UniqueId`].
pub trait UniqueIdentifiable {
	fn unique_id(&self) -> UniqueId;
}
