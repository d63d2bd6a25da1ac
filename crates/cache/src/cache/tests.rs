use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

use ncfactory_primitives::{ErrorKind, NcError, UniqueId};

use super::*;

type Key = (UniqueId, String);

fn cache(retain_forever: bool) -> DerivedCache<Key, String> {
	let _ = tracing_subscriber::fmt::try_init();
	DerivedCache::new(
		"test",
		CacheOptions {
			retain_forever,
			verbose: true,
		},
	)
}

fn counting_build(counter: &Arc<AtomicUsize>) -> impl FnOnce(&Key) -> Result<Arc<String>> {
	let counter = Arc::clone(counter);
	move |key| {
		counter.fetch_add(1, Ordering::SeqCst);
		Ok(Arc::new(format!("built {}", key.1)))
	}
}

/// Concurrent requests for one key share a single build.
#[test]
fn test_concurrent_requests_build_once() {
	let cache = Arc::new(cache(false));
	let builds = Arc::new(AtomicUsize::new(0));
	let key: Key = (UniqueId::new(), "temp=300".into());
	let n = 8;
	let barrier = Arc::new(Barrier::new(n));

	let handles: Vec<_> = (0..n)
		.map(|_| {
			let cache = Arc::clone(&cache);
			let builds = Arc::clone(&builds);
			let barrier = Arc::clone(&barrier);
			let key = key.clone();
			thread::spawn(move || {
				barrier.wait();
				cache
					.get_or_build(key, move |k| {
						builds.fetch_add(1, Ordering::SeqCst);
						thread::sleep(Duration::from_millis(50));
						Ok(Arc::new(format!("built {}", k.1)))
					})
					.unwrap()
			})
		})
		.collect();
	let refs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

	assert_eq!(builds.load(Ordering::SeqCst), 1);
	assert!(refs.iter().all(|r| r.ptr_eq(&refs[0])));
	assert_eq!(cache.holders(&key), Some(n));
	assert_eq!(&**refs[0], "built temp=300");

	let stats = cache.stats();
	assert_eq!(stats.builds, 1);
	assert_eq!(stats.misses, 1);
	assert_eq!(stats.hits, n as u64 - 1);
}

/// Releasing the last holder evicts the row, so the next request rebuilds.
#[test]
fn test_release_evicts_and_rebuilds() {
	let cache = cache(false);
	let builds = Arc::new(AtomicUsize::new(0));
	let key: Key = (UniqueId::new(), String::new());

	let first = cache.get_or_build(key.clone(), counting_build(&builds)).unwrap();
	let second = first.clone();
	assert_eq!(cache.holders(&key), Some(2));
	cache.release(first);
	assert_eq!(cache.holders(&key), Some(1));
	assert!(cache.contains(&key));
	second.release();
	assert!(!cache.contains(&key));
	assert!(cache.is_empty());

	let _third = cache.get_or_build(key, counting_build(&builds)).unwrap();
	assert_eq!(builds.load(Ordering::SeqCst), 2);
	assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_retain_forever_keeps_rows() {
	let cache = cache(true);
	let builds = Arc::new(AtomicUsize::new(0));
	let key: Key = (UniqueId::new(), String::new());

	drop(cache.get_or_build(key.clone(), counting_build(&builds)).unwrap());
	assert_eq!(cache.holders(&key), Some(0));
	let again = cache.get_or_build(key.clone(), counting_build(&builds)).unwrap();
	assert_eq!(builds.load(Ordering::SeqCst), 1);

	assert_eq!(cache.clear_unused(), 0);
	drop(again);
	assert_eq!(cache.clear_unused(), 1);
	assert!(cache.is_empty());
}

/// Different ids or signatures never share a row.
#[test]
fn test_keys_are_distinct() {
	let cache = cache(false);
	let builds = Arc::new(AtomicUsize::new(0));
	let id = UniqueId::new();
	let a = cache.get_or_build((id, "a".into()), counting_build(&builds)).unwrap();
	let b = cache.get_or_build((id, "b".into()), counting_build(&builds)).unwrap();
	let c = cache.get_or_build((UniqueId::new(), "a".into()), counting_build(&builds)).unwrap();
	assert!(!a.ptr_eq(&b));
	assert!(!a.ptr_eq(&c));
	assert_eq!(cache.len(), 3);
	assert_eq!(builds.load(Ordering::SeqCst), 3);
}

/// A failed build leaves no row behind and blocked requesters retry it.
#[test]
fn test_failed_build_lets_waiters_retry() {
	let cache = Arc::new(cache(false));
	let attempts = Arc::new(AtomicUsize::new(0));
	let key: Key = (UniqueId::new(), "x".into());
	let (started_tx, started_rx) = mpsc::channel();

	let leader = {
		let cache = Arc::clone(&cache);
		let attempts = Arc::clone(&attempts);
		let key = key.clone();
		thread::spawn(move || {
			cache.get_or_build(key, move |_| {
				attempts.fetch_add(1, Ordering::SeqCst);
				let _ = started_tx.send(());
				thread::sleep(Duration::from_millis(100));
				Err(NcError::missing_info("no data"))
			})
		})
	};
	started_rx.recv().unwrap();

	let waiters: Vec<_> = (0..4)
		.map(|_| {
			let cache = Arc::clone(&cache);
			let attempts = Arc::clone(&attempts);
			let key = key.clone();
			thread::spawn(move || {
				cache
					.get_or_build(key, move |_| {
						attempts.fetch_add(1, Ordering::SeqCst);
						Ok(Arc::new("recovered".to_string()))
					})
					.unwrap()
			})
		})
		.collect();

	let err = leader.join().unwrap().unwrap_err();
	assert_eq!(err.kind(), ErrorKind::MissingInfo);
	let refs: Vec<_> = waiters.into_iter().map(|h| h.join().unwrap()).collect();
	assert!(refs.iter().all(|r| r.ptr_eq(&refs[0])));
	assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_panicking_build_does_not_wedge_key() {
	let cache = cache(false);
	let key: Key = (UniqueId::new(), String::new());
	let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
		let _ = cache.get_or_build(key.clone(), |_| panic!("builder exploded"));
	}));
	assert!(outcome.is_err());
	assert_eq!(cache.holders(&key), None);

	let builds = Arc::new(AtomicUsize::new(0));
	cache.get_or_build(key, counting_build(&builds)).unwrap();
	assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_recursive_request_is_an_error() {
	let cache = cache(false);
	let key: Key = (UniqueId::new(), String::new());
	let err = cache
		.get_or_build(key.clone(), |k| {
			let inner = cache.get_or_build(k.clone(), |_| Ok(Arc::new(String::new())))?;
			Ok(Arc::clone(inner.value()))
		})
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CalcError);
	assert!(!cache.contains(&key));
}

#[test]
fn test_handles_outlive_cache() {
	let cache = cache(false);
	let builds = Arc::new(AtomicUsize::new(0));
	let handle = cache.get_or_build((UniqueId::new(), String::new()), counting_build(&builds)).unwrap();
	drop(cache);
	assert_eq!(&*handle, "built ");
}

#[test]
fn test_clear_detaches_outstanding_handles() {
	let cache = cache(false);
	let builds = Arc::new(AtomicUsize::new(0));
	let key: Key = (UniqueId::new(), String::new());
	let old = cache.get_or_build(key.clone(), counting_build(&builds)).unwrap();
	cache.clear();
	let fresh = cache.get_or_build(key.clone(), counting_build(&builds)).unwrap();
	assert!(!old.ptr_eq(&fresh));
	drop(old);
	assert_eq!(cache.holders(&key), Some(1));
}
