//! Runtime switches for plugin loading and derived-object caching.
//!
//! Components never read the environment themselves. Options are built once,
//! either explicitly, from TOML, or from the process environment via
//! [`RuntimeOptions::from_env`], and then injected into the registry and the
//! caches.

use std::path::PathBuf;

use serde::Deserialize;

use crate::{NcError, Result};

/// Environment variable toggling verbose plugin-load diagnostics.
pub const ENV_DEBUG_PLUGIN: &str = "NCFACTORY_DEBUG_PLUGIN";
/// Environment variable toggling cache hit/miss tracing.
pub const ENV_DEBUG_CACHE: &str = "NCFACTORY_DEBUG_CACHE";
/// Colon-separated list of dynamic plugin libraries loaded at bootstrap.
pub const ENV_PLUGIN_LIST: &str = "NCFACTORY_PLUGIN_LIST";
/// Environment variable disabling cache eviction.
pub const ENV_NEVER_CLEAR_CACHES: &str = "NCFACTORY_NEVER_CLEAR_CACHES";
/// Colon-separated list of directories searched for data files.
pub const ENV_DATA_PATH: &str = "NCFACTORY_DATA_PATH";

/// Injected configuration for the registry and caches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
	/// Log every plugin load at info level.
	pub verbose_plugin_load: bool,
	/// Log cache hits, misses and evictions at info level.
	pub verbose_cache_trace: bool,
	/// Dynamic plugin libraries to load at bootstrap, in order.
	pub extra_plugin_paths: Vec<String>,
	/// Never evict cache rows, even when no holder remains.
	pub retain_cache_forever: bool,
	/// Directories consulted by the `searchpath` data source, in order.
	pub data_search_paths: Vec<PathBuf>,
}

impl RuntimeOptions {
	/// Reads options from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads options through an arbitrary key lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let flag = |key: &str| -> Result<bool> {
			match lookup(key) {
				None => Ok(false),
				Some(raw) => parse_flag(key, &raw),
			}
		};

		Ok(Self {
			verbose_plugin_load: flag(ENV_DEBUG_PLUGIN)?,
			verbose_cache_trace: flag(ENV_DEBUG_CACHE)?,
			extra_plugin_paths: lookup(ENV_PLUGIN_LIST).map(|v| split_path_list(&v)).unwrap_or_default(),
			retain_cache_forever: flag(ENV_NEVER_CLEAR_CACHES)?,
			data_search_paths: lookup(ENV_DATA_PATH)
				.map(|v| split_path_list(&v).into_iter().map(PathBuf::from).collect())
				.unwrap_or_default(),
		})
	}

	/// Parses options from a TOML document.
	pub fn from_toml_str(src: &str) -> Result<Self> {
		toml::from_str(src).map_err(|e| NcError::bad_input(format!("invalid runtime options: {e}")))
	}
}

/// Splits a colon-separated list, trimming entries and skipping empty ones.
pub fn split_path_list(raw: &str) -> Vec<String> {
	raw.split(':')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.collect()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"" | "1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(NcError::bad_input(format!(
			"invalid boolean \"{raw}\" in {key} (expected 1/0, true/false, yes/no, on/off)"
		))),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |k| map.get(k).cloned()
	}

	#[test]
	fn plugin_list_is_trimmed_and_ordered() {
		let opts =
			RuntimeOptions::from_lookup(lookup_from(&[(ENV_PLUGIN_LIST, " /a/libone.so ::/b/libtwo.so : ")])).unwrap();
		assert_eq!(opts.extra_plugin_paths, vec!["/a/libone.so", "/b/libtwo.so"]);
	}

	#[test]
	fn absent_environment_gives_defaults() {
		let opts = RuntimeOptions::from_lookup(|_| None).unwrap();
		assert_eq!(opts, RuntimeOptions::default());
	}

	#[test]
	fn flags_parse_common_spellings() {
		let opts = RuntimeOptions::from_lookup(lookup_from(&[
			(ENV_DEBUG_PLUGIN, "yes"),
			(ENV_DEBUG_CACHE, "0"),
			(ENV_NEVER_CLEAR_CACHES, "1"),
		]))
		.unwrap();
		assert!(opts.verbose_plugin_load);
		assert!(!opts.verbose_cache_trace);
		assert!(opts.retain_cache_forever);
	}

	#[test]
	fn invalid_flag_is_bad_input() {
		let err = RuntimeOptions::from_lookup(lookup_from(&[(ENV_DEBUG_CACHE, "maybe")])).unwrap_err();
		assert!(matches!(err, NcError::BadInput(_)));
		assert!(err.message().contains(ENV_DEBUG_CACHE));
	}

	#[test]
	fn toml_document_is_accepted() {
		let opts = RuntimeOptions::from_toml_str(
			r#"
			verbose_plugin_load = true
			extra_plugin_paths = ["/opt/plugins/libfoo.so"]
			data_search_paths = ["/data"]
			"#,
		)
		.unwrap();
		assert!(opts.verbose_plugin_load);
		assert!(!opts.retain_cache_forever);
		assert_eq!(opts.extra_plugin_paths, vec!["/opt/plugins/libfoo.so"]);
		assert_eq!(opts.data_search_paths, vec![PathBuf::from("/data")]);
	}

	#[test]
	fn unknown_toml_key_is_rejected() {
		assert!(RuntimeOptions::from_toml_str("verbose = true").is_err());
	}
}
