//! Parameters embedded in data files.
//!
//! A data file may carry default parameters in a single `NCMATCFG[...]`
//! marker, usually inside a comment:
//!
//! ```text
//! # NCMATCFG[temp=200K;dcutoff=0.5]
//! ```

use ncfactory_primitives::{NcError, Result};

pub const EMBEDDED_MARKER: &str = "NCMATCFG[";

/// Returns the parameter string inside the file's `NCMATCFG[...]` marker.
///
/// The marker must close on the line it opens on and may appear at most once.
pub fn extract_embedded_cfg(text: &str) -> Result<Option<String>> {
	let mut found: Option<String> = None;
	for (lineno, line) in text.lines().enumerate() {
		let mut rest = line;
		while let Some(start) = rest.find(EMBEDDED_MARKER) {
			if found.is_some() {
				return Err(NcError::bad_input(format!(
					"data contains more than one {EMBEDDED_MARKER}...] marker (second one on line {})",
					lineno + 1
				)));
			}
			let after = &rest[start + EMBEDDED_MARKER.len()..];
			let end = after.find(']').ok_or_else(|| {
				NcError::bad_input(format!("unterminated {EMBEDDED_MARKER}...] marker on line {}", lineno + 1))
			})?;
			found = Some(after[..end].trim().to_string());
			rest = &after[end + 1..];
		}
	}
	Ok(found)
}
