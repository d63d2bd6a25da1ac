//! Descriptor grammar: `<locator>[;<name>=<value>]*`.

use ncfactory_primitives::{NcError, Result};

use crate::param::{ParamId, ParamValue};

/// Keyword that disables parameters embedded in the data file.
pub const IGNORE_FILE_CFG: &str = "ignorefilecfg";

/// A descriptor split into its parts, with every value parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
	pub locator: String,
	pub ignore_embedded: bool,
	/// Assignments in the order they appeared. Later ones win.
	pub assignments: Vec<(ParamId, ParamValue)>,
}

/// Splits a full descriptor. The first segment is the locator.
pub fn parse_descriptor(descriptor: &str) -> Result<Descriptor> {
	let (locator, rest) = match descriptor.split_once(';') {
		Some((loc, rest)) => (loc.trim(), rest),
		None => (descriptor.trim(), ""),
	};
	if locator.is_empty() {
		return Err(NcError::bad_input(format!("descriptor \"{descriptor}\" does not start with a data locator")));
	}
	if locator.contains('=') {
		return Err(NcError::bad_input(format!(
			"descriptor \"{descriptor}\" must start with a data locator, not a parameter"
		)));
	}
	let segments = parse_segments(rest, true)?;
	Ok(Descriptor {
		locator: locator.to_string(),
		ignore_embedded: segments.ignore_embedded,
		assignments: segments.assignments,
	})
}

#[derive(Debug, Default)]
pub(crate) struct Segments {
	pub ignore_embedded: bool,
	pub assignments: Vec<(ParamId, ParamValue)>,
}

/// Parses `name=value` segments without a leading locator.
///
/// `ignorefilecfg` is only meaningful next to a locator; embedded
/// configuration and [`crate::MatCfg::apply_str_cfg`] pass `allow_ignore = false`.
pub(crate) fn parse_segments(raw: &str, allow_ignore: bool) -> Result<Segments> {
	let mut out = Segments::default();
	for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
		let (name, value) = match segment.split_once('=') {
			Some((n, v)) => (n.trim(), Some(v.trim())),
			None => (segment, None),
		};
		if name == IGNORE_FILE_CFG {
			if value.is_some() {
				return Err(NcError::bad_input(format!("\"{IGNORE_FILE_CFG}\" does not take a value")));
			}
			if !allow_ignore {
				return Err(NcError::bad_input(format!("\"{IGNORE_FILE_CFG}\" is not allowed here")));
			}
			out.ignore_embedded = true;
			continue;
		}
		let param = ParamId::lookup(name)?;
		out.assignments.push((param, ParamValue::parse(param, value)?));
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_locator_and_assignments() {
		let d = parse_descriptor(" Al_sg225.ncmat ; temp=0C;;expandhkl ; ignorefilecfg").unwrap();
		assert_eq!(d.locator, "Al_sg225.ncmat");
		assert!(d.ignore_embedded);
		assert_eq!(d.assignments.len(), 2);
		assert_eq!(d.assignments[0].0, ParamId::Temp);
		assert_eq!(d.assignments[1], (ParamId::ExpandHkl, ParamValue::Bool(true)));
	}

	#[test]
	fn locator_is_mandatory() {
		assert!(parse_descriptor("").is_err());
		assert!(parse_descriptor(" ;temp=10").is_err());
		assert!(parse_descriptor("temp=10").is_err());
	}

	#[test]
	fn ignorefilecfg_takes_no_value() {
		assert!(parse_descriptor("x.ncmat;ignorefilecfg=1").is_err());
		assert!(parse_segments("ignorefilecfg", false).is_err());
	}

	#[test]
	fn unknown_and_valueless_parameters() {
		let err = parse_descriptor("x.ncmat;dcutof=0.5").unwrap_err();
		assert!(err.message().contains("dcutoff"), "{err}");
		assert!(parse_descriptor("x.ncmat;temp").is_err());
	}
}
