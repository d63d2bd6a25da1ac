//! Unit suffix handling.
//!
//! Values are always stored in one canonical unit per quantity: kelvin for
//! temperatures, angstrom for lengths and radians for angles. The parsers here
//! accept a number optionally followed by a recognised unit suffix and return
//! the canonical value.

use std::f64::consts::PI;

use crate::{NcError, Result};

/// Physical quantity a parameter value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
	/// Kelvin. Suffixes: `K`, `C`, `F`.
	Temperature,
	/// Angstrom. Suffixes: `Aa`, `nm`, `mm`, `cm`, `m`.
	Length,
	/// Radians. Suffixes: `rad`, `deg`, `arcmin`, `arcsec`.
	Angle,
}

struct Unit {
	suffix: &'static str,
	to_canonical: fn(f64) -> f64,
}

fn identity(v: f64) -> f64 {
	v
}

fn celsius(v: f64) -> f64 {
	v + 273.15
}

fn fahrenheit(v: f64) -> f64 {
	(v - 32.0) * 5.0 / 9.0 + 273.15
}

fn nanometre(v: f64) -> f64 {
	v * 10.0
}

fn millimetre(v: f64) -> f64 {
	v * 1e7
}

fn centimetre(v: f64) -> f64 {
	v * 1e8
}

fn metre(v: f64) -> f64 {
	v * 1e10
}

fn degree(v: f64) -> f64 {
	v * PI / 180.0
}

fn arcminute(v: f64) -> f64 {
	v * PI / (180.0 * 60.0)
}

fn arcsecond(v: f64) -> f64 {
	v * PI / (180.0 * 3600.0)
}

// Ordered so that no suffix is shadowed by a shorter one listed before it.
const TEMPERATURE_UNITS: &[Unit] = &[
	Unit { suffix: "K", to_canonical: identity },
	Unit { suffix: "C", to_canonical: celsius },
	Unit { suffix: "F", to_canonical: fahrenheit },
];

const LENGTH_UNITS: &[Unit] = &[
	Unit { suffix: "Aa", to_canonical: identity },
	Unit { suffix: "nm", to_canonical: nanometre },
	Unit { suffix: "mm", to_canonical: millimetre },
	Unit { suffix: "cm", to_canonical: centimetre },
	Unit { suffix: "m", to_canonical: metre },
];

const ANGLE_UNITS: &[Unit] = &[
	Unit { suffix: "arcmin", to_canonical: arcminute },
	Unit { suffix: "arcsec", to_canonical: arcsecond },
	Unit { suffix: "rad", to_canonical: identity },
	Unit { suffix: "deg", to_canonical: degree },
];

impl Quantity {
	fn units(self) -> &'static [Unit] {
		match self {
			Self::Temperature => TEMPERATURE_UNITS,
			Self::Length => LENGTH_UNITS,
			Self::Angle => ANGLE_UNITS,
		}
	}

	/// Recognised suffixes, for error messages.
	pub fn suffixes(self) -> Vec<&'static str> {
		self.units().iter().map(|u| u.suffix).collect()
	}
}

/// Parses `raw` as a quantity for parameter `param`, converting to the
/// canonical unit.
///
/// A bare number is taken to be in canonical units unless `units_required`
/// is set, in which case it is rejected.
pub fn parse_quantity(param: &str, raw: &str, quantity: Quantity, units_required: bool) -> Result<f64> {
	let raw = raw.trim();
	for unit in quantity.units() {
		if let Some(number) = raw.strip_suffix(unit.suffix) {
			let value = parse_number(param, number)?;
			return Ok((unit.to_canonical)(value));
		}
	}
	if units_required {
		return Err(NcError::bad_input(format!(
			"parameter \"{param}\" requires units (got \"{raw}\", expected one of: {})",
			quantity.suffixes().join(", ")
		)));
	}
	parse_number(param, raw)
}

/// Parses a plain floating point number, rejecting NaN.
pub fn parse_number(param: &str, raw: &str) -> Result<f64> {
	let raw = raw.trim();
	match raw.parse::<f64>() {
		Ok(v) if !v.is_nan() => Ok(v),
		_ => Err(NcError::bad_input(format!("invalid number \"{raw}\" for parameter \"{param}\""))),
	}
}
