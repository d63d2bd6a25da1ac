//! Parameter table and typed parameter values.

use std::f64::consts::FRAC_PI_2;
use std::fmt;

use ncfactory_primitives::units::{self, Quantity};
use ncfactory_primitives::{NcError, Result};

use crate::orientation::OrientDir;

/// How a parameter's textual value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
	/// Floating point, optionally carrying a unit suffix.
	Double {
		quantity: Option<Quantity>,
		units_required: bool,
	},
	Int,
	/// Boolean; a bare name without `=value` means `true`.
	Bool,
	Str,
	/// A crystal/lab direction pair.
	Orientation,
}

const PLAIN: ParamKind = ParamKind::Double {
	quantity: None,
	units_required: false,
};
const TEMPERATURE: ParamKind = ParamKind::Double {
	quantity: Some(Quantity::Temperature),
	units_required: false,
};
const LENGTH: ParamKind = ParamKind::Double {
	quantity: Some(Quantity::Length),
	units_required: false,
};
const ANGLE: ParamKind = ParamKind::Double {
	quantity: Some(Quantity::Angle),
	units_required: false,
};
const ANGLE_WITH_UNITS: ParamKind = ParamKind::Double {
	quantity: Some(Quantity::Angle),
	units_required: true,
};

macro_rules! define_params {
	(
		$(
			$(#[$attr:meta])*
			$variant:ident => $name:literal, $kind:expr;
		)*
	) => {
		/// Identifies one recognised configuration parameter.
		///
		/// The declaration order is the canonical serialization order.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub enum ParamId {
			$( $(#[$attr])* $variant, )*
		}

		impl ParamId {
			/// Every parameter, in canonical order.
			pub const ALL: &'static [ParamId] = &[ $( ParamId::$variant, )* ];

			/// Name used in descriptor strings.
			pub const fn name(self) -> &'static str {
				match self {
					$( ParamId::$variant => $name, )*
				}
			}

			pub const fn kind(self) -> ParamKind {
				match self {
					$( ParamId::$variant => $kind, )*
				}
			}
		}
	};
}

define_params! {
	/// Temperature in kelvin.
	Temp => "temp", TEMPERATURE;
	/// Lower d-spacing cutoff in angstrom (-1: no HKL lists, 0: automatic).
	DCutoff => "dcutoff", LENGTH;
	/// Upper d-spacing cutoff in angstrom.
	DCutoffUpper => "dcutoffupper", LENGTH;
	/// Density scale for powders, in (0, 1].
	PackingFactor => "packingfactor", PLAIN;
	/// Mosaic spread of single crystals in radians.
	Mosaicity => "mosaicity", ANGLE_WITH_UNITS;
	/// Number of phonon expansion terms (0: automatic, -1: disabled).
	NPhonon => "nphonon", ParamKind::Int;
	/// Expand lists of equivalent HKL planes.
	ExpandHkl => "expandhkl", ParamKind::Bool;
	/// Primary single-crystal orientation.
	OrientationPrimary => "orientationprimary", ParamKind::Orientation;
	/// Secondary single-crystal orientation.
	OrientationSecondary => "orientationsecondary", ParamKind::Orientation;
	/// Tolerance on the secondary direction, in radians.
	OrientationTolerance => "orientationtolerance", ANGLE;
	/// Extension reported instead of the locator's own.
	OverrideFileExt => "overridefileext", ParamKind::Str;
	/// Only Bragg diffraction.
	BraggOnly => "braggonly", ParamKind::Bool;
	/// Everything except Bragg diffraction.
	SkipBragg => "skipbragg", ParamKind::Bool;
	/// Background model requested from scatter factories.
	ScatterBkgdModel => "scatterbkgdmodel", ParamKind::Str;
	/// Forces the info factory by name.
	InfoFactory => "infofactory", ParamKind::Str;
	/// Forces the scatter factory by name.
	ScatterFactory => "scatterfactory", ParamKind::Str;
	/// Forces the absorption factory by name.
	AbsorptionFactory => "absorptionfactory", ParamKind::Str;
}

impl ParamId {
	/// Looks up a parameter by its descriptor name.
	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|p| p.name() == name)
	}

	/// Like [`ParamId::from_name`], failing with a suggestion for near misses.
	pub fn lookup(name: &str) -> Result<Self> {
		Self::from_name(name).ok_or_else(|| {
			let mut msg = format!("unknown parameter \"{name}\"");
			if let Some(hint) = suggest(name) {
				msg.push_str(&format!(" (did you mean \"{hint}\"?)"));
			}
			NcError::bad_input(msg)
		})
	}

	/// Value reported when the parameter was never set.
	pub fn fallback(self) -> Option<ParamValue> {
		Some(match self {
			Self::Temp => ParamValue::Double(293.15),
			Self::DCutoff => ParamValue::Double(0.0),
			Self::DCutoffUpper => ParamValue::Double(f64::INFINITY),
			Self::PackingFactor => ParamValue::Double(1.0),
			Self::NPhonon => ParamValue::Int(0),
			Self::ExpandHkl | Self::BraggOnly | Self::SkipBragg => ParamValue::Bool(false),
			Self::OrientationTolerance => ParamValue::Double(1e-4),
			Self::ScatterBkgdModel => ParamValue::Str("best".to_string()),
			Self::OverrideFileExt | Self::InfoFactory | Self::ScatterFactory | Self::AbsorptionFactory => {
				ParamValue::Str(String::new())
			}
			Self::Mosaicity | Self::OrientationPrimary | Self::OrientationSecondary => return None,
		})
	}

	/// Renders `value` so that it parses back for this parameter.
	pub fn render(self, value: &ParamValue) -> String {
		match (self.kind(), value) {
			(
				ParamKind::Double {
					quantity: Some(q),
					units_required: true,
				},
				ParamValue::Double(v),
			) => format!("{v:?}{}", canonical_suffix(q)),
			_ => value.to_string(),
		}
	}

	/// Checks a typed value against the parameter's allowed range.
	pub(crate) fn validate(self, value: &ParamValue) -> Result<()> {
		let name = self.name();
		let bad = |what: &str| Err(NcError::bad_input(format!("invalid value for \"{name}\": {what}")));
		if !value.matches(self.kind()) {
			return bad(&format!("expected {}", kind_label(self.kind())));
		}
		if let ParamValue::Double(v) = value
			&& v.is_nan()
		{
			return bad("must be a number");
		}
		match (self, value) {
			(Self::Temp, ParamValue::Double(v)) if !(v.is_finite() && *v > 0.0) => bad("must be a positive temperature"),
			(Self::DCutoff, ParamValue::Double(v)) if !(*v == -1.0 || (0.0..=1e5).contains(v)) => {
				bad("must be -1, 0 or a length up to 1e5 Aa")
			}
			(Self::DCutoffUpper, ParamValue::Double(v)) if !(*v > 0.0) => bad("must be positive"),
			(Self::PackingFactor, ParamValue::Double(v)) if !(*v > 0.0 && *v <= 1.0) => bad("must be in (0, 1]"),
			(Self::Mosaicity, ParamValue::Double(v)) if !(*v > 0.0 && *v <= FRAC_PI_2) => bad("must be in (0, 90deg]"),
			(Self::OrientationTolerance, ParamValue::Double(v)) if !(v.is_finite() && *v > 0.0) => {
				bad("must be a positive angle")
			}
			(Self::NPhonon, ParamValue::Int(v)) if *v < -1 => bad("must be -1 or larger"),
			(Self::ScatterBkgdModel, ParamValue::Str(s)) if s.is_empty() => bad("must not be empty"),
			(_, ParamValue::Str(s)) => validate_word(name, s),
			_ => Ok(()),
		}
	}
}

impl fmt::Display for ParamId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Typed value of a parameter, stored in canonical units.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
	Double(f64),
	Int(i32),
	Bool(bool),
	Str(String),
	Orientation(OrientDir),
}

impl ParamValue {
	/// Parses the textual value of `param`. `None` means the name appeared
	/// without `=value`, which only booleans accept.
	pub fn parse(param: ParamId, raw: Option<&str>) -> Result<Self> {
		let name = param.name();
		let Some(raw) = raw else {
			return match param.kind() {
				ParamKind::Bool => Ok(Self::Bool(true)),
				_ => Err(NcError::bad_input(format!("parameter \"{name}\" requires a value"))),
			};
		};
		let raw = raw.trim();
		let value = match param.kind() {
			ParamKind::Double {
				quantity: Some(q),
				units_required,
			} => Self::Double(units::parse_quantity(name, raw, q, units_required)?),
			ParamKind::Double { quantity: None, .. } => Self::Double(units::parse_number(name, raw)?),
			ParamKind::Int => Self::Int(
				raw.parse::<i32>()
					.map_err(|_| NcError::bad_input(format!("invalid integer \"{raw}\" for parameter \"{name}\"")))?,
			),
			ParamKind::Bool => Self::Bool(parse_bool(name, raw)?),
			ParamKind::Str => Self::Str(raw.to_string()),
			ParamKind::Orientation => Self::Orientation(OrientDir::parse(name, raw)?),
		};
		param.validate(&value)?;
		Ok(value)
	}

	fn matches(&self, kind: ParamKind) -> bool {
		matches!(
			(self, kind),
			(Self::Double(_), ParamKind::Double { .. })
				| (Self::Int(_), ParamKind::Int)
				| (Self::Bool(_), ParamKind::Bool)
				| (Self::Str(_), ParamKind::Str)
				| (Self::Orientation(_), ParamKind::Orientation)
		)
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Double(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_i32(&self) -> Option<i32> {
		match self {
			Self::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_orientation(&self) -> Option<&OrientDir> {
		match self {
			Self::Orientation(v) => Some(v),
			_ => None,
		}
	}
}

/// Formats the value in the descriptor grammar, so that
/// `ParamValue::parse(p, Some(&v.to_string()))` yields `v` again.
impl fmt::Display for ParamValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Double(v) => write!(f, "{v:?}"),
			Self::Int(v) => write!(f, "{v}"),
			Self::Bool(v) => write!(f, "{v}"),
			Self::Str(v) => f.write_str(v),
			Self::Orientation(o) => write!(f, "{o}"),
		}
	}
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
	match raw {
		"true" | "1" | "yes" => Ok(true),
		"false" | "0" | "no" => Ok(false),
		_ => Err(NcError::bad_input(format!(
			"invalid boolean \"{raw}\" for parameter \"{name}\" (expected true/false, yes/no or 1/0)"
		))),
	}
}

/// String values must survive a trip through the descriptor grammar.
fn validate_word(name: &str, s: &str) -> Result<()> {
	match s.chars().find(|&c| c.is_whitespace() || matches!(c, ';' | '=' | '[' | ']' | '@')) {
		Some(c) => Err(NcError::bad_input(format!(
			"invalid value \"{s}\" for \"{name}\": character {c:?} is not allowed"
		))),
		None => Ok(()),
	}
}

fn canonical_suffix(q: Quantity) -> &'static str {
	match q {
		Quantity::Temperature => "K",
		Quantity::Length => "Aa",
		Quantity::Angle => "rad",
	}
}

fn kind_label(kind: ParamKind) -> &'static str {
	match kind {
		ParamKind::Double { .. } => "a number",
		ParamKind::Int => "an integer",
		ParamKind::Bool => "a boolean",
		ParamKind::Str => "a string",
		ParamKind::Orientation => "an orientation",
	}
}

fn suggest(name: &str) -> Option<&'static str> {
	ParamId::ALL
		.iter()
		.map(|p| p.name())
		.min_by_key(|candidate| strsim::levenshtein(name, candidate))
		.filter(|candidate| strsim::levenshtein(name, candidate) <= 3)
}
