//! Single-crystal orientation directions.

use std::fmt;

use ncfactory_primitives::{NcError, Result};

/// Direction in the crystal frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrystalAxis {
	/// Real-space direction in the unit cell basis (`@crystal:`).
	Direct([f64; 3]),
	/// Normal of the plane with the given Miller indices (`@crystal_hkl:`).
	Hkl([f64; 3]),
}

impl CrystalAxis {
	pub fn vector(&self) -> [f64; 3] {
		match self {
			Self::Direct(v) | Self::Hkl(v) => *v,
		}
	}

	fn keyword(&self) -> &'static str {
		match self {
			Self::Direct(_) => "crystal",
			Self::Hkl(_) => "crystal_hkl",
		}
	}
}

/// A crystal direction and the lab direction it is aligned with.
///
/// Written as `@crystal:1,0,0@lab:0,0,1` or `@crystal_hkl:1,1,0@lab:0,1,0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientDir {
	pub crystal: CrystalAxis,
	pub lab: [f64; 3],
}

impl OrientDir {
	pub fn new(crystal: CrystalAxis, lab: [f64; 3]) -> Self {
		Self { crystal, lab }
	}

	/// Parses the textual form for parameter `param`.
	pub fn parse(param: &str, raw: &str) -> Result<Self> {
		let bad = |why: &str| NcError::bad_input(format!("invalid orientation \"{raw}\" for \"{param}\": {why}"));

		let rest = raw.trim().strip_prefix('@').ok_or_else(|| bad("must start with @crystal"))?;
		let (crystal_part, lab_part) = rest.split_once("@lab:").ok_or_else(|| bad("missing @lab: section"))?;

		let crystal = if let Some(v) = crystal_part.strip_prefix("crystal_hkl:") {
			CrystalAxis::Hkl(parse_vector(v).ok_or_else(|| bad("crystal direction needs three numbers"))?)
		} else if let Some(v) = crystal_part.strip_prefix("crystal:") {
			CrystalAxis::Direct(parse_vector(v).ok_or_else(|| bad("crystal direction needs three numbers"))?)
		} else {
			return Err(bad("expected @crystal: or @crystal_hkl:"));
		};
		let lab = parse_vector(lab_part).ok_or_else(|| bad("lab direction needs three numbers"))?;

		if is_zero(crystal.vector()) || is_zero(lab) {
			return Err(bad("directions must be non-zero"));
		}
		Ok(Self { crystal, lab })
	}
}

impl fmt::Display for OrientDir {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [a, b, c] = self.crystal.vector();
		let [x, y, z] = self.lab;
		write!(f, "@{}:{a:?},{b:?},{c:?}@lab:{x:?},{y:?},{z:?}", self.crystal.keyword())
	}
}

fn parse_vector(raw: &str) -> Option<[f64; 3]> {
	let mut out = [0.0; 3];
	let mut parts = raw.split(',');
	for slot in &mut out {
		let v: f64 = parts.next()?.trim().parse().ok()?;
		if !v.is_finite() {
			return None;
		}
		*slot = v;
	}
	parts.next().is_none().then_some(out)
}

fn is_zero(v: [f64; 3]) -> bool {
	v.iter().all(|c| *c == 0.0)
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
	[a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

pub(crate) fn norm(v: [f64; 3]) -> f64 {
	v.iter().map(|c| c * c).sum::<f64>().sqrt()
}

/// True when the two directions are (anti)parallel within `1e-6` rad.
pub(crate) fn parallel(a: [f64; 3], b: [f64; 3]) -> bool {
	let (na, nb) = (norm(a), norm(b));
	if na == 0.0 || nb == 0.0 {
		return true;
	}
	norm(cross(a, b)) / (na * nb) < 1e-6
}
