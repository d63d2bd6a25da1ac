use std::fmt;

/// A physics process built by a scatter or absorption factory.
///
/// The sampling and interpolation machinery behind a process lives outside
/// this workspace; factories only need to hand back something that can name
/// itself and evaluate a cross section.
pub trait Process: Send + Sync + fmt::Debug {
	/// Short name of the model, e.g. `"AbsOOV"`.
	fn name(&self) -> &str;

	/// Cross section in barn at kinetic energy `ekin` (eV).
	fn cross_section(&self, ekin: f64) -> f64;
}
