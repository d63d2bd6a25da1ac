//! Standard absorption: cross sections proportional to 1/v.

use std::sync::Arc;

use ncfactory_primitives::{NcError, Process, Result};

use crate::Registry;
use crate::factory::{AbsorptionRequest, Factory};

pub const PLUGIN_NAME: &str = "stdabs";
pub const FACTORY_NAME: &str = "stdabs";

/// Kinetic energy (eV) at which absorption cross sections are tabulated.
pub const THERMAL_ENERGY: f64 = 0.0253;

pub fn register(registry: &Registry) -> Result<()> {
	registry.register_factory::<AbsorptionRequest, _>(OneOverVFactory)
}

struct OneOverVFactory;

impl Factory<AbsorptionRequest> for OneOverVFactory {
	fn name(&self) -> &str {
		FACTORY_NAME
	}

	fn can_handle(&self, _request: &AbsorptionRequest) -> bool {
		true
	}

	fn produce(&self, request: &AbsorptionRequest) -> Result<Arc<dyn Process>> {
		let sigma = request.info().absorption_xs().ok_or_else(|| {
			NcError::missing_info(format!(
				"{} has no absorption cross section",
				request.cfg().locator()
			))
		})?;
		Ok(Arc::new(OneOverV::new(sigma)))
	}
}

/// Absorption scaling as `sigma * sqrt(0.0253 eV / ekin)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneOverV {
	sigma_thermal: f64,
}

impl OneOverV {
	pub fn new(sigma_thermal: f64) -> Self {
		Self { sigma_thermal }
	}
}

impl Process for OneOverV {
	fn name(&self) -> &str {
		"AbsOOV"
	}

	fn cross_section(&self, ekin: f64) -> f64 {
		if ekin <= 0.0 {
			return f64::INFINITY;
		}
		self.sigma_thermal * (THERMAL_ENERGY / ekin).sqrt()
	}
}
