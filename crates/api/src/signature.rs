use ncfactory_config::ParamId;

/// Parameters info factories may read.
pub const INFO_PARAMS: &[ParamId] = &[
	ParamId::Temp,
	ParamId::DCutoff,
	ParamId::DCutoffUpper,
	ParamId::ExpandHkl,
	ParamId::OverrideFileExt,
	ParamId::InfoFactory,
];

/// Parameters scatter factories may read: everything but the absorption
/// factory selector.
pub const SCATTER_PARAMS: &[ParamId] = &[
	ParamId::Temp,
	ParamId::DCutoff,
	ParamId::DCutoffUpper,
	ParamId::PackingFactor,
	ParamId::Mosaicity,
	ParamId::NPhonon,
	ParamId::ExpandHkl,
	ParamId::OrientationPrimary,
	ParamId::OrientationSecondary,
	ParamId::OrientationTolerance,
	ParamId::OverrideFileExt,
	ParamId::BraggOnly,
	ParamId::SkipBragg,
	ParamId::ScatterBkgdModel,
	ParamId::InfoFactory,
	ParamId::ScatterFactory,
];

/// Parameters absorption factories may read.
pub const ABSORPTION_PARAMS: &[ParamId] = &[ParamId::AbsorptionFactory];

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scatter_params_cover_all_but_absorption() {
		let missing: Vec<_> = ParamId::ALL.iter().filter(|p| !SCATTER_PARAMS.contains(p)).collect();
		assert_eq!(missing, [&ParamId::AbsorptionFactory]);
	}

	#[test]
	fn test_info_params_feed_scatter() {
		assert!(INFO_PARAMS.iter().all(|p| SCATTER_PARAMS.contains(p)));
	}
}
