//! The material configuration object.
//!
//! A [`MatCfg`] is a shared handle to an immutable parameter payload. Cloning
//! aliases the payload; every setter first detaches it with
//! [`Arc::make_mut`], so readers of other clones never observe a change.
//!
//! Access spies are attached to one handle, not to the payload. A clone
//! starts without spies.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ncfactory_primitives::{NcError, Result, TextData};
use parking_lot::Mutex;
use tracing::debug;

use crate::descriptor::{self, IGNORE_FILE_CFG};
use crate::embedded::{self, EMBEDDED_MARKER};
use crate::orientation::{self, OrientDir};
use crate::param::{ParamId, ParamValue};
use crate::spy::{self, AccessSpy, SpyList};

/// Rendered in cache signatures for parameters that were never set.
pub const UNSET_SENTINEL: &str = "<>";

/// Owner of a cfg's text data, kept alive for as long as the cfg or any of
/// its clones.
pub type DataHolder = Arc<dyn Any + Send + Sync>;

#[derive(Clone, PartialEq)]
struct CfgData {
	locator: String,
	ignore_embedded: bool,
	values: BTreeMap<ParamId, ParamValue>,
}

/// Complete single-crystal orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScOrientation {
	pub primary: OrientDir,
	pub secondary: OrientDir,
	/// Allowed angular mismatch of the secondary direction, in radians.
	pub tolerance: f64,
}

/// Copy-on-write material configuration.
pub struct MatCfg {
	data: Arc<CfgData>,
	source: Option<Arc<TextData>>,
	holder: Option<DataHolder>,
	spies: SpyList,
}

impl MatCfg {
	/// Parses `<locator>[;name=value]*` without consulting any data.
	pub fn parse(descriptor: &str) -> Result<Self> {
		let d = descriptor::parse_descriptor(descriptor)?;
		let mut values = BTreeMap::new();
		values.extend(d.assignments);
		Ok(Self::from_data(CfgData {
			locator: d.locator,
			ignore_embedded: d.ignore_embedded,
			values,
		}))
	}

	/// Parses `descriptor` for already resolved `data`.
	///
	/// Parameters embedded in the data apply first, so explicit segments win.
	/// With `ignorefilecfg` the embedded block is not even looked for.
	pub fn parse_with_data(descriptor: &str, data: Arc<TextData>) -> Result<Self> {
		let d = descriptor::parse_descriptor(descriptor)?;
		let mut values = BTreeMap::new();
		if !d.ignore_embedded
			&& let Some(raw) = embedded::extract_embedded_cfg(data.content())?
		{
			debug!(locator = %d.locator, embedded = %raw, "applying embedded configuration");
			let segments = descriptor::parse_segments(&raw, false).map_err(|e| {
				NcError::bad_input(format!("in {EMBEDDED_MARKER}...] of \"{}\": {}", data.locator(), e.message()))
			})?;
			values.extend(segments.assignments);
		}
		values.extend(d.assignments);
		let mut cfg = Self::from_data(CfgData {
			locator: d.locator,
			ignore_embedded: d.ignore_embedded,
			values,
		});
		cfg.source = Some(data);
		Ok(cfg)
	}

	fn from_data(data: CfgData) -> Self {
		Self {
			data: Arc::new(data),
			source: None,
			holder: None,
			spies: Mutex::new(Vec::new()),
		}
	}

	/// Data locator, without parameters.
	pub fn locator(&self) -> &str {
		&self.data.locator
	}

	/// Resolved text data, when built with [`MatCfg::parse_with_data`].
	pub fn text_data(&self) -> Option<&Arc<TextData>> {
		self.source.as_ref()
	}

	/// Ties `holder` to this cfg and its clones. Whoever resolved the text
	/// data uses it to keep that resolution alive while the cfg is in use.
	pub fn set_data_holder(&mut self, holder: DataHolder) {
		self.holder = Some(holder);
	}

	pub fn data_holder(&self) -> Option<&DataHolder> {
		self.holder.as_ref()
	}

	/// True when `ignorefilecfg` was given.
	pub fn ignored_embedded_config(&self) -> bool {
		self.data.ignore_embedded
	}

	/// True if `param` was explicitly set.
	pub fn is_set(&self, param: ParamId) -> bool {
		self.notify(param);
		self.data.values.contains_key(&param)
	}

	/// Current value of `param`, falling back to its default.
	pub fn get(&self, param: ParamId) -> Option<ParamValue> {
		self.notify(param);
		self.raw(param)
	}

	/// Sets `param` from a typed value.
	pub fn set(&mut self, param: ParamId, value: ParamValue) -> Result<()> {
		self.ensure_unspied(param)?;
		param.validate(&value)?;
		Arc::make_mut(&mut self.data).values.insert(param, value);
		Ok(())
	}

	/// Sets `param` from its textual form, units included.
	pub fn set_str(&mut self, param: ParamId, raw: &str) -> Result<()> {
		let value = ParamValue::parse(param, Some(raw))?;
		self.set(param, value)
	}

	/// Reverts `param` to its default.
	pub fn unset(&mut self, param: ParamId) -> Result<()> {
		self.ensure_unspied(param)?;
		if self.data.values.contains_key(&param) {
			Arc::make_mut(&mut self.data).values.remove(&param);
		}
		Ok(())
	}

	/// Applies `name=value` segments. Nothing changes if any segment is invalid.
	pub fn apply_str_cfg(&mut self, raw: &str) -> Result<()> {
		let segments = descriptor::parse_segments(raw, false)?;
		for (param, _) in &segments.assignments {
			self.ensure_unspied(*param)?;
		}
		if !segments.assignments.is_empty() {
			Arc::make_mut(&mut self.data).values.extend(segments.assignments);
		}
		Ok(())
	}

	pub fn temp(&self) -> f64 {
		self.get_f64(ParamId::Temp)
	}

	pub fn set_temp(&mut self, kelvin: f64) -> Result<()> {
		self.set(ParamId::Temp, ParamValue::Double(kelvin))
	}

	pub fn dcutoff(&self) -> f64 {
		self.get_f64(ParamId::DCutoff)
	}

	pub fn set_dcutoff(&mut self, aa: f64) -> Result<()> {
		self.set(ParamId::DCutoff, ParamValue::Double(aa))
	}

	pub fn dcutoffupper(&self) -> f64 {
		self.get_f64(ParamId::DCutoffUpper)
	}

	pub fn set_dcutoffupper(&mut self, aa: f64) -> Result<()> {
		self.set(ParamId::DCutoffUpper, ParamValue::Double(aa))
	}

	pub fn packingfactor(&self) -> f64 {
		self.get_f64(ParamId::PackingFactor)
	}

	pub fn set_packingfactor(&mut self, pf: f64) -> Result<()> {
		self.set(ParamId::PackingFactor, ParamValue::Double(pf))
	}

	/// Mosaic spread in radians; unset for polycrystals.
	pub fn mosaicity(&self) -> Option<f64> {
		self.get(ParamId::Mosaicity).and_then(|v| v.as_f64())
	}

	pub fn set_mosaicity(&mut self, radians: f64) -> Result<()> {
		self.set(ParamId::Mosaicity, ParamValue::Double(radians))
	}

	pub fn nphonon(&self) -> i32 {
		self.get(ParamId::NPhonon).and_then(|v| v.as_i32()).unwrap_or_default()
	}

	pub fn set_nphonon(&mut self, n: i32) -> Result<()> {
		self.set(ParamId::NPhonon, ParamValue::Int(n))
	}

	pub fn expandhkl(&self) -> bool {
		self.get_bool(ParamId::ExpandHkl)
	}

	pub fn set_expandhkl(&mut self, on: bool) -> Result<()> {
		self.set(ParamId::ExpandHkl, ParamValue::Bool(on))
	}

	pub fn orientationprimary(&self) -> Option<OrientDir> {
		self.get_orientation(ParamId::OrientationPrimary)
	}

	pub fn set_orientationprimary(&mut self, dir: OrientDir) -> Result<()> {
		self.set(ParamId::OrientationPrimary, ParamValue::Orientation(dir))
	}

	pub fn orientationsecondary(&self) -> Option<OrientDir> {
		self.get_orientation(ParamId::OrientationSecondary)
	}

	pub fn set_orientationsecondary(&mut self, dir: OrientDir) -> Result<()> {
		self.set(ParamId::OrientationSecondary, ParamValue::Orientation(dir))
	}

	pub fn orientationtolerance(&self) -> f64 {
		self.get_f64(ParamId::OrientationTolerance)
	}

	pub fn set_orientationtolerance(&mut self, radians: f64) -> Result<()> {
		self.set(ParamId::OrientationTolerance, ParamValue::Double(radians))
	}

	pub fn overridefileext(&self) -> String {
		self.get_string(ParamId::OverrideFileExt)
	}

	pub fn set_overridefileext(&mut self, ext: &str) -> Result<()> {
		self.set(ParamId::OverrideFileExt, ParamValue::Str(ext.to_string()))
	}

	pub fn braggonly(&self) -> bool {
		self.get_bool(ParamId::BraggOnly)
	}

	pub fn set_braggonly(&mut self, on: bool) -> Result<()> {
		self.set(ParamId::BraggOnly, ParamValue::Bool(on))
	}

	pub fn skipbragg(&self) -> bool {
		self.get_bool(ParamId::SkipBragg)
	}

	pub fn set_skipbragg(&mut self, on: bool) -> Result<()> {
		self.set(ParamId::SkipBragg, ParamValue::Bool(on))
	}

	pub fn scatterbkgdmodel(&self) -> String {
		self.get_string(ParamId::ScatterBkgdModel)
	}

	pub fn set_scatterbkgdmodel(&mut self, model: &str) -> Result<()> {
		self.set(ParamId::ScatterBkgdModel, ParamValue::Str(model.to_string()))
	}

	pub fn infofactory(&self) -> String {
		self.get_string(ParamId::InfoFactory)
	}

	pub fn set_infofactory(&mut self, name: &str) -> Result<()> {
		self.set(ParamId::InfoFactory, ParamValue::Str(name.to_string()))
	}

	pub fn scatterfactory(&self) -> String {
		self.get_string(ParamId::ScatterFactory)
	}

	pub fn set_scatterfactory(&mut self, name: &str) -> Result<()> {
		self.set(ParamId::ScatterFactory, ParamValue::Str(name.to_string()))
	}

	pub fn absorptionfactory(&self) -> String {
		self.get_string(ParamId::AbsorptionFactory)
	}

	pub fn set_absorptionfactory(&mut self, name: &str) -> Result<()> {
		self.set(ParamId::AbsorptionFactory, ParamValue::Str(name.to_string()))
	}

	/// Single crystals have mosaicity and both orientations set.
	pub fn is_single_crystal(&self) -> bool {
		self.is_set(ParamId::Mosaicity)
	}

	pub fn is_poly_crystal(&self) -> bool {
		!self.is_single_crystal()
	}

	/// The complete orientation of a single crystal.
	pub fn sc_orientation(&self) -> Result<ScOrientation> {
		match (self.orientationprimary(), self.orientationsecondary()) {
			(Some(primary), Some(secondary)) => Ok(ScOrientation {
				primary,
				secondary,
				tolerance: self.orientationtolerance(),
			}),
			_ => Err(NcError::bad_input(format!(
				"\"{}\" does not define a complete single-crystal orientation",
				self.locator()
			))),
		}
	}

	/// Sets primary, secondary and tolerance in one step.
	pub fn set_orientation(&mut self, o: ScOrientation) -> Result<()> {
		let values = [
			(ParamId::OrientationPrimary, ParamValue::Orientation(o.primary)),
			(ParamId::OrientationSecondary, ParamValue::Orientation(o.secondary)),
			(ParamId::OrientationTolerance, ParamValue::Double(o.tolerance)),
		];
		for (param, value) in &values {
			self.ensure_unspied(*param)?;
			param.validate(value)?;
		}
		Arc::make_mut(&mut self.data).values.extend(values);
		Ok(())
	}

	/// Extension used to pick a data format: `overridefileext` when set,
	/// otherwise the locator's own.
	pub fn data_file_extension(&self) -> Option<String> {
		let forced = self.overridefileext();
		if !forced.is_empty() {
			return Some(forced);
		}
		let locator = self.source.as_ref().map_or(self.locator(), |d| d.locator());
		Path::new(locator).extension().and_then(|e| e.to_str()).map(str::to_string)
	}

	/// Fails with `BadInput` when parameters contradict each other or an
	/// orientation is incomplete.
	pub fn check_consistency(&self) -> Result<()> {
		let bad = |msg: String| Err(NcError::bad_input(format!("inconsistent configuration \"{self}\": {msg}")));
		let flag = |p: ParamId| self.raw(p).and_then(|v| v.as_bool()).unwrap_or(false);
		let num = |p: ParamId| self.raw(p).and_then(|v| v.as_f64());

		let braggonly = flag(ParamId::BraggOnly);
		let skipbragg = flag(ParamId::SkipBragg);
		let dcutoff = num(ParamId::DCutoff).unwrap_or(0.0);
		if braggonly && skipbragg {
			return bad("braggonly and skipbragg exclude each other".into());
		}
		if braggonly && dcutoff == -1.0 {
			return bad("braggonly requires Bragg reflections but dcutoff=-1 disables them".into());
		}
		if skipbragg && self.raw(ParamId::NPhonon).and_then(|v| v.as_i32()) == Some(-1) {
			return bad("skipbragg with nphonon=-1 leaves no scattering components".into());
		}
		let upper = num(ParamId::DCutoffUpper).unwrap_or(f64::INFINITY);
		if dcutoff > 0.0 && upper <= dcutoff {
			return bad(format!("dcutoffupper ({upper:?}) must exceed dcutoff ({dcutoff:?})"));
		}

		let sc_params = [
			ParamId::Mosaicity,
			ParamId::OrientationPrimary,
			ParamId::OrientationSecondary,
		];
		let present = sc_params.iter().filter(|p| self.data.values.contains_key(*p)).count();
		if present == 0 {
			if self.data.values.contains_key(&ParamId::OrientationTolerance) {
				return bad("orientationtolerance only applies to single crystals".into());
			}
			return Ok(());
		}
		if present < sc_params.len() {
			let missing: Vec<_> = sc_params
				.iter()
				.filter(|p| !self.data.values.contains_key(*p))
				.map(|p| p.name())
				.collect();
			return bad(format!("single crystal setup is missing {}", missing.join(", ")));
		}
		let dir = |p: ParamId| self.raw(p).and_then(|v| v.as_orientation().copied());
		if let (Some(primary), Some(secondary)) = (dir(ParamId::OrientationPrimary), dir(ParamId::OrientationSecondary)) {
			if orientation::parallel(primary.crystal.vector(), secondary.crystal.vector()) {
				return bad("primary and secondary crystal directions are parallel".into());
			}
			if orientation::parallel(primary.lab, secondary.lab) {
				return bad("primary and secondary lab directions are parallel".into());
			}
		}
		Ok(())
	}

	/// Serializes back to the descriptor grammar.
	///
	/// Only explicitly set parameters are written, restricted to `only` when
	/// given. The output re-parses to an equal configuration.
	pub fn to_str_cfg(&self, include_locator: bool, only: Option<&[ParamId]>) -> String {
		let mut parts = Vec::new();
		if include_locator {
			parts.push(self.data.locator.clone());
			if self.data.ignore_embedded {
				parts.push(IGNORE_FILE_CFG.to_string());
			}
		}
		for (param, value) in &self.data.values {
			if only.is_some_and(|names| !names.contains(param)) {
				continue;
			}
			parts.push(format!("{}={}", param.name(), param.render(value)));
		}
		parts.join(";")
	}

	/// Parameters wrapped in the marker data files use to embed them.
	pub fn to_embeddable_cfg(&self) -> String {
		format!("{EMBEDDED_MARKER}{}]", self.to_str_cfg(false, None))
	}

	/// Deterministic discriminator built from `params` only.
	///
	/// Names are sorted and deduplicated; unset parameters render as
	/// [`UNSET_SENTINEL`]. Spies are not notified.
	pub fn cache_signature(&self, params: &[ParamId]) -> String {
		let mut sorted = params.to_vec();
		sorted.sort_by_key(|p| p.name());
		sorted.dedup();
		sorted
			.iter()
			.map(|p| match self.data.values.get(p) {
				Some(v) => format!("{}={}", p.name(), p.render(v)),
				None => format!("{}={UNSET_SENTINEL}", p.name()),
			})
			.collect::<Vec<_>>()
			.join(";")
	}

	/// Like [`MatCfg::cache_signature`], naming parameters by string.
	pub fn cache_signature_by_name(&self, names: &[&str]) -> Result<String> {
		let params = names.iter().map(|n| ParamId::lookup(n)).collect::<Result<Vec<_>>>()?;
		Ok(self.cache_signature(&params))
	}

	/// A copy that owns its payload from the start.
	pub fn clone_unshared(&self) -> Self {
		Self {
			data: Arc::new((*self.data).clone()),
			source: self.source.clone(),
			holder: self.holder.clone(),
			spies: Mutex::new(Vec::new()),
		}
	}

	/// True if both handles alias one payload.
	pub fn shares_storage(&self, other: &MatCfg) -> bool {
		Arc::ptr_eq(&self.data, &other.data)
	}

	/// Number of handles aliasing this payload.
	pub fn storage_refcount(&self) -> usize {
		Arc::strong_count(&self.data)
	}

	/// Attaches `spy`. Setters fail until it is removed again.
	pub fn add_access_spy(&self, spy: Arc<dyn AccessSpy>) {
		self.spies.lock().push(spy);
	}

	/// Detaches `spy`. Returns false if it was not attached.
	pub fn remove_access_spy(&self, target: &Arc<dyn AccessSpy>) -> bool {
		let mut spies = self.spies.lock();
		match spies.iter().position(|s| spy::same_spy(s, target)) {
			Some(idx) => {
				spies.remove(idx);
				true
			}
			None => false,
		}
	}

	pub fn has_access_spies(&self) -> bool {
		!self.spies.lock().is_empty()
	}

	/// Attaches `spy` for the lifetime of the returned guard.
	pub fn spy(&self, spy: Arc<dyn AccessSpy>) -> SpyGuard<'_> {
		self.add_access_spy(spy.clone());
		SpyGuard { cfg: self, spy }
	}

	fn raw(&self, param: ParamId) -> Option<ParamValue> {
		self.data.values.get(&param).cloned().or_else(|| param.fallback())
	}

	fn notify(&self, param: ParamId) {
		let spies = {
			let guard = self.spies.lock();
			if guard.is_empty() {
				return;
			}
			guard.clone()
		};
		for s in spies {
			s.param_accessed(param);
		}
	}

	fn ensure_unspied(&self, param: ParamId) -> Result<()> {
		if self.has_access_spies() {
			return Err(NcError::calc(format!(
				"cannot modify \"{}\" of \"{}\" while an access spy is attached",
				param.name(),
				self.locator()
			)));
		}
		Ok(())
	}

	fn get_f64(&self, param: ParamId) -> f64 {
		self.get(param).and_then(|v| v.as_f64()).unwrap_or(f64::NAN)
	}

	fn get_bool(&self, param: ParamId) -> bool {
		self.get(param).and_then(|v| v.as_bool()).unwrap_or(false)
	}

	fn get_string(&self, param: ParamId) -> String {
		match self.get(param) {
			Some(ParamValue::Str(s)) => s,
			_ => String::new(),
		}
	}

	fn get_orientation(&self, param: ParamId) -> Option<OrientDir> {
		self.get(param).and_then(|v| v.as_orientation().copied())
	}
}

/// Clones share the payload but never the spies.
impl Clone for MatCfg {
	fn clone(&self) -> Self {
		Self {
			data: Arc::clone(&self.data),
			source: self.source.clone(),
			holder: self.holder.clone(),
			spies: Mutex::new(Vec::new()),
		}
	}
}

/// Equality of locator, `ignorefilecfg` and explicitly set parameters.
impl PartialEq for MatCfg {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
	}
}

impl fmt::Display for MatCfg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_str_cfg(true, None))
	}
}

impl fmt::Debug for MatCfg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MatCfg")
			.field("cfg", &self.to_str_cfg(true, None))
			.field("source", &self.source.as_ref().map(|d| d.locator()))
			.field("spies", &self.spies.lock().len())
			.finish()
	}
}

/// Detaches its spy on drop.
#[must_use = "the spy is detached as soon as the guard is dropped"]
pub struct SpyGuard<'a> {
	cfg: &'a MatCfg,
	spy: Arc<dyn AccessSpy>,
}

impl SpyGuard<'_> {
	pub fn cfg(&self) -> &MatCfg {
		self.cfg
	}
}

impl Drop for SpyGuard<'_> {
	fn drop(&mut self) {
		self.cfg.remove_access_spy(&self.spy);
	}
}

#[cfg(test)]
mod tests;
