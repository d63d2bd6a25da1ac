//! Source objects handed between data sources, factories and caches.
//!
//! Both types are immutable once built and carry a [`UniqueId`] that the
//! derived-object caches use as the identity half of their keys.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::{UniqueId, UniqueIdentifiable};

/// Raw text content of a resolved data locator.
#[derive(Clone)]
pub struct TextData {
	uid: UniqueId,
	locator: String,
	data_source: String,
	content: Arc<str>,
}

impl TextData {
	/// Wraps `content` resolved from `locator` by the data source named
	/// `data_source`.
	pub fn new(locator: impl Into<String>, data_source: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
		Self {
			uid: UniqueId::new(),
			locator: locator.into(),
			data_source: data_source.into(),
			content: content.into(),
		}
	}

	/// Resolved locator, without any parameters appended to it.
	pub fn locator(&self) -> &str {
		&self.locator
	}

	/// Name of the data source factory that resolved the locator.
	pub fn data_source(&self) -> &str {
		&self.data_source
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	/// Extension of the locator, if any (`"ncmat"` for `"Al.ncmat"`).
	pub fn extension(&self) -> Option<&str> {
		Path::new(&self.locator).extension().and_then(|e| e.to_str())
	}
}

impl UniqueIdentifiable for TextData {
	fn unique_id(&self) -> UniqueId {
		self.uid
	}
}

impl fmt::Debug for TextData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TextData")
			.field("uid", &self.uid)
			.field("locator", &self.locator)
			.field("data_source", &self.data_source)
			.field("len", &self.content.len())
			.finish()
	}
}

/// Parsed material information.
///
/// Produced by info factories from [`TextData`]; consumed by scatter and
/// absorption factories. Only the fields the bundled providers consult are
/// modelled.
#[derive(Debug, Clone)]
pub struct Info {
	uid: UniqueId,
	origin: Option<UniqueId>,
	temperature: Option<f64>,
	absorption_xs: Option<f64>,
	free_scattering_xs: Option<f64>,
}

impl Info {
	pub fn builder() -> InfoBuilder {
		InfoBuilder::default()
	}

	/// Id of the text data this info was parsed from.
	pub fn origin(&self) -> Option<UniqueId> {
		self.origin
	}

	/// Material temperature in kelvin.
	pub fn temperature(&self) -> Option<f64> {
		self.temperature
	}

	/// Absorption cross section in barn at 2200 m/s.
	pub fn absorption_xs(&self) -> Option<f64> {
		self.absorption_xs
	}

	/// Free-atom scattering cross section in barn.
	pub fn free_scattering_xs(&self) -> Option<f64> {
		self.free_scattering_xs
	}
}

impl UniqueIdentifiable for Info {
	fn unique_id(&self) -> UniqueId {
		self.uid
	}
}

/// Builder for [`Info`]. Each [`InfoBuilder::build`] allocates a new id.
#[derive(Debug, Clone, Default)]
pub struct InfoBuilder {
	origin: Option<UniqueId>,
	temperature: Option<f64>,
	absorption_xs: Option<f64>,
	free_scattering_xs: Option<f64>,
}

impl InfoBuilder {
	pub fn origin(mut self, uid: UniqueId) -> Self {
		self.origin = Some(uid);
		self
	}

	pub fn temperature(mut self, kelvin: f64) -> Self {
		self.temperature = Some(kelvin);
		self
	}

	pub fn absorption_xs(mut self, barn: f64) -> Self {
		self.absorption_xs = Some(barn);
		self
	}

	pub fn free_scattering_xs(mut self, barn: f64) -> Self {
		self.free_scattering_xs = Some(barn);
		self
	}

	pub fn build(self) -> Info {
		Info {
			uid: UniqueId::new(),
			origin: self.origin,
			temperature: self.temperature,
			absorption_xs: self.absorption_xs,
			free_scattering_xs: self.free_scattering_xs,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn text_data_extension_and_identity() {
		let a = TextData::new("dir/Al_sg225.ncmat", "relpath", "NCMAT v7");
		let b = a.clone();
		assert_eq!(a.extension(), Some("ncmat"));
		assert_eq!(a.unique_id(), b.unique_id());
		assert_ne!(a.unique_id(), TextData::new("x", "virtual", "").unique_id());
	}

	#[test]
	fn info_builder_allocates_fresh_ids() {
		let builder = Info::builder().temperature(300.0).absorption_xs(0.231);
		let a = builder.clone().build();
		let b = builder.build();
		assert_ne!(a.unique_id(), b.unique_id());
		assert_eq!(a.absorption_xs(), Some(0.231));
		assert_eq!(b.free_scattering_xs(), None);
	}
}
