use std::fmt;
use std::sync::Arc;

use ncfactory_config::MatCfg;
use ncfactory_primitives::{Info, NcError, Process, Result, TextData, UniqueIdentifiable};

use crate::table::FactoryTable;

/// Separates a forced data source from the name in `<factory>::<name>`.
pub const FORCED_SOURCE_SEPARATOR: &str = "::";

/// Capability a factory provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryKind {
	TextData,
	Info,
	Scatter,
	Absorption,
}

impl FactoryKind {
	pub const ALL: [FactoryKind; 4] = [Self::TextData, Self::Info, Self::Scatter, Self::Absorption];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::TextData => "text data",
			Self::Info => "info",
			Self::Scatter => "scatter",
			Self::Absorption => "absorption",
		}
	}
}

impl fmt::Display for FactoryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A provider of one capability.
pub trait Factory<R: FactoryRequest>: Send + Sync {
	/// Unique name within its capability.
	fn name(&self) -> &str;

	/// Higher wins among factories able to handle a request.
	fn priority(&self) -> i16 {
		100
	}

	/// Whether this factory can serve `request`. Must be cheap.
	fn can_handle(&self, request: &R) -> bool;

	fn produce(&self, request: &R) -> Result<R::Product>;
}

/// A request for one capability.
pub trait FactoryRequest: Send + Sync + Sized + 'static {
	type Product: Clone + Send + Sync;

	const KIND: FactoryKind;

	/// Factory explicitly named by the request, bypassing priority selection.
	fn forced_factory(&self) -> Option<String>;

	/// Short description for error messages.
	fn describe(&self) -> String;

	/// Validates the request before any factory sees it.
	fn check(&self) -> Result<()> {
		Ok(())
	}

	/// Error reported when no factory can handle the request.
	fn no_match(&self, message: String) -> NcError {
		NcError::calc(message)
	}

	#[doc(hidden)]
	fn table(set: &FactorySet) -> &FactoryTable<Self>;
}

/// The factory tables of one registry, one per capability.
#[derive(Default)]
pub struct FactorySet {
	pub(crate) text_data: FactoryTable<TextDataRequest>,
	pub(crate) info: FactoryTable<InfoRequest>,
	pub(crate) scatter: FactoryTable<ScatterRequest>,
	pub(crate) absorption: FactoryTable<AbsorptionRequest>,
}

impl FactorySet {
	pub(crate) fn names(&self, kind: FactoryKind) -> Vec<String> {
		match kind {
			FactoryKind::TextData => self.text_data.names(),
			FactoryKind::Info => self.info.names(),
			FactoryKind::Scatter => self.scatter.names(),
			FactoryKind::Absorption => self.absorption.names(),
		}
	}
}

/// Resolve a data locator to its text content.
///
/// `"relpath::data/Al.ncmat"` forces the `relpath` source for `data/Al.ncmat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDataRequest {
	source: Option<String>,
	name: String,
}

impl TextDataRequest {
	pub fn new(locator: &str) -> Self {
		match locator.split_once(FORCED_SOURCE_SEPARATOR) {
			Some((source, name)) if !source.is_empty() => Self {
				source: Some(source.to_string()),
				name: name.to_string(),
			},
			_ => Self {
				source: None,
				name: locator.to_string(),
			},
		}
	}

	/// Locator without a forced source prefix.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn forced_source(&self) -> Option<&str> {
		self.source.as_deref()
	}
}

impl FactoryRequest for TextDataRequest {
	type Product = Arc<TextData>;
	const KIND: FactoryKind = FactoryKind::TextData;

	fn forced_factory(&self) -> Option<String> {
		self.source.clone()
	}

	fn describe(&self) -> String {
		format!("\"{}\"", self.name)
	}

	fn no_match(&self, message: String) -> NcError {
		NcError::file_not_found(message)
	}

	fn table(set: &FactorySet) -> &FactoryTable<Self> {
		&set.text_data
	}
}

/// Parse resolved text data into [`Info`].
#[derive(Debug)]
pub struct InfoRequest {
	data: Arc<TextData>,
	cfg: MatCfg,
}

impl InfoRequest {
	pub fn new(data: Arc<TextData>, cfg: MatCfg) -> Self {
		Self { data, cfg }
	}

	pub fn data(&self) -> &Arc<TextData> {
		&self.data
	}

	pub fn cfg(&self) -> &MatCfg {
		&self.cfg
	}
}

impl FactoryRequest for InfoRequest {
	type Product = Arc<Info>;
	const KIND: FactoryKind = FactoryKind::Info;

	fn forced_factory(&self) -> Option<String> {
		non_empty(self.cfg.infofactory())
	}

	fn describe(&self) -> String {
		format!("\"{}\" ({})", self.data.locator(), self.data.unique_id())
	}

	fn check(&self) -> Result<()> {
		self.cfg.check_consistency()
	}

	fn table(set: &FactorySet) -> &FactoryTable<Self> {
		&set.info
	}
}

macro_rules! process_request {
	($(#[$attr:meta])* $name:ident, $kind:ident, $table:ident, $forced:ident) => {
		$(#[$attr])*
		#[derive(Debug)]
		pub struct $name {
			info: Arc<Info>,
			cfg: MatCfg,
		}

		impl $name {
			pub fn new(info: Arc<Info>, cfg: MatCfg) -> Self {
				Self { info, cfg }
			}

			pub fn info(&self) -> &Arc<Info> {
				&self.info
			}

			pub fn cfg(&self) -> &MatCfg {
				&self.cfg
			}
		}

		impl FactoryRequest for $name {
			type Product = Arc<dyn Process>;
			const KIND: FactoryKind = FactoryKind::$kind;

			fn forced_factory(&self) -> Option<String> {
				non_empty(self.cfg.$forced())
			}

			fn describe(&self) -> String {
				format!("\"{}\" ({})", self.cfg.locator(), self.info.unique_id())
			}

			fn check(&self) -> Result<()> {
				self.cfg.check_consistency()
			}

			fn table(set: &FactorySet) -> &FactoryTable<Self> {
				&set.$table
			}
		}
	};
}

process_request!(
	/// Build a scattering process from [`Info`].
	ScatterRequest, Scatter, scatter, scatterfactory
);
process_request!(
	/// Build an absorption process from [`Info`].
	AbsorptionRequest, Absorption, absorption, absorptionfactory
);

fn non_empty(s: String) -> Option<String> {
	(!s.is_empty()).then_some(s)
}
