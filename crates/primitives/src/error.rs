use thiserror::Error;

/// Result type used throughout ncfactory.
pub type Result<T, E = NcError> = std::result::Result<T, E>;

/// Errors reported by configuration, plugin, factory and cache operations.
///
/// None of these are retried internally. Each message names the offending
/// parameter, plugin, factory or capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NcError {
	/// Malformed descriptor, unknown parameter, missing units or an
	/// inconsistent parameter combination.
	#[error("bad input: {0}")]
	BadInput(String),

	/// A plugin library or data locator could not be resolved.
	#[error("file not found: {0}")]
	FileNotFound(String),

	/// Invariant violation: duplicate plugin or factory names, no matching
	/// provider, or a mutation attempted while an access spy is attached.
	#[error("calculation error: {0}")]
	CalcError(String),

	/// A build needs data its source object does not carry.
	#[error("missing information: {0}")]
	MissingInfo(String),
}

/// Discriminant of [`NcError`] for matching without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	BadInput,
	FileNotFound,
	CalcError,
	MissingInfo,
}

impl NcError {
	pub fn bad_input(msg: impl Into<String>) -> Self {
		Self::BadInput(msg.into())
	}

	pub fn file_not_found(msg: impl Into<String>) -> Self {
		Self::FileNotFound(msg.into())
	}

	pub fn calc(msg: impl Into<String>) -> Self {
		Self::CalcError(msg.into())
	}

	pub fn missing_info(msg: impl Into<String>) -> Self {
		Self::MissingInfo(msg.into())
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::BadInput(_) => ErrorKind::BadInput,
			Self::FileNotFound(_) => ErrorKind::FileNotFound,
			Self::CalcError(_) => ErrorKind::CalcError,
			Self::MissingInfo(_) => ErrorKind::MissingInfo,
		}
	}

	/// The message without the category prefix.
	pub fn message(&self) -> &str {
		match self {
			Self::BadInput(m) | Self::FileNotFound(m) | Self::CalcError(m) | Self::MissingInfo(m) => m,
		}
	}
}
