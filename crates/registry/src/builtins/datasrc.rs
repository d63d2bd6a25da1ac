//! Text-data sources.
//!
//! | name         | priority | resolves                                    |
//! |--------------|----------|---------------------------------------------|
//! | `virtual`    | 400      | files added via `Registry::register_virtual_file` |
//! | `relpath`    | 300      | relative paths from the working directory   |
//! | `abspath`    | 200      | absolute paths                              |
//! | `searchpath` | 100      | relative names under `data_search_paths`    |

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ncfactory_primitives::{NcError, Result, TextData};

use crate::factory::{Factory, TextDataRequest};
use crate::registry::VirtualFiles;
use crate::Registry;

pub const PLUGIN_NAME: &str = "stddatasrc";

pub const VIRTUAL: &str = "virtual";
pub const RELPATH: &str = "relpath";
pub const ABSPATH: &str = "abspath";
pub const SEARCHPATH: &str = "searchpath";

pub fn register(registry: &Registry) -> Result<()> {
	registry.register_factory::<TextDataRequest, _>(VirtualSource {
		files: registry.virtual_files(),
	})?;
	registry.register_factory::<TextDataRequest, _>(RelPathSource)?;
	registry.register_factory::<TextDataRequest, _>(AbsPathSource)?;
	registry.register_factory::<TextDataRequest, _>(SearchPathSource {
		dirs: registry.options().data_search_paths.clone(),
	})
}

struct VirtualSource {
	files: VirtualFiles,
}

impl Factory<TextDataRequest> for VirtualSource {
	fn name(&self) -> &str {
		VIRTUAL
	}

	fn priority(&self) -> i16 {
		400
	}

	fn can_handle(&self, request: &TextDataRequest) -> bool {
		self.files.read().contains_key(request.name())
	}

	fn produce(&self, request: &TextDataRequest) -> Result<Arc<TextData>> {
		let content = self
			.files
			.read()
			.get(request.name())
			.cloned()
			.ok_or_else(|| NcError::file_not_found(format!("no virtual file named \"{}\"", request.name())))?;
		Ok(Arc::new(TextData::new(request.name(), VIRTUAL, content)))
	}
}

struct RelPathSource;

impl Factory<TextDataRequest> for RelPathSource {
	fn name(&self) -> &str {
		RELPATH
	}

	fn priority(&self) -> i16 {
		300
	}

	fn can_handle(&self, request: &TextDataRequest) -> bool {
		let path = Path::new(request.name());
		path.is_relative() && path.is_file()
	}

	fn produce(&self, request: &TextDataRequest) -> Result<Arc<TextData>> {
		read_file(request.name(), Path::new(request.name()), RELPATH)
	}
}

struct AbsPathSource;

impl Factory<TextDataRequest> for AbsPathSource {
	fn name(&self) -> &str {
		ABSPATH
	}

	fn priority(&self) -> i16 {
		200
	}

	fn can_handle(&self, request: &TextDataRequest) -> bool {
		let path = Path::new(request.name());
		path.is_absolute() && path.is_file()
	}

	fn produce(&self, request: &TextDataRequest) -> Result<Arc<TextData>> {
		read_file(request.name(), Path::new(request.name()), ABSPATH)
	}
}

struct SearchPathSource {
	dirs: Vec<PathBuf>,
}

impl SearchPathSource {
	fn find(&self, name: &str) -> Option<PathBuf> {
		if name.is_empty() || Path::new(name).is_absolute() {
			return None;
		}
		self.dirs.iter().map(|dir| dir.join(name)).find(|p| p.is_file())
	}
}

impl Factory<TextDataRequest> for SearchPathSource {
	fn name(&self) -> &str {
		SEARCHPATH
	}

	fn priority(&self) -> i16 {
		100
	}

	fn can_handle(&self, request: &TextDataRequest) -> bool {
		self.find(request.name()).is_some()
	}

	fn produce(&self, request: &TextDataRequest) -> Result<Arc<TextData>> {
		let path = self.find(request.name()).ok_or_else(|| {
			NcError::file_not_found(format!("\"{}\" not found in any data search path", request.name()))
		})?;
		read_file(request.name(), &path, SEARCHPATH)
	}
}

fn read_file(locator: &str, path: &Path, source: &str) -> Result<Arc<TextData>> {
	let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
		io::ErrorKind::InvalidData => NcError::bad_input(format!("{} is not valid UTF-8 text", path.display())),
		_ => NcError::file_not_found(format!("could not read {}: {e}", path.display())),
	})?;
	tracing::trace!(locator, file = %path.display(), source, bytes = content.len(), "read text data");
	Ok(Arc::new(TextData::new(locator, source, content)))
}
