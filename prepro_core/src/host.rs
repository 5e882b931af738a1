//! Filesystem access used by the render engine.
//!
//! The engine never touches the filesystem directly. Reading an included
//! file, resolving a relative path and taking the directory of the current
//! template all go through a [`Host`], so templates can be rendered from
//! disk ([`OsHost`]) or from memory ([`MemoryHost`]).

use std::collections::HashMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use crate::PreproError;
use crate::PreproResult;

/// Abstraction over synchronous, read-only filesystem access.
///
/// Implementations must be free of side effects beyond reading files; one
/// host may be shared by many renders.
pub trait Host: Send + Sync {
	/// The directory component of `path`. A bare file name yields `.`.
	fn dirname(&self, path: &Path) -> PathBuf;

	/// Read the whole file at `path` as UTF-8 text.
	fn read_file(&self, path: &Path) -> PreproResult<String>;

	/// Resolve `target` against `base_dir` when it is relative. Absolute
	/// targets are returned as-is (normalized).
	fn resolve_path(&self, base_dir: &Path, target: &Path) -> PathBuf;
}

/// The default host, backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsHost;

impl Host for OsHost {
	fn dirname(&self, path: &Path) -> PathBuf {
		dirname(path)
	}

	fn read_file(&self, path: &Path) -> PreproResult<String> {
		std::fs::read_to_string(path).map_err(|e| PreproError::io(path, e))
	}

	fn resolve_path(&self, base_dir: &Path, target: &Path) -> PathBuf {
		let joined = normalize_path(&base_dir.join(target));
		if joined.is_absolute() {
			return joined;
		}

		match std::env::current_dir() {
			Ok(cwd) => normalize_path(&cwd.join(joined)),
			Err(_) => joined,
		}
	}
}

/// A host serving files from an in-memory map.
///
/// Paths are normalized on insert and on lookup, so `/a/b/../c.txt` and
/// `/a/c.txt` name the same file. Relative paths stay relative; there is no
/// working directory to anchor them to.
///
/// ```rust
/// use std::path::Path;
/// use prepro_core::Host;
/// use prepro_core::MemoryHost;
///
/// let host = MemoryHost::new().with_file("/tpl/header.txt", "# generated\n");
/// let resolved = host.resolve_path(Path::new("/tpl/sub"), Path::new("../header.txt"));
/// assert_eq!(host.read_file(&resolved).unwrap(), "# generated\n");
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryHost {
	files: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`MemoryHost::insert`].
	#[must_use]
	pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
		self.insert(path, content);
		self
	}

	/// Add or replace a file.
	pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<String>) {
		let key = normalize_path(path.as_ref());
		if let Ok(mut files) = self.files.write() {
			files.insert(key, content.into());
		}
	}
}

impl Host for MemoryHost {
	fn dirname(&self, path: &Path) -> PathBuf {
		dirname(path)
	}

	fn read_file(&self, path: &Path) -> PreproResult<String> {
		let key = normalize_path(path);
		let content = self
			.files
			.read()
			.ok()
			.and_then(|files| files.get(&key).cloned());

		content.ok_or_else(|| {
			PreproError::io(
				path,
				std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in memory host"),
			)
		})
	}

	fn resolve_path(&self, base_dir: &Path, target: &Path) -> PathBuf {
		normalize_path(&base_dir.join(target))
	}
}

fn dirname(path: &Path) -> PathBuf {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
		Some(_) => PathBuf::from("."),
		None => path.to_path_buf(),
	}
}

/// Lexically remove `.` and `..` components. `..` never climbs above the
/// root; leading `..` in relative paths is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut parts: Vec<Component<'_>> = Vec::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				match parts.last() {
					Some(Component::Normal(_)) => {
						parts.pop();
					}
					Some(Component::RootDir | Component::Prefix(_)) => {}
					_ => parts.push(component),
				}
			}
			other => parts.push(other),
		}
	}

	if parts.is_empty() {
		return PathBuf::from(".");
	}

	parts.iter().collect()
}
