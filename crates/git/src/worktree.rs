//! Read-only access to files in a working copy.
//!
//! Paths are interpreted relative to the working copy root. A leading `/` is
//! ignored and an absolute path that already points inside the root is
//! re-rooted, so callers may pass either form. Paths that would escape the
//! root are rejected, including paths that reach outside it through a symlink.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Normalizes `path` to a `/`-separated path relative to `root`.
///
/// Returns an empty string for the root itself.
pub fn relative(root: &Path, path: &str) -> Result<String> {
	let candidate = Path::new(path);
	let candidate = candidate.strip_prefix(root).unwrap_or(candidate);

	let mut parts = Vec::new();
	for component in candidate.components() {
		match component {
			Component::Normal(part) => {
				let part = part.to_str().ok_or_else(|| Error::InvalidPath(path.to_string()))?;
				parts.push(part);
			}
			Component::CurDir | Component::RootDir => {}
			Component::ParentDir | Component::Prefix(_) => return Err(Error::InvalidPath(path.to_string())),
		}
	}
	Ok(parts.join("/"))
}

/// Resolves `path` to an absolute location beneath `root`.
pub fn resolve(root: &Path, path: &str) -> Result<PathBuf> {
	let rel = relative(root, path)?;
	if rel.is_empty() { Ok(root.to_path_buf()) } else { Ok(root.join(rel)) }
}

/// Returns true if `path` names an existing file or directory.
pub fn exists(root: &Path, path: &str) -> Result<bool> {
	let target = resolve(root, path)?;
	if !target.exists() {
		return Ok(false);
	}
	contained(root, &target, path).map(|_| true)
}

/// Reads a UTF-8 file.
pub fn read_text(root: &Path, path: &str) -> Result<String> {
	let file = existing_file(root, path)?;
	fs::read_to_string(&file).map_err(|error| Error::io(file, error))
}

/// Reads a file as raw bytes.
pub fn read_bytes(root: &Path, path: &str) -> Result<Vec<u8>> {
	let file = existing_file(root, path)?;
	fs::read(&file).map_err(|error| Error::io(file, error))
}

fn existing_file(root: &Path, path: &str) -> Result<PathBuf> {
	let file = resolve(root, path)?;
	if !file.is_file() {
		return Err(Error::NotFound(path.to_string()));
	}
	contained(root, &file, path)
}

/// Resolves symlinks in `target` and checks the result still lies beneath `root`.
fn contained(root: &Path, target: &Path, path: &str) -> Result<PathBuf> {
	let real_root = fs::canonicalize(root).map_err(|error| Error::io(root, error))?;
	let real = match fs::canonicalize(target) {
		Ok(real) => real,
		Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound(path.to_string())),
		Err(error) => return Err(Error::io(target, error)),
	};
	if real.starts_with(&real_root) {
		Ok(real)
	} else {
		Err(Error::InvalidPath(path.to_string()))
	}
}
