//! Versioned-storage substrate for cached repository working copies.
//!
//! This crate wraps the `git` executable behind the [`GitBackend`] trait and
//! provides the read-only file access, credential table, URL formatting and
//! commit models used by `quarry-access`. It holds no locks and no caches of
//! its own; callers are responsible for serializing access to a working copy.

mod backend;
mod cli;
mod credentials;
mod formatter;
mod model;
pub mod worktree;

use std::path::PathBuf;

use thiserror::Error;

pub use backend::{CloneOptions, GitBackend};
pub use cli::GitCli;
pub use credentials::{Credential, CredentialKind, CredentialProvider, CredentialStore};
pub use formatter::{Locator, UrlFormatter, UrlTemplates};
pub use model::{Branch, Commit, ObjectId, Signature};

/// Errors raised by git and working-copy operations.
#[derive(Debug, Error)]
pub enum Error {
	#[error("git is not available on PATH")]
	GitNotAvailable,
	#[error("git {command} failed: {stderr}")]
	GitCommand { command: String, stderr: String },
	#[error("I/O error at {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },
	/// A path or revision does not exist in the current snapshot.
	#[error("{0} not found")]
	NotFound(String),
	#[error("invalid repository path: {0}")]
	InvalidPath(String),
	#[error("failed to parse git output: {0}")]
	Parse(String),
	#[error("template error: {0}")]
	Template(String),
	#[error("credentials of kind {0} are already registered")]
	CredentialExists(CredentialKind),
}

impl Error {
	/// Returns true for [`Error::NotFound`].
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}

	pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
		Self::Io { path: path.into(), error }
	}
}

/// Result type for substrate operations.
pub type Result<T> = std::result::Result<T, Error>;
