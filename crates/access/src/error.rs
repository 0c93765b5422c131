use std::path::PathBuf;

use quarry_worker::PoolError;
use thiserror::Error;

/// Errors surfaced to callers of [`TaskManager`](crate::TaskManager).
#[derive(Debug, Error)]
pub enum Error {
	/// The working copy was stale and could not be refreshed. The read action
	/// did not run.
	#[error("failed to refresh {repo}: {source}")]
	Refresh { repo: String, source: quarry_git::Error },
	/// The read action failed against a fresh snapshot.
	#[error(transparent)]
	Read(#[from] quarry_git::Error),
	/// The repository name could not be turned into a remote URL.
	#[error("cannot locate repository {name}: {source}")]
	Locator { name: String, source: quarry_git::Error },
	#[error("I/O error at {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },
	#[error(transparent)]
	Pool(#[from] PoolError),
	/// The task ended without reporting a result (its body panicked).
	#[error("task ended without a result")]
	Abandoned,
	/// The caller's deadline passed before the task completed.
	#[error("timed out waiting for task")]
	Timeout,
}

impl Error {
	/// Returns true when a read action reported a missing path or revision.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::Read(err) if err.is_not_found())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
