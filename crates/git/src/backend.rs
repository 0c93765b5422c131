use std::path::Path;

use crate::Result;
use crate::model::{Branch, Commit, ObjectId};

/// Options for materializing a fresh working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
	/// History depth; `None` clones the full history.
	pub depth: Option<u32>,
	/// Branch to check out instead of the remote default.
	pub branch: Option<String>,
}

/// Primitive operations on a git working copy.
///
/// Implementations must be callable from any worker thread. They perform no
/// locking; the caller guarantees that mutating calls on a directory never
/// overlap with other calls on the same directory.
pub trait GitBackend: Send + Sync {
	/// Clones `url` into `dest`, which must not exist or be empty.
	fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions) -> Result<()>;

	/// Fetches `reference` from `url` into `FETCH_HEAD`.
	fn fetch(&self, dir: &Path, url: &str, reference: &str, depth: Option<u32>) -> Result<()>;

	/// Moves the checked out branch and working tree to `target`, discarding local changes.
	fn reset_hard(&self, dir: &Path, target: &str) -> Result<()>;

	/// Removes untracked and ignored files.
	fn clean(&self, dir: &Path) -> Result<()>;

	/// Commit currently checked out.
	fn head(&self, dir: &Path) -> Result<ObjectId>;

	/// Short name of the checked out branch (`HEAD` when detached).
	fn current_branch(&self, dir: &Path) -> Result<String>;

	/// Object id of `path` in the tree of `HEAD`.
	fn blob_id(&self, dir: &Path, path: &str) -> Result<ObjectId>;

	/// Local branches with their head commits.
	fn branches(&self, dir: &Path) -> Result<Vec<Branch>>;

	/// Up to `limit` commits reachable from `HEAD`, newest first.
	fn log(&self, dir: &Path, limit: usize) -> Result<Vec<Commit>>;
}
