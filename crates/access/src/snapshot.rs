use std::path::Path;

use quarry_git::{Branch, Commit, GitBackend, ObjectId, Result, worktree};

use crate::handle::RepoHandle;

/// Read-only view of a working copy.
///
/// A snapshot only exists inside a running task while the key's reader lock is
/// held, so nothing it returns can observe a refresh in progress.
pub struct Snapshot<'a> {
	handle: &'a RepoHandle,
	backend: &'a dyn GitBackend,
}

impl<'a> Snapshot<'a> {
	pub(crate) fn new(handle: &'a RepoHandle, backend: &'a dyn GitBackend) -> Self {
		Self { handle, backend }
	}

	pub fn name(&self) -> &str {
		self.handle.name()
	}

	pub fn variant(&self) -> Option<&str> {
		self.handle.variant()
	}

	/// Working copy root on disk.
	pub fn root(&self) -> &Path {
		self.handle.path()
	}

	pub fn exists(&self, path: &str) -> Result<bool> {
		worktree::exists(self.root(), path)
	}

	/// Reads a UTF-8 file; [`NotFound`](quarry_git::Error::NotFound) if absent.
	pub fn read_text(&self, path: &str) -> Result<String> {
		worktree::read_text(self.root(), path)
	}

	pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
		worktree::read_bytes(self.root(), path)
	}

	/// Object id of the file at `path` in `HEAD`.
	pub fn blob_id(&self, path: &str) -> Result<ObjectId> {
		let relative = worktree::relative(self.root(), path)?;
		if relative.is_empty() {
			return Err(quarry_git::Error::InvalidPath(path.to_string()));
		}
		self.backend.blob_id(self.root(), &relative)
	}

	pub fn head(&self) -> Result<ObjectId> {
		self.backend.head(self.root())
	}

	/// Branch checked out in this working copy. For the default variant this is
	/// the remote's default branch.
	pub fn default_branch(&self) -> Result<String> {
		self.backend.current_branch(self.root())
	}

	pub fn branches(&self) -> Result<Vec<Branch>> {
		self.backend.branches(self.root())
	}

	/// Up to `limit` commits reachable from `HEAD`, newest first.
	pub fn commits(&self, limit: usize) -> Result<Vec<Commit>> {
		self.backend.log(self.root(), limit)
	}
}
