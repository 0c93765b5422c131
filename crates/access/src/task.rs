//! The refresh-then-read unit of work.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::action::ReadAction;
use crate::error::{Error, Result};
use crate::handle::RepoHandle;
use crate::locks::KeyLock;

/// One read request bound to a working copy and its lock.
pub(crate) struct Task<A> {
	handle: Arc<RepoHandle>,
	lock: KeyLock,
	action: A,
}

impl<A: ReadAction> Task<A> {
	pub(crate) fn new(handle: Arc<RepoHandle>, lock: KeyLock, action: A) -> Self {
		Self { handle, lock, action }
	}

	/// Refreshes the working copy if stale, then runs the action under the
	/// reader lock.
	pub(crate) fn run(self) -> Result<A::Output> {
		let repo = self.handle.name();

		if self.handle.needs_refresh() {
			let _writer = self.lock.write();
			// Another task may have refreshed while this one waited for the lock.
			if self.handle.needs_refresh() {
				if let Err(source) = self.handle.refresh() {
					error!(repo, path = %self.handle.path().display(), error = %source, "Refresh failed");
					return Err(Error::Refresh {
						repo: repo.to_string(),
						source,
					});
				}
			} else {
				trace!(repo, "Refreshed by a concurrent task");
			}
		}

		let _reader = self.lock.read();
		let snapshot = self.handle.snapshot();
		self.action.read(&snapshot).map_err(|err| {
			debug!(repo, error = %err, "Read action failed");
			Error::Read(err)
		})
	}
}
