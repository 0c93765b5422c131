//! Blocking entry point that runs tasks on the worker pool.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Instant;

use quarry_worker::{PoolStats, WorkerPool};
use tracing::warn;

use crate::action::ReadAction;
use crate::error::{Error, Result};
use crate::handle::RepoHandle;
use crate::locks::KeyLockRegistry;
use crate::task::Task;

/// Submits refresh-then-read tasks and waits for their results.
///
/// Callers block until their task completes. The pool bounds how many tasks
/// run at once; tasks start in submission order. Calling into the manager
/// from inside a [`ReadAction`] can deadlock once every worker is busy.
pub struct TaskManager {
	pool: WorkerPool,
	locks: Arc<KeyLockRegistry>,
}

impl TaskManager {
	/// Creates a manager with no workers; call [`Self::start`] before waiting
	/// on any task.
	pub fn new(locks: Arc<KeyLockRegistry>) -> Self {
		Self {
			pool: WorkerPool::new(),
			locks,
		}
	}

	/// Spawns `parallel_limit` workers. Fails if called twice.
	pub fn start(&self, parallel_limit: usize) -> Result<()> {
		self.pool.start(parallel_limit)?;
		Ok(())
	}

	/// Runs `action` against a fresh snapshot of `handle` and returns its result.
	pub fn run_task<A: ReadAction>(&self, handle: &Arc<RepoHandle>, action: A) -> Result<A::Output> {
		let done = self.submit(handle, action)?;
		done.recv().map_err(|_| Error::Abandoned)?
	}

	/// Like [`Self::run_task`], but gives up waiting at `deadline`.
	///
	/// On expiry the task keeps its place in the queue (or keeps running) and
	/// its result is discarded.
	pub fn run_task_until<A: ReadAction>(
		&self,
		handle: &Arc<RepoHandle>,
		action: A,
		deadline: Instant,
	) -> Result<A::Output> {
		let done = self.submit(handle, action)?;
		match done.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
			Ok(result) => result,
			Err(RecvTimeoutError::Timeout) => {
				warn!(repo = handle.name(), "Gave up waiting for task");
				Err(Error::Timeout)
			}
			Err(RecvTimeoutError::Disconnected) => Err(Error::Abandoned),
		}
	}

	/// Stops accepting tasks, finishes the queued ones and joins the workers.
	///
	/// Without a prior [`Self::start`] the queued tasks are dropped and their
	/// callers see [`Error::Abandoned`].
	pub fn shutdown(&self) {
		self.pool.shutdown();
	}

	pub fn locks(&self) -> &KeyLockRegistry {
		&self.locks
	}

	/// Tasks admitted but not yet started.
	pub fn queued(&self) -> usize {
		self.pool.queued()
	}

	pub fn stats(&self) -> PoolStats {
		self.pool.stats()
	}

	fn submit<A: ReadAction>(&self, handle: &Arc<RepoHandle>, action: A) -> Result<Receiver<Result<A::Output>>> {
		let lock = self.locks.lock_for(handle.path());
		let task = Task::new(Arc::clone(handle), lock, action);
		// Capacity 1 so the worker never blocks on a caller that stopped waiting.
		let (done, wait) = mpsc::sync_channel(1);
		self.pool.submit(move || {
			let _ = done.send(task.run());
		})?;
		Ok(wait)
	}
}
