//! Worker pool primitives for serialized resource access.
//!
//! A [`WorkerPool`] owns a fixed number of named OS threads draining a single
//! [`DispatchQueue`]. Callers submit boxed jobs; completion signalling is left to
//! the caller (see `quarry-access`).

mod pool;
mod queue;
mod spawn;

use thiserror::Error;

pub use pool::{Job, PoolStats, WorkerPool};
pub use queue::{DispatchQueue, QueueClosed};
pub use spawn::spawn_named_thread;

/// Errors reported by [`WorkerPool`].
#[derive(Debug, Error)]
pub enum PoolError {
	/// The pool has been shut down and no longer accepts work.
	#[error("worker pool is shut down")]
	Closed,
	/// [`WorkerPool::start`] was called more than once.
	#[error("worker pool already started")]
	AlreadyStarted,
	/// A pool needs at least one worker.
	#[error("parallel limit must be at least 1")]
	InvalidParallelism,
	/// The OS refused to spawn a worker thread.
	#[error("failed to spawn worker thread: {0}")]
	Spawn(#[from] std::io::Error),
}
