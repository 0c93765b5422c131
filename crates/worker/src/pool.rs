//! Fixed-size worker pool draining one shared FIFO queue.
//!
//! Every submitted job runs on one of `N` long-lived threads, so `N` bounds how
//! many jobs execute at once across the whole process. Jobs are started in
//! admission order; a job that blocks (for example on a lock) keeps its worker
//! busy, which can delay unrelated jobs queued behind it.
//!
//! The submitter's tracing span is captured at [`WorkerPool::submit`] and
//! entered on the worker while the job runs, so logs emitted by the job nest
//! under the originating span.
//!
//! A panicking job is caught and logged; the worker then moves on to the next
//! job. Shutdown closes the queue to new work, lets the workers drain what was
//! already admitted, then joins them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::PoolError;
use crate::queue::DispatchQueue;
use crate::spawn::{panic_message, spawn_named_thread};

/// A unit of work executed by a pool worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Envelope {
	job: Job,
	span: tracing::Span,
}

#[derive(Debug, Default)]
struct Counters {
	submitted: AtomicU64,
	completed: AtomicU64,
	panicked: AtomicU64,
}

/// Point-in-time counters for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
	/// Jobs accepted by [`WorkerPool::submit`].
	pub submitted: u64,
	/// Jobs that ran to completion.
	pub completed: u64,
	/// Jobs that panicked while running.
	pub panicked: u64,
}

#[derive(Default)]
struct Workers {
	started: bool,
	handles: Vec<JoinHandle<()>>,
}

/// Pool of named worker threads fed by a [`DispatchQueue`].
///
/// Jobs may be submitted before [`Self::start`]; they wait in the queue until
/// workers exist.
pub struct WorkerPool {
	queue: Arc<DispatchQueue<Envelope>>,
	counters: Arc<Counters>,
	workers: Mutex<Workers>,
}

impl Default for WorkerPool {
	fn default() -> Self {
		Self::new()
	}
}

impl WorkerPool {
	/// Creates a pool with an open queue and no workers.
	pub fn new() -> Self {
		Self {
			queue: Arc::new(DispatchQueue::new()),
			counters: Arc::new(Counters::default()),
			workers: Mutex::new(Workers::default()),
		}
	}

	/// Spawns `parallel_limit` workers. May only be called once.
	pub fn start(&self, parallel_limit: usize) -> Result<(), PoolError> {
		if parallel_limit == 0 {
			return Err(PoolError::InvalidParallelism);
		}

		let mut workers = self.workers.lock();
		if workers.started {
			return Err(PoolError::AlreadyStarted);
		}
		if self.queue.is_closed() {
			return Err(PoolError::Closed);
		}
		workers.started = true;

		for index in 0..parallel_limit {
			let queue = Arc::clone(&self.queue);
			let counters = Arc::clone(&self.counters);
			match spawn_named_thread(format!("quarry-worker-{index}"), move || run_worker(&queue, &counters)) {
				Ok(handle) => workers.handles.push(handle),
				Err(err) => {
					error!(error = %err, index, "worker.spawn_failed");
					return Err(PoolError::Spawn(err));
				}
			}
		}

		debug!(workers = parallel_limit, "worker.pool_started");
		Ok(())
	}

	/// Admits a job at the tail of the queue.
	pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
	where
		F: FnOnce() + Send + 'static,
	{
		let envelope = Envelope {
			job: Box::new(job),
			span: tracing::Span::current(),
		};
		self.queue.push(envelope).map_err(|_| PoolError::Closed)?;
		self.counters.submitted.fetch_add(1, Ordering::Relaxed);
		trace!(queued = self.queue.len(), "worker.submit");
		Ok(())
	}

	/// Closes the queue, waits for admitted jobs to drain and joins the workers.
	///
	/// A pool that was never started has nobody to run its queue, so admitted
	/// jobs are dropped instead. Idempotent. Must not be called from inside a job.
	pub fn shutdown(&self) {
		self.queue.close();
		let handles = std::mem::take(&mut self.workers.lock().handles);
		if handles.is_empty() {
			self.discard_queued();
			return;
		}

		let current = std::thread::current().id();
		for handle in handles {
			if handle.thread().id() == current {
				continue;
			}
			if handle.join().is_err() {
				error!("worker.join_failed");
			}
		}
		debug!("worker.pool_stopped");
	}

	fn discard_queued(&self) {
		let mut discarded = 0usize;
		while let Some(envelope) = self.queue.try_pop() {
			drop(envelope);
			discarded += 1;
		}
		if discarded > 0 {
			warn!(discarded, "worker.jobs_discarded");
		}
	}

	/// Returns true once [`Self::shutdown`] has closed the queue.
	pub fn is_closed(&self) -> bool {
		self.queue.is_closed()
	}

	/// Number of live worker threads.
	pub fn workers(&self) -> usize {
		self.workers.lock().handles.len()
	}

	/// Jobs admitted but not yet picked up by a worker.
	pub fn queued(&self) -> usize {
		self.queue.len()
	}

	pub fn stats(&self) -> PoolStats {
		PoolStats {
			submitted: self.counters.submitted.load(Ordering::Relaxed),
			completed: self.counters.completed.load(Ordering::Relaxed),
			panicked: self.counters.panicked.load(Ordering::Relaxed),
		}
	}
}

impl Drop for WorkerPool {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn run_worker(queue: &DispatchQueue<Envelope>, counters: &Counters) {
	while let Some(Envelope { job, span }) = queue.pop() {
		let _guard = span.enter();
		match panic::catch_unwind(AssertUnwindSafe(job)) {
			Ok(()) => {
				counters.completed.fetch_add(1, Ordering::Relaxed);
			}
			Err(payload) => {
				counters.panicked.fetch_add(1, Ordering::Relaxed);
				let message = panic_message(payload.as_ref()).unwrap_or_else(|| "<non-string payload>".to_string());
				error!(panic = %message, "worker.job_panicked");
			}
		}
	}
	trace!("worker.exit");
}

#[cfg(test)]
mod tests;
