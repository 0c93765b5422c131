//! Time source for refresh bookkeeping.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic clock consulted for staleness decisions.
pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	offset: Mutex<Duration>,
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}

impl ManualClock {
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
			offset: Mutex::new(Duration::ZERO),
		}
	}

	pub fn advance(&self, by: Duration) {
		*self.offset.lock() += by;
	}

	/// Time elapsed since the clock was created.
	pub fn elapsed(&self) -> Duration {
		*self.offset.lock()
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + *self.offset.lock()
	}
}
