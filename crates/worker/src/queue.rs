use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Error returned when pushing into a closed queue.
///
/// Carries the rejected item back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

struct QueueState<T> {
	items: VecDeque<T>,
	closed: bool,
}

/// Unbounded blocking FIFO shared by every worker of a pool.
///
/// Items are handed out strictly in admission order. Closing the queue rejects
/// further pushes but lets consumers drain what was already admitted; [`Self::pop`]
/// returns `None` only once the queue is both closed and empty.
pub struct DispatchQueue<T> {
	state: Mutex<QueueState<T>>,
	available: Condvar,
}

impl<T> Default for DispatchQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> DispatchQueue<T> {
	/// Creates an empty open queue.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(QueueState {
				items: VecDeque::new(),
				closed: false,
			}),
			available: Condvar::new(),
		}
	}

	/// Appends an item to the tail and wakes one waiting consumer.
	pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(QueueClosed(item));
		}
		state.items.push_back(item);
		drop(state);
		self.available.notify_one();
		Ok(())
	}

	/// Takes the head item, blocking while the queue is open and empty.
	pub fn pop(&self) -> Option<T> {
		let mut state = self.state.lock();
		loop {
			if let Some(item) = state.items.pop_front() {
				return Some(item);
			}
			if state.closed {
				return None;
			}
			self.available.wait(&mut state);
		}
	}

	/// Takes the head item without blocking.
	pub fn try_pop(&self) -> Option<T> {
		self.state.lock().items.pop_front()
	}

	/// Rejects further pushes and wakes every blocked consumer.
	pub fn close(&self) {
		self.state.lock().closed = true;
		self.available.notify_all();
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Number of admitted items not yet taken by a consumer.
	pub fn len(&self) -> usize {
		self.state.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
