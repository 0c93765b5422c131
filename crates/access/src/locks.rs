//! Per-key reader/writer locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Shared reader/writer lock guarding one working copy.
///
/// `parking_lot`'s lock is task-fair: a waiting writer blocks newly arriving
/// readers, so neither side starves.
pub type KeyLock = Arc<RwLock<()>>;

/// Maps working-copy paths to their lock.
///
/// Entries are created on first request and live as long as the registry.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
	locks: Mutex<HashMap<PathBuf, KeyLock>>,
}

impl KeyLockRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the lock for `key`, creating it if this is the first request.
	///
	/// Every call for the same key returns the same lock.
	pub fn lock_for(&self, key: &Path) -> KeyLock {
		let mut locks = self.locks.lock();
		if let Some(lock) = locks.get(key) {
			return Arc::clone(lock);
		}
		tracing::trace!(key = %key.display(), "Creating key lock");
		let lock = KeyLock::default();
		locks.insert(key.to_path_buf(), Arc::clone(&lock));
		lock
	}

	pub fn len(&self) -> usize {
		self.locks.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.locks.lock().is_empty()
	}
}
