//! Interning of repository handles by storage location.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use quarry_git::{GitBackend, Locator};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::handle::{RefreshPolicy, RepoHandle, storage_path};

/// Returns one shared [`RepoHandle`] per working copy location.
///
/// Two requests that resolve to the same storage path receive the same handle,
/// so refresh bookkeeping is shared between all tasks touching that working
/// copy.
pub struct RepositoryRegistry {
	root: PathBuf,
	locator: Arc<dyn Locator>,
	backend: Arc<dyn GitBackend>,
	clock: Arc<dyn Clock>,
	policy: RefreshPolicy,
	repos: Mutex<HashMap<PathBuf, Arc<RepoHandle>>>,
}

impl RepositoryRegistry {
	/// Creates a registry storing working copies under `root`, creating the
	/// directory if needed.
	pub fn new(root: impl Into<PathBuf>, locator: Arc<dyn Locator>, backend: Arc<dyn GitBackend>) -> Result<Self> {
		let root = root.into();
		fs::create_dir_all(&root).map_err(|error| Error::Io {
			path: root.clone(),
			error,
		})?;
		Ok(Self {
			root,
			locator,
			backend,
			clock: Arc::new(SystemClock),
			policy: RefreshPolicy::default(),
			repos: Mutex::new(HashMap::new()),
		})
	}

	/// Refresh policy applied to handles created from now on.
	#[must_use]
	pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;
		self
	}

	#[must_use]
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Returns the handle for `name` at `variant`, creating it on first use.
	///
	/// Creating a handle does not touch the network or the working copy; the
	/// first task run against it performs the clone.
	pub fn get(&self, name: &str, variant: Option<&str>) -> Result<Arc<RepoHandle>> {
		let url = self.locator.repo_url(name).map_err(|source| Error::Locator {
			name: name.to_string(),
			source,
		})?;
		let path = storage_path(&self.root, &url, variant);

		let mut repos = self.repos.lock();
		if let Some(handle) = repos.get(&path) {
			return Ok(Arc::clone(handle));
		}
		debug!(repo = name, path = %path.display(), "Registering repository");
		let handle = Arc::new(RepoHandle::new(
			name.to_string(),
			url,
			variant.filter(|v| !v.is_empty()).map(str::to_string),
			path.clone(),
			self.policy,
			Arc::clone(&self.backend),
			Arc::clone(&self.clock),
		));
		repos.insert(path, Arc::clone(&handle));
		Ok(handle)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn policy(&self) -> RefreshPolicy {
		self.policy
	}

	pub fn len(&self) -> usize {
		self.repos.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.repos.lock().is_empty()
	}
}
