//! Cached working copies and their refresh bookkeeping.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use quarry_git::{CloneOptions, GitBackend, ObjectId};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::snapshot::Snapshot;

/// Directory name used for a working copy of the remote's default branch.
pub const DEFAULT_VARIANT_DIR: &str = "__default__";

/// Freshness window and history depth applied to every working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
	/// How long a successful refresh keeps the working copy fresh.
	pub ttl: Duration,
	/// History depth for clones and fetches; `None` fetches everything.
	pub clone_depth: Option<u32>,
}

impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			ttl: Duration::from_secs(300),
			clone_depth: Some(100),
		}
	}
}

impl RefreshPolicy {
	pub fn from_config(config: &quarry_config::RefreshConfig) -> Self {
		Self {
			ttl: config.ttl(),
			clone_depth: Some(config.clone_depth),
		}
	}
}

/// What a successful refresh did to the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// No working copy existed; a fresh clone was made.
	Cloned { head: ObjectId },
	/// The working copy moved to a new commit.
	Updated { from: ObjectId, to: ObjectId },
	/// The remote had nothing new.
	UpToDate { head: ObjectId },
	/// Incremental update failed; the working copy was deleted and cloned again.
	Recloned { head: ObjectId },
}

impl RefreshOutcome {
	/// Commit checked out after the refresh.
	pub fn head(&self) -> &ObjectId {
		match self {
			Self::Cloned { head } | Self::UpToDate { head } | Self::Recloned { head } => head,
			Self::Updated { to, .. } => to,
		}
	}

	/// Returns true unless the refresh found the working copy already current.
	pub fn changed(&self) -> bool {
		!matches!(self, Self::UpToDate { .. })
	}
}

/// One cached working copy of a remote repository.
///
/// Handles are created by [`RepositoryRegistry`](crate::RepositoryRegistry) and
/// shared between tasks. The handle itself holds no reader/writer lock; tasks
/// acquire the key lock for [`RepoHandle::path`] before refreshing or reading.
pub struct RepoHandle {
	name: String,
	url: String,
	variant: Option<String>,
	path: PathBuf,
	policy: RefreshPolicy,
	backend: Arc<dyn GitBackend>,
	clock: Arc<dyn Clock>,
	last_refresh: Mutex<Option<Instant>>,
}

impl fmt::Debug for RepoHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RepoHandle")
			.field("name", &self.name)
			.field("url", &self.url)
			.field("variant", &self.variant)
			.field("path", &self.path)
			.field("last_refresh", &*self.last_refresh.lock())
			.finish_non_exhaustive()
	}
}

impl RepoHandle {
	pub(crate) fn new(
		name: String,
		url: String,
		variant: Option<String>,
		path: PathBuf,
		policy: RefreshPolicy,
		backend: Arc<dyn GitBackend>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			name,
			url,
			variant,
			path,
			policy,
			backend,
			clock,
			last_refresh: Mutex::new(None),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Branch this working copy tracks; `None` tracks the remote default.
	pub fn variant(&self) -> Option<&str> {
		self.variant.as_deref()
	}

	/// Working copy location. Also the key for the lock registry.
	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn policy(&self) -> RefreshPolicy {
		self.policy
	}

	/// Instant of the last successful refresh, if any.
	pub fn last_refresh(&self) -> Option<Instant> {
		*self.last_refresh.lock()
	}

	/// Returns true if the working copy has never been refreshed or its last
	/// refresh is older than the TTL.
	pub fn needs_refresh(&self) -> bool {
		match *self.last_refresh.lock() {
			None => true,
			Some(at) => self.clock.now().saturating_duration_since(at) > self.policy.ttl,
		}
	}

	/// Brings the working copy up to date with the remote.
	///
	/// The caller must hold the key's writer lock. On failure the refresh
	/// timestamp is left untouched, so the next task retries.
	pub(crate) fn refresh(&self) -> quarry_git::Result<RefreshOutcome> {
		let outcome = if self.path.exists() {
			match self.update() {
				Ok(outcome) => outcome,
				Err(err) => {
					warn!(
						repo = %self.name,
						path = %self.path.display(),
						error = %err,
						"Incremental update failed, cloning from scratch"
					);
					RefreshOutcome::Recloned {
						head: self.materialize()?,
					}
				}
			}
		} else {
			RefreshOutcome::Cloned {
				head: self.materialize()?,
			}
		};

		*self.last_refresh.lock() = Some(self.clock.now());
		info!(
			repo = %self.name,
			variant = self.variant.as_deref().unwrap_or(DEFAULT_VARIANT_DIR),
			head = %outcome.head().short(),
			changed = outcome.changed(),
			"Refreshed working copy"
		);
		Ok(outcome)
	}

	pub(crate) fn snapshot(&self) -> Snapshot<'_> {
		Snapshot::new(self, self.backend.as_ref())
	}

	fn update(&self) -> quarry_git::Result<RefreshOutcome> {
		let before = self.backend.head(&self.path)?;
		let reference = self.variant.as_deref().unwrap_or("HEAD");
		debug!(repo = %self.name, reference, "Fetching");
		self.backend.fetch(&self.path, &self.url, reference, self.policy.clone_depth)?;
		self.backend.reset_hard(&self.path, "FETCH_HEAD")?;
		self.backend.clean(&self.path)?;
		let after = self.backend.head(&self.path)?;

		Ok(if before == after {
			RefreshOutcome::UpToDate { head: after }
		} else {
			RefreshOutcome::Updated { from: before, to: after }
		})
	}

	fn materialize(&self) -> quarry_git::Result<ObjectId> {
		if self.path.exists() {
			fs::remove_dir_all(&self.path).map_err(|error| quarry_git::Error::Io {
				path: self.path.clone(),
				error,
			})?;
		}
		info!(repo = %self.name, path = %self.path.display(), "Cloning repository");
		let options = CloneOptions {
			depth: self.policy.clone_depth,
			branch: self.variant.clone(),
		};
		self.backend.clone_repo(&self.url, &self.path, &options)?;
		self.backend.head(&self.path)
	}
}

/// Derives the working copy location for `url` under `root`.
///
/// The URL scheme is dropped and `:` (scp-like remotes) becomes a path
/// separator, so `https://host/org/repo` and `git@host:org/repo` map to
/// `root/host/org/repo/<variant>` and `root/git@host/org/repo/<variant>`.
/// Empty, `.` and `..` components are discarded. The variant is encoded into a
/// single path component; `None` maps to [`DEFAULT_VARIANT_DIR`], and a branch
/// literally named like that directory is escaped so the two never collide.
pub fn storage_path(root: &Path, url: &str, variant: Option<&str>) -> PathBuf {
	let remote = url.split_once("://").map_or(url, |(_, rest)| rest);
	let mut path = root.to_path_buf();
	for part in remote.split(['/', ':', '\\']) {
		if !matches!(part, "" | "." | "..") {
			path.push(part);
		}
	}
	match variant.filter(|v| !v.is_empty()) {
		Some(variant) => path.push(encode_variant(variant)),
		None => path.push(DEFAULT_VARIANT_DIR),
	}
	path
}

fn encode_variant(variant: &str) -> String {
	if matches!(variant, "." | "..") {
		return variant.replace('.', "%2E");
	}
	if variant == DEFAULT_VARIANT_DIR {
		return format!("%5F{}", &variant[1..]);
	}
	variant.replace('%', "%25").replace('/', "%2F").replace('\\', "%5C")
}
