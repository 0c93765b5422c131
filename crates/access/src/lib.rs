//! Concurrent access to cached git working copies.
//!
//! Each remote repository (and optional branch variant) is materialized once
//! under a storage root and kept fresh on a TTL. All access goes through a
//! [`TaskManager`], which runs a refresh-then-read task on a fixed worker pool:
//!
//! 1. If the working copy is stale, the task takes the key's writer lock and
//!    refreshes it. Staleness is checked again under the lock, so concurrent
//!    first accesses converge on a single clone.
//! 2. The task then takes the key's reader lock and runs a [`ReadAction`]
//!    against a [`Snapshot`] of the working copy.
//!
//! Readers on the same key run concurrently; writers are exclusive. Keys never
//! block each other.
//!
//! ```no_run
//! use quarry_access::{RepoService, queries::ReadText};
//! use quarry_config::QuarryConfig;
//! use quarry_git::CredentialStore;
//! use std::sync::Arc;
//!
//! # fn main() -> quarry_access::Result<()> {
//! let service = RepoService::new(&QuarryConfig::default(), Arc::new(CredentialStore::new()))?;
//! let repo = service.repository("rust-lang/rust", None)?;
//! let readme = service.run(&repo, ReadText::new("README.md"))?;
//! # Ok(())
//! # }
//! ```

mod action;
mod clock;
mod error;
mod handle;
mod locks;
mod manager;
pub mod queries;
mod registry;
mod service;
mod snapshot;
mod task;
#[doc(hidden)]
pub mod test_helpers;

pub use action::{ReadAction, action};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use handle::{DEFAULT_VARIANT_DIR, RefreshOutcome, RefreshPolicy, RepoHandle, storage_path};
pub use locks::{KeyLock, KeyLockRegistry};
pub use manager::TaskManager;
pub use registry::RepositoryRegistry;
pub use service::RepoService;
pub use snapshot::Snapshot;
