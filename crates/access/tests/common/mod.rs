//! Shared setup for access layer integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use quarry_access::test_helpers::{FakeGit, StaticLocator};
use quarry_access::{KeyLockRegistry, ManualClock, RefreshPolicy, RepositoryRegistry, TaskManager};

/// Registry and started task manager over a [`FakeGit`] remote.
pub struct Fixture {
	pub git: Arc<FakeGit>,
	pub clock: Arc<ManualClock>,
	pub registry: RepositoryRegistry,
	pub tasks: TaskManager,
	pub dir: tempfile::TempDir,
}

pub const TTL: Duration = Duration::from_secs(300);

pub fn fixture(workers: usize) -> Fixture {
	let _ = tracing_subscriber::fmt::try_init();
	let dir = tempfile::tempdir().expect("failed to create temp dir");
	let git = Arc::new(FakeGit::new());
	let clock = Arc::new(ManualClock::new());

	let registry = RepositoryRegistry::new(dir.path().join("repos"), Arc::new(StaticLocator), git.clone())
		.expect("failed to create registry")
		.with_policy(RefreshPolicy {
			ttl: TTL,
			clone_depth: Some(100),
		})
		.with_clock(clock.clone());

	let tasks = TaskManager::new(Arc::new(KeyLockRegistry::new()));
	tasks.start(workers).expect("failed to start workers");

	Fixture {
		git,
		clock,
		registry,
		tasks,
		dir,
	}
}
