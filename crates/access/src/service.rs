//! Configuration-driven wiring of the access layer.

use std::sync::Arc;

use quarry_config::QuarryConfig;
use quarry_git::{CredentialProvider, GitBackend, GitCli, UrlFormatter};
use tracing::{debug, info, warn};

use crate::action::{ReadAction, action};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::handle::{RefreshPolicy, RepoHandle};
use crate::locks::KeyLockRegistry;
use crate::manager::TaskManager;
use crate::registry::RepositoryRegistry;

/// Repository registry, lock registry and task manager built from one
/// [`QuarryConfig`].
pub struct RepoService {
	formatter: Arc<UrlFormatter>,
	registry: RepositoryRegistry,
	tasks: TaskManager,
}

impl RepoService {
	/// Builds a service backed by the `git` executable and starts its workers.
	pub fn new(config: &QuarryConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
		let git = GitCli::new().with_credentials(credentials);
		if let Err(err) = git.ensure_available() {
			warn!(error = %err, "git is unavailable, refreshes will fail");
		}
		Self::with_backend(config, Arc::new(git), Arc::new(SystemClock))
	}

	/// Builds a service over an arbitrary backend and clock.
	pub fn with_backend(config: &QuarryConfig, backend: Arc<dyn GitBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
		let formatter = Arc::new(UrlFormatter::new(config.git.host.clone(), config.git.templates.clone()));

		let registry = RepositoryRegistry::new(&config.root_dir, formatter.clone(), backend)?
			.with_policy(RefreshPolicy::from_config(&config.refresh))
			.with_clock(clock);

		let tasks = TaskManager::new(Arc::new(KeyLockRegistry::new()));
		tasks.start(config.parallel_limit)?;

		info!(
			root = %config.root_dir.display(),
			workers = config.parallel_limit,
			ttl_secs = config.refresh.ttl_secs,
			"Repository service started"
		);
		Ok(Self {
			formatter,
			registry,
			tasks,
		})
	}

	/// Handle for `name` at `variant` (`None` tracks the remote default branch).
	pub fn repository(&self, name: &str, variant: Option<&str>) -> Result<Arc<RepoHandle>> {
		self.registry.get(name, variant)
	}

	/// Refreshes `name` at `variant` and reports whether a working copy is
	/// present afterwards.
	///
	/// A failed clone or update reads as absent. Locator and pool failures are
	/// still errors.
	pub fn repository_exists(&self, name: &str, variant: Option<&str>) -> Result<bool> {
		let handle = self.repository(name, variant)?;
		match self.run(&handle, action(|snapshot| Ok(snapshot.root().is_dir()))) {
			Err(Error::Refresh { repo, source }) => {
				debug!(repo, error = %source, "Repository unavailable");
				Ok(false)
			}
			other => other,
		}
	}

	/// Runs `action` against a fresh snapshot of `handle`.
	pub fn run<A: ReadAction>(&self, handle: &Arc<RepoHandle>, action: A) -> Result<A::Output> {
		self.tasks.run_task(handle, action)
	}

	pub fn registry(&self) -> &RepositoryRegistry {
		&self.registry
	}

	pub fn tasks(&self) -> &TaskManager {
		&self.tasks
	}

	/// Presentation URLs for commits, blobs and branches.
	pub fn formatter(&self) -> &UrlFormatter {
		&self.formatter
	}

	pub fn shutdown(&self) {
		self.tasks.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pretty_assertions::assert_eq;

	use super::*;
	use crate::clock::ManualClock;
	use crate::queries::ReadText;
	use crate::test_helpers::FakeGit;

	fn config(root: &std::path::Path) -> QuarryConfig {
		let mut config = QuarryConfig::from_toml_str(
			r#"
			parallel_limit = 2

			[refresh]
			ttl_secs = 60
			clone_depth = 5

			[git]
			host = "git.example.com"
			"#,
		)
		.unwrap();
		config.root_dir = root.join("repos");
		config
	}

	#[test]
	fn wires_configuration_into_components() {
		let dir = tempfile::tempdir().unwrap();
		let git = Arc::new(FakeGit::new());
		let service =
			RepoService::with_backend(&config(dir.path()), git.clone(), Arc::new(ManualClock::new())).unwrap();

		assert!(service.registry().root().is_dir());
		assert_eq!(
			service.registry().policy(),
			RefreshPolicy {
				ttl: Duration::from_secs(60),
				clone_depth: Some(5),
			}
		);

		let repo = service.repository("org/repo", None).unwrap();
		assert_eq!(repo.url(), "https://git.example.com/org/repo");
		assert_eq!(service.run(&repo, ReadText::new("README.md")).unwrap(), "# fake\n");
		assert_eq!(git.last_clone_options().and_then(|o| o.depth), Some(5));
		assert_eq!(
			service.formatter().commit_url("org/repo", "abc123").unwrap(),
			"https://git.example.com/org/repo/commit/abc123"
		);
	}

	#[test]
	fn configured_templates_reach_the_formatter() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = config(dir.path());
		config.git.templates.commit = "https://{{ git_host }}/{{ repo_name }}/-/commit/{{ sha }}".into();
		let service = RepoService::with_backend(&config, Arc::new(FakeGit::new()), Arc::new(ManualClock::new())).unwrap();

		assert_eq!(
			service.formatter().commit_url("org/repo", "abc123").unwrap(),
			"https://git.example.com/org/repo/-/commit/abc123"
		);
		assert_eq!(
			service.formatter().branch_url("org/repo", "main").unwrap(),
			"https://git.example.com/org/repo/tree/main"
		);
	}

	#[test]
	fn repository_exists_reflects_refresh_outcome() {
		let dir = tempfile::tempdir().unwrap();
		let git = Arc::new(FakeGit::new());
		let service =
			RepoService::with_backend(&config(dir.path()), git.clone(), Arc::new(ManualClock::new())).unwrap();

		git.fail_clones(true);
		assert!(!service.repository_exists("org/repo", None).unwrap());

		git.fail_clones(false);
		assert!(service.repository_exists("org/repo", None).unwrap());
		assert!(service.repository("org/repo", None).unwrap().path().is_dir());
		assert_eq!(git.clones(), 2);
	}

	#[test]
	fn shutdown_rejects_further_work() {
		let dir = tempfile::tempdir().unwrap();
		let service =
			RepoService::with_backend(&config(dir.path()), Arc::new(FakeGit::new()), Arc::new(ManualClock::new()))
				.unwrap();
		let repo = service.repository("org/repo", None).unwrap();

		service.shutdown();
		assert!(matches!(
			service.run(&repo, ReadText::new("README.md")),
			Err(crate::Error::Pool(_))
		));
	}
}
