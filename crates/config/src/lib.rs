//! Configuration for the repository cache.
//!
//! Configuration is written in TOML. Every field is optional and falls back to
//! the defaults below; environment variables override file values.
//!
//! ```toml
//! root_dir = "/var/cache/quarry"
//! parallel_limit = 20
//!
//! [refresh]
//! ttl_secs = 300
//! clone_depth = 100
//!
//! [git]
//! host = "github.com"
//!
//! [git.templates]
//! repo = "https://{{ git_host }}/{{ repo_name }}.git"
//! ```
//!
//! # Environment
//!
//! - `QUARRY_ROOT_DIR` overrides `root_dir`
//! - `QUARRY_PARALLEL_LIMIT` overrides `parallel_limit`

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{ConfigError, Result};
pub use quarry_git::UrlTemplates;
use serde::Deserialize;

/// Environment variable overriding [`QuarryConfig::root_dir`].
pub const ROOT_DIR_ENV: &str = "QUARRY_ROOT_DIR";
/// Environment variable overriding [`QuarryConfig::parallel_limit`].
pub const PARALLEL_LIMIT_ENV: &str = "QUARRY_PARALLEL_LIMIT";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuarryConfig {
	/// Directory under which working copies are materialized.
	pub root_dir: PathBuf,
	/// Number of worker threads executing repository tasks.
	pub parallel_limit: usize,
	pub refresh: RefreshConfig,
	pub git: GitConfig,
}

impl Default for QuarryConfig {
	fn default() -> Self {
		Self {
			root_dir: PathBuf::from("/tmp/quarry"),
			parallel_limit: 20,
			refresh: RefreshConfig::default(),
			git: GitConfig::default(),
		}
	}
}

/// Working copy refresh policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
	/// Seconds a working copy stays fresh after a successful refresh.
	pub ttl_secs: u64,
	/// History depth for clones and fetches.
	pub clone_depth: u32,
}

impl RefreshConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

impl Default for RefreshConfig {
	fn default() -> Self {
		Self {
			ttl_secs: 300,
			clone_depth: 100,
		}
	}
}

/// Git host and URL templates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
	pub host: String,
	/// `{{ var }}` templates for remote and presentation URLs.
	pub templates: UrlTemplates,
}

impl Default for GitConfig {
	fn default() -> Self {
		Self {
			host: "github.com".into(),
			templates: UrlTemplates::default(),
		}
	}
}

impl QuarryConfig {
	/// Parses configuration from TOML text and validates it.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a TOML file, applies environment overrides and validates the result.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let mut config: Self = toml::from_str(&text)?;
		config.apply_env()?;
		config.validate()?;
		Ok(config)
	}

	/// Applies overrides from the process environment.
	pub fn apply_env(&mut self) -> Result<()> {
		self.apply_env_with(|key| std::env::var(key).ok())
	}

	/// Applies overrides using `lookup` in place of the process environment.
	pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
		if let Some(root) = lookup(ROOT_DIR_ENV).filter(|v| !v.is_empty()) {
			self.root_dir = PathBuf::from(root);
		}
		if let Some(limit) = lookup(PARALLEL_LIMIT_ENV).filter(|v| !v.is_empty()) {
			self.parallel_limit = limit.trim().parse().map_err(|e| ConfigError::Invalid {
				key: "parallel_limit",
				reason: format!("{PARALLEL_LIMIT_ENV}={limit:?}: {e}"),
			})?;
		}
		Ok(())
	}

	/// Rejects values the cache cannot run with.
	pub fn validate(&self) -> Result<()> {
		if self.parallel_limit == 0 {
			return Err(ConfigError::Invalid {
				key: "parallel_limit",
				reason: "must be at least 1".into(),
			});
		}
		if self.refresh.ttl_secs == 0 {
			return Err(ConfigError::Invalid {
				key: "refresh.ttl_secs",
				reason: "must be at least 1".into(),
			});
		}
		if self.refresh.clone_depth == 0 {
			return Err(ConfigError::Invalid {
				key: "refresh.clone_depth",
				reason: "must be at least 1".into(),
			});
		}
		if self.root_dir.as_os_str().is_empty() {
			return Err(ConfigError::Invalid {
				key: "root_dir",
				reason: "must not be empty".into(),
			});
		}
		Ok(())
	}
}
