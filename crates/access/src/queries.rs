//! Ready-made read actions.
//!
//! Each query is a [`ReadAction`] that can be handed straight to
//! [`TaskManager::run_task`](crate::TaskManager::run_task).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quarry_git::{Branch, Commit, ObjectId, Result, Signature};

use crate::action::ReadAction;
use crate::snapshot::Snapshot;

/// Whether a file or directory exists at the given path.
#[derive(Debug, Clone)]
pub struct FileExists(pub String);

impl FileExists {
	pub fn new(path: impl Into<String>) -> Self {
		Self(path.into())
	}
}

impl ReadAction for FileExists {
	type Output = bool;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<bool> {
		snapshot.exists(&self.0)
	}
}

/// Contents of a UTF-8 file.
#[derive(Debug, Clone)]
pub struct ReadText(pub String);

impl ReadText {
	pub fn new(path: impl Into<String>) -> Self {
		Self(path.into())
	}
}

impl ReadAction for ReadText {
	type Output = String;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<String> {
		snapshot.read_text(&self.0)
	}
}

/// Raw contents of a file.
#[derive(Debug, Clone)]
pub struct ReadBytes(pub String);

impl ReadBytes {
	pub fn new(path: impl Into<String>) -> Self {
		Self(path.into())
	}
}

impl ReadAction for ReadBytes {
	type Output = Vec<u8>;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<Vec<u8>> {
		snapshot.read_bytes(&self.0)
	}
}

/// Blob id of a file at `HEAD`.
#[derive(Debug, Clone)]
pub struct BlobId(pub String);

impl BlobId {
	pub fn new(path: impl Into<String>) -> Self {
		Self(path.into())
	}
}

impl ReadAction for BlobId {
	type Output = ObjectId;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<ObjectId> {
		snapshot.blob_id(&self.0)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Branches;

impl ReadAction for Branches {
	type Output = Vec<Branch>;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<Vec<Branch>> {
		snapshot.branches()
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBranch;

impl ReadAction for DefaultBranch {
	type Output = String;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<String> {
		snapshot.default_branch()
	}
}

/// Newest commits, optionally restricted to those authored at or after `since`.
#[derive(Debug, Clone, Copy)]
pub struct RecentCommits {
	pub limit: usize,
	pub since: Option<DateTime<Utc>>,
}

impl RecentCommits {
	pub fn new(limit: usize) -> Self {
		Self { limit, since: None }
	}

	#[must_use]
	pub fn since(mut self, since: DateTime<Utc>) -> Self {
		self.since = Some(since);
		self
	}
}

impl ReadAction for RecentCommits {
	type Output = Vec<Commit>;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<Vec<Commit>> {
		let mut commits = snapshot.commits(self.limit)?;
		if let Some(since) = self.since {
			commits.retain(|commit| commit.authored_at >= since);
		}
		Ok(commits)
	}
}

/// Commit at the tip of the working copy, if there is any history.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastCommit;

impl ReadAction for LastCommit {
	type Output = Option<Commit>;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<Option<Commit>> {
		Ok(snapshot.commits(1)?.into_iter().next())
	}
}

/// An author and how many of the inspected commits they wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
	pub author: Signature,
	pub commits: usize,
}

/// Authors of recent commits grouped by email, most active first.
///
/// Inspects up to `limit` commits; the name reported for an author is the one
/// on their newest commit. Ties are ordered by email.
#[derive(Debug, Clone, Copy)]
pub struct Contributors {
	pub limit: usize,
	pub since: Option<DateTime<Utc>>,
}

impl Contributors {
	pub fn new(limit: usize) -> Self {
		Self { limit, since: None }
	}

	#[must_use]
	pub fn since(mut self, since: DateTime<Utc>) -> Self {
		self.since = Some(since);
		self
	}
}

impl ReadAction for Contributors {
	type Output = Vec<Contributor>;

	fn read(&self, snapshot: &Snapshot<'_>) -> Result<Vec<Contributor>> {
		let commits = RecentCommits {
			limit: self.limit,
			since: self.since,
		}
		.read(snapshot)?;

		let mut by_email: HashMap<String, Contributor> = HashMap::new();
		for commit in commits {
			by_email
				.entry(commit.author.email.clone())
				.or_insert_with(|| Contributor {
					author: commit.author,
					commits: 0,
				})
				.commits += 1;
		}

		let mut contributors: Vec<_> = by_email.into_values().collect();
		contributors.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.author.email.cmp(&b.author.email)));
		Ok(contributors)
	}
}
