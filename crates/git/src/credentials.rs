use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::{Error, Result};

/// Authentication scheme requested by a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// Bare username, used to pick the ssh login.
	Username,
	/// Private key file for ssh remotes.
	SshKey,
	/// Username and password (or token) for http remotes.
	UserPass,
}

impl fmt::Display for CredentialKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Username => "username",
			Self::SshKey => "ssh-key",
			Self::UserPass => "userpass",
		})
	}
}

/// Authentication material handed to git.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
	Username { username: String },
	SshKey { username: String, private_key: PathBuf },
	UserPass { username: String, password: String },
}

impl Credential {
	pub fn kind(&self) -> CredentialKind {
		match self {
			Self::Username { .. } => CredentialKind::Username,
			Self::SshKey { .. } => CredentialKind::SshKey,
			Self::UserPass { .. } => CredentialKind::UserPass,
		}
	}

	pub fn username(&self) -> &str {
		match self {
			Self::Username { username } | Self::SshKey { username, .. } | Self::UserPass { username, .. } => username,
		}
	}
}

impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Username { username } => f.debug_struct("Username").field("username", username).finish(),
			Self::SshKey { username, private_key } => f
				.debug_struct("SshKey")
				.field("username", username)
				.field("private_key", private_key)
				.finish(),
			Self::UserPass { username, .. } => f
				.debug_struct("UserPass")
				.field("username", username)
				.field("password", &"<redacted>")
				.finish(),
		}
	}
}

/// Supplies credentials on demand while talking to a remote.
pub trait CredentialProvider: Send + Sync {
	fn credential(&self, kind: CredentialKind) -> Option<Credential>;
}

/// Owned credential table holding at most one credential per kind.
#[derive(Debug, Default)]
pub struct CredentialStore {
	entries: RwLock<HashMap<CredentialKind, Credential>>,
}

impl CredentialStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a credential. Fails if one of the same kind is already present.
	pub fn add(&self, credential: Credential) -> Result<()> {
		let kind = credential.kind();
		let mut entries = self.entries.write();
		if entries.contains_key(&kind) {
			return Err(Error::CredentialExists(kind));
		}
		entries.insert(kind, credential);
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl CredentialProvider for CredentialStore {
	fn credential(&self, kind: CredentialKind) -> Option<Credential> {
		self.entries.read().get(&kind).cloned()
	}
}
