use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Hex object name of a commit, tree or blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Abbreviated form used in log messages.
	pub fn short(&self) -> &str {
		self.0.get(..7).unwrap_or(&self.0)
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Author identity recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
	pub name: String,
	pub email: String,
}

impl Signature {
	/// Local part of the email address, used as a best-effort username.
	pub fn username(&self) -> Option<&str> {
		self.email.split('@').next().filter(|user| !user.is_empty())
	}
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
	pub id: ObjectId,
	pub author: Signature,
	/// Commit message with surrounding whitespace trimmed.
	pub message: String,
	/// Author timestamp in the timezone offset recorded when it was authored.
	pub authored_at: DateTime<FixedOffset>,
}

/// A local branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
	pub name: String,
	pub head: ObjectId,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn username_is_email_local_part() {
		let sig = Signature {
			name: "Ada".into(),
			email: "ada@example.com".into(),
		};
		assert_eq!(sig.username(), Some("ada"));

		let anonymous = Signature {
			name: "Nobody".into(),
			email: String::new(),
		};
		assert_eq!(anonymous.username(), None);
	}

	#[test]
	fn short_id_tolerates_short_input() {
		assert_eq!(ObjectId::new("0123456789abcdef").short(), "0123456");
		assert_eq!(ObjectId::new("abc").short(), "abc");
	}

	#[test]
	fn commit_serializes_with_original_offset() {
		let commit = Commit {
			id: ObjectId::new("deadbeef"),
			author: Signature {
				name: "Ada".into(),
				email: "ada@example.com".into(),
			},
			message: "Initial commit".into(),
			authored_at: DateTime::parse_from_rfc3339("2024-03-01T12:00:00+02:00").unwrap(),
		};

		let json = serde_json::to_value(&commit).unwrap();
		assert_eq!(json["id"], "deadbeef");
		assert_eq!(json["authored_at"], "2024-03-01T12:00:00+02:00");
	}
}
