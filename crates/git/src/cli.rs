//! [`GitBackend`] implementation that shells out to the `git` executable.

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use base64::Engine;
use chrono::DateTime;
use tracing::{debug, trace};

use crate::backend::{CloneOptions, GitBackend};
use crate::credentials::{Credential, CredentialKind, CredentialProvider};
use crate::model::{Branch, Commit, ObjectId, Signature};
use crate::{Error, Result};

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1e";

/// Runs git operations through the `git` command line client.
///
/// Terminal prompts are disabled so a remote demanding credentials that the
/// configured [`CredentialProvider`] cannot supply fails instead of hanging.
#[derive(Clone)]
pub struct GitCli {
	program: PathBuf,
	credentials: Option<Arc<dyn CredentialProvider>>,
}

impl Default for GitCli {
	fn default() -> Self {
		Self::new()
	}
}

impl GitCli {
	pub fn new() -> Self {
		Self {
			program: PathBuf::from("git"),
			credentials: None,
		}
	}

	/// Uses a specific git binary instead of the one on `PATH`.
	#[must_use]
	pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
		self.program = program.into();
		self
	}

	#[must_use]
	pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
		self.credentials = Some(credentials);
		self
	}

	/// Checks that the git binary can be executed.
	pub fn ensure_available(&self) -> Result<()> {
		self.run(None, &["--version"], &[]).map(drop)
	}

	fn run<S: AsRef<OsStr>>(&self, dir: Option<&Path>, args: &[S], env: &[(String, String)]) -> Result<String> {
		let mut cmd = Command::new(&self.program);
		cmd.args(args).env("GIT_TERMINAL_PROMPT", "0").envs(env.iter().map(|(k, v)| (k, v)));
		if let Some(dir) = dir {
			cmd.current_dir(dir);
		}

		let command = describe(args);
		trace!(command = %command, "git.run");
		let output = cmd.output().map_err(|e| match e.kind() {
			ErrorKind::NotFound => Error::GitNotAvailable,
			_ => Error::GitCommand {
				command: command.clone(),
				stderr: e.to_string(),
			},
		})?;

		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).into_owned())
		} else {
			Err(Error::GitCommand {
				command,
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}

	/// Environment carrying authentication for `url`, kept out of the argument list.
	fn auth_env(&self, url: &str) -> Vec<(String, String)> {
		let Some(provider) = &self.credentials else {
			return Vec::new();
		};

		match RemoteKind::of(url) {
			RemoteKind::Http => match provider.credential(CredentialKind::UserPass) {
				Some(Credential::UserPass { username, password }) => {
					let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
					config_env(&[("http.extraHeader", format!("Authorization: Basic {token}"))])
				}
				_ => Vec::new(),
			},
			RemoteKind::Ssh => {
				let key = provider.credential(CredentialKind::SshKey);
				let login = provider.credential(CredentialKind::Username);
				ssh_env(key.as_ref(), login.as_ref())
			}
			RemoteKind::Local => Vec::new(),
		}
	}
}

impl GitBackend for GitCli {
	fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions) -> Result<()> {
		if let Some(parent) = dest.parent() {
			fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
		}

		let depth = options.depth.map(|d| format!("--depth={d}"));
		let mut args = vec![OsStr::new("clone"), OsStr::new("--no-tags"), OsStr::new("--single-branch")];
		if let Some(depth) = &depth {
			args.push(OsStr::new(depth));
		}
		if let Some(branch) = &options.branch {
			args.push(OsStr::new("--branch"));
			args.push(OsStr::new(branch));
		}
		args.push(OsStr::new(url));
		args.push(dest.as_os_str());

		debug!(url, dest = %dest.display(), "git.clone");
		self.run(None, &args, &self.auth_env(url)).map(drop)
	}

	fn fetch(&self, dir: &Path, url: &str, reference: &str, depth: Option<u32>) -> Result<()> {
		let depth = depth.map(|d| format!("--depth={d}"));
		let mut args = vec!["fetch", "--no-tags"];
		if let Some(depth) = &depth {
			args.push(depth);
		}
		args.extend([url, reference]);

		debug!(url, reference, dir = %dir.display(), "git.fetch");
		self.run(Some(dir), &args, &self.auth_env(url)).map(drop)
	}

	fn reset_hard(&self, dir: &Path, target: &str) -> Result<()> {
		self.run(Some(dir), &["reset", "--hard", "--quiet", target], &[]).map(drop)
	}

	fn clean(&self, dir: &Path) -> Result<()> {
		self.run(Some(dir), &["clean", "-ffdx", "--quiet"], &[]).map(drop)
	}

	fn head(&self, dir: &Path) -> Result<ObjectId> {
		let out = self.run(Some(dir), &["rev-parse", "HEAD"], &[])?;
		Ok(ObjectId::new(out.trim()))
	}

	fn current_branch(&self, dir: &Path) -> Result<String> {
		let out = self.run(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"], &[])?;
		Ok(out.trim().to_string())
	}

	fn blob_id(&self, dir: &Path, path: &str) -> Result<ObjectId> {
		let spec = format!("HEAD:{path}");
		match self.run(Some(dir), &["rev-parse", "--verify", "--quiet", spec.as_str()], &[]) {
			Ok(out) => Ok(ObjectId::new(out.trim())),
			Err(Error::GitCommand { stderr, .. }) if stderr.is_empty() || stderr.contains("does not exist") => {
				Err(Error::NotFound(path.to_string()))
			}
			Err(err) => Err(err),
		}
	}

	fn branches(&self, dir: &Path) -> Result<Vec<Branch>> {
		let out = self.run(Some(dir), &["for-each-ref", "--format=%(refname:short)%09%(objectname)", "refs/heads"], &[])?;
		parse_branches(&out)
	}

	fn log(&self, dir: &Path, limit: usize) -> Result<Vec<Commit>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		let max_count = format!("--max-count={limit}");
		let out = self.run(Some(dir), &["log", "--no-color", max_count.as_str(), LOG_FORMAT, "HEAD"], &[])?;
		parse_log(&out)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteKind {
	Http,
	Ssh,
	Local,
}

impl RemoteKind {
	fn of(url: &str) -> Self {
		if url.starts_with("https://") || url.starts_with("http://") {
			return Self::Http;
		}
		if url.starts_with("ssh://") || url.starts_with("git+ssh://") {
			return Self::Ssh;
		}
		// scp-like `user@host:path`
		match (url.find(':'), url.find('/')) {
			(Some(colon), Some(slash)) if colon < slash && !url.contains("://") => Self::Ssh,
			(Some(_), None) if !url.contains("://") => Self::Ssh,
			_ => Self::Local,
		}
	}
}

/// Encodes config overrides through `GIT_CONFIG_COUNT` / `GIT_CONFIG_KEY_n` / `GIT_CONFIG_VALUE_n`.
fn config_env(entries: &[(&str, String)]) -> Vec<(String, String)> {
	let mut env = vec![("GIT_CONFIG_COUNT".to_string(), entries.len().to_string())];
	for (i, (key, value)) in entries.iter().enumerate() {
		env.push((format!("GIT_CONFIG_KEY_{i}"), (*key).to_string()));
		env.push((format!("GIT_CONFIG_VALUE_{i}"), value.clone()));
	}
	env
}

fn ssh_env(key: Option<&Credential>, login: Option<&Credential>) -> Vec<(String, String)> {
	let mut command = String::from("ssh -o BatchMode=yes");
	let mut username = login.map(Credential::username);

	if let Some(Credential::SshKey { username: key_user, private_key }) = key {
		command.push_str(" -o IdentitiesOnly=yes -i ");
		command.push_str(&shell_quote(&private_key.to_string_lossy()));
		username = username.or(Some(key_user.as_str()));
	}
	if let Some(user) = username.filter(|u| !u.is_empty()) {
		command.push_str(" -l ");
		command.push_str(&shell_quote(user));
	}

	vec![("GIT_SSH_COMMAND".to_string(), command)]
}

fn shell_quote(raw: &str) -> String {
	format!("'{}'", raw.replace('\'', r"'\''"))
}

fn describe<S: AsRef<OsStr>>(args: &[S]) -> String {
	args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>().join(" ")
}

fn parse_branches(out: &str) -> Result<Vec<Branch>> {
	out.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| {
			let (name, head) = line
				.split_once('\t')
				.ok_or_else(|| Error::Parse(format!("malformed branch line {line:?}")))?;
			Ok(Branch {
				name: name.to_string(),
				head: ObjectId::new(head.trim()),
			})
		})
		.collect()
}

fn parse_log(out: &str) -> Result<Vec<Commit>> {
	out.split(RECORD_SEP)
		.map(|record| record.trim_start_matches('\n'))
		.filter(|record| !record.trim().is_empty())
		.map(parse_commit)
		.collect()
}

fn parse_commit(record: &str) -> Result<Commit> {
	let mut fields = record.splitn(5, FIELD_SEP);
	let mut next = |name: &str| fields.next().ok_or_else(|| Error::Parse(format!("commit record missing {name}")));

	let id = next("id")?;
	let name = next("author name")?;
	let email = next("author email")?;
	let date = next("author date")?;
	let message = next("message")?;

	let authored_at = DateTime::parse_from_rfc3339(date).map_err(|e| Error::Parse(format!("author date {date:?}: {e}")))?;

	Ok(Commit {
		id: ObjectId::new(id),
		author: Signature {
			name: name.to_string(),
			email: email.to_string(),
		},
		message: message.trim().to_string(),
		authored_at,
	})
}
