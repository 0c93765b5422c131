//! In-memory git backend for exercising the access layer without `git`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;
use quarry_git::{Branch, CloneOptions, Commit, Error, GitBackend, Locator, ObjectId, Result, Signature};

struct Remote {
	commits: Vec<Commit>,
	files: BTreeMap<String, Vec<u8>>,
}

struct Checkout {
	branch: String,
	head: usize,
	fetched: Option<usize>,
}

/// Fake remote plus the working copies cloned from it.
///
/// Working copies are real directories containing the remote's files, so
/// [`Snapshot`](crate::Snapshot) file reads behave as they would against a git
/// checkout. Mutating calls (clone, fetch, reset, clean) are counted and can be
/// slowed down or made to fail.
pub struct FakeGit {
	remote: Mutex<Remote>,
	checkouts: Mutex<HashMap<PathBuf, Checkout>>,
	clones: AtomicUsize,
	fetches: AtomicUsize,
	fail_fetches: AtomicBool,
	fail_clones: AtomicBool,
	write_delay: Mutex<Duration>,
	writes_in_flight: AtomicUsize,
	max_writes_in_flight: AtomicUsize,
	last_clone: Mutex<Option<CloneOptions>>,
}

impl Default for FakeGit {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeGit {
	/// Remote with a single commit adding `README.md`.
	pub fn new() -> Self {
		let git = Self {
			remote: Mutex::new(Remote {
				commits: Vec::new(),
				files: BTreeMap::new(),
			}),
			checkouts: Mutex::new(HashMap::new()),
			clones: AtomicUsize::new(0),
			fetches: AtomicUsize::new(0),
			fail_fetches: AtomicBool::new(false),
			fail_clones: AtomicBool::new(false),
			write_delay: Mutex::new(Duration::ZERO),
			writes_in_flight: AtomicUsize::new(0),
			max_writes_in_flight: AtomicUsize::new(0),
			last_clone: Mutex::new(None),
		};
		git.set_file("README.md", "# fake\n");
		git.push_commit_at(
			Signature {
				name: "Fake Author".into(),
				email: "fake@example.com".into(),
			},
			Utc::now().into(),
			"initial",
		);
		git
	}

	/// Stages `contents` at `path` for the next commit.
	pub fn set_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
		self.remote.lock().files.insert(path.to_string(), contents.into());
	}

	pub fn remove_file(&self, path: &str) {
		self.remote.lock().files.remove(path);
	}

	/// Adds a commit one hour after the current tip, by the tip's author.
	pub fn push_commit(&self, message: &str) -> ObjectId {
		let (author, at) = {
			let remote = self.remote.lock();
			match remote.commits.last() {
				Some(tip) => (tip.author.clone(), tip.authored_at + chrono::Duration::hours(1)),
				None => (
					Signature {
						name: "Fake Author".into(),
						email: "fake@example.com".into(),
					},
					Utc::now().into(),
				),
			}
		};
		self.push_commit_at(author, at, message)
	}

	pub fn push_commit_at(&self, author: Signature, authored_at: DateTime<FixedOffset>, message: &str) -> ObjectId {
		let mut remote = self.remote.lock();
		let id = ObjectId::new(format!("{:040x}", remote.commits.len() + 1));
		remote.commits.push(Commit {
			id: id.clone(),
			author,
			message: message.to_string(),
			authored_at,
		});
		id
	}

	/// Sleeps inside every mutating call, widening race windows.
	pub fn set_write_delay(&self, delay: Duration) {
		*self.write_delay.lock() = delay;
	}

	pub fn fail_fetches(&self, fail: bool) {
		self.fail_fetches.store(fail, Ordering::SeqCst);
	}

	pub fn fail_clones(&self, fail: bool) {
		self.fail_clones.store(fail, Ordering::SeqCst);
	}

	pub fn clones(&self) -> usize {
		self.clones.load(Ordering::SeqCst)
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}

	/// Mutating calls currently executing.
	pub fn writes_in_flight(&self) -> usize {
		self.writes_in_flight.load(Ordering::SeqCst)
	}

	/// Highest number of mutating calls ever observed at once.
	pub fn max_writes_in_flight(&self) -> usize {
		self.max_writes_in_flight.load(Ordering::SeqCst)
	}

	pub fn last_clone_options(&self) -> Option<CloneOptions> {
		self.last_clone.lock().clone()
	}

	fn writing<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
		let now = self.writes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_writes_in_flight.fetch_max(now, Ordering::SeqCst);
		let delay = *self.write_delay.lock();
		if !delay.is_zero() {
			thread::sleep(delay);
		}
		let result = f();
		self.writes_in_flight.fetch_sub(1, Ordering::SeqCst);
		result
	}

	fn checkout_head(&self, dir: &Path) -> Result<usize> {
		if !dir.exists() {
			return Err(not_a_repository(dir));
		}
		self.checkouts
			.lock()
			.get(dir)
			.map(|checkout| checkout.head)
			.ok_or_else(|| not_a_repository(dir))
	}

	fn write_tree(&self, dir: &Path) -> Result<()> {
		let remote = self.remote.lock();
		for (path, contents) in &remote.files {
			let file = dir.join(path);
			if let Some(parent) = file.parent() {
				fs::create_dir_all(parent).map_err(|error| io(parent, error))?;
			}
			fs::write(&file, contents).map_err(|error| io(&file, error))?;
		}
		Ok(())
	}
}

impl GitBackend for FakeGit {
	fn clone_repo(&self, _url: &str, dest: &Path, options: &CloneOptions) -> Result<()> {
		self.writing(|| {
			self.clones.fetch_add(1, Ordering::SeqCst);
			*self.last_clone.lock() = Some(options.clone());
			if self.fail_clones.load(Ordering::SeqCst) {
				return Err(command_failed("clone", "fatal: simulated clone failure"));
			}
			fs::create_dir_all(dest).map_err(|error| io(dest, error))?;
			self.write_tree(dest)?;
			let head = self.remote.lock().commits.len();
			self.checkouts.lock().insert(
				dest.to_path_buf(),
				Checkout {
					branch: options.branch.clone().unwrap_or_else(|| "main".into()),
					head,
					fetched: None,
				},
			);
			Ok(())
		})
	}

	fn fetch(&self, dir: &Path, _url: &str, _reference: &str, _depth: Option<u32>) -> Result<()> {
		self.writing(|| {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			if self.fail_fetches.load(Ordering::SeqCst) {
				return Err(command_failed("fetch", "fatal: simulated fetch failure"));
			}
			self.checkout_head(dir)?;
			let tip = self.remote.lock().commits.len();
			if let Some(checkout) = self.checkouts.lock().get_mut(dir) {
				checkout.fetched = Some(tip);
			}
			Ok(())
		})
	}

	fn reset_hard(&self, dir: &Path, target: &str) -> Result<()> {
		self.writing(|| {
			if target != "FETCH_HEAD" {
				return Err(command_failed("reset", &format!("fatal: unknown revision {target}")));
			}
			self.checkout_head(dir)?;
			if let Some(checkout) = self.checkouts.lock().get_mut(dir) {
				checkout.head = checkout.fetched.take().unwrap_or(checkout.head);
			}
			self.write_tree(dir)
		})
	}

	fn clean(&self, dir: &Path) -> Result<()> {
		self.writing(|| {
			self.checkout_head(dir)?;
			let tracked: Vec<PathBuf> = self.remote.lock().files.keys().map(|path| dir.join(path)).collect();
			remove_untracked(dir, &tracked)
		})
	}

	fn head(&self, dir: &Path) -> Result<ObjectId> {
		let head = self.checkout_head(dir)?;
		let remote = self.remote.lock();
		head.checked_sub(1)
			.and_then(|index| remote.commits.get(index))
			.map(|commit| commit.id.clone())
			.ok_or_else(|| Error::NotFound("HEAD".into()))
	}

	fn current_branch(&self, dir: &Path) -> Result<String> {
		self.checkout_head(dir)?;
		self.checkouts
			.lock()
			.get(dir)
			.map(|checkout| checkout.branch.clone())
			.ok_or_else(|| not_a_repository(dir))
	}

	fn blob_id(&self, dir: &Path, path: &str) -> Result<ObjectId> {
		self.checkout_head(dir)?;
		let contents = fs::read(dir.join(path)).map_err(|_| Error::NotFound(format!("HEAD:{path}")))?;
		let mut hasher = DefaultHasher::new();
		contents.hash(&mut hasher);
		Ok(ObjectId::new(format!("{:040x}", hasher.finish())))
	}

	fn branches(&self, dir: &Path) -> Result<Vec<Branch>> {
		let branch = self.current_branch(dir)?;
		Ok(vec![Branch {
			name: branch,
			head: self.head(dir)?,
		}])
	}

	fn log(&self, dir: &Path, limit: usize) -> Result<Vec<Commit>> {
		let head = self.checkout_head(dir)?;
		let remote = self.remote.lock();
		Ok(remote.commits[..head.min(remote.commits.len())]
			.iter()
			.rev()
			.take(limit)
			.cloned()
			.collect())
	}
}

/// Locator mapping `name` to `https://example.com/{name}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticLocator;

impl Locator for StaticLocator {
	fn repo_url(&self, repo_name: &str) -> Result<String> {
		if repo_name.is_empty() {
			return Err(Error::Template("empty repository name".into()));
		}
		Ok(format!("https://example.com/{repo_name}"))
	}
}

fn remove_untracked(dir: &Path, tracked: &[PathBuf]) -> Result<()> {
	let entries = fs::read_dir(dir).map_err(|error| io(dir, error))?;
	for entry in entries {
		let path = entry.map_err(|error| io(dir, error))?.path();
		if path.is_dir() {
			if tracked.iter().any(|file| file.starts_with(&path)) {
				remove_untracked(&path, tracked)?;
			} else {
				fs::remove_dir_all(&path).map_err(|error| io(&path, error))?;
			}
		} else if !tracked.contains(&path) {
			fs::remove_file(&path).map_err(|error| io(&path, error))?;
		}
	}
	Ok(())
}

fn command_failed(command: &str, stderr: &str) -> Error {
	Error::GitCommand {
		command: command.into(),
		stderr: stderr.into(),
	}
}

fn not_a_repository(dir: &Path) -> Error {
	command_failed("rev-parse", &format!("fatal: not a git repository: {}", dir.display()))
}

fn io(path: &Path, error: std::io::Error) -> Error {
	Error::Io {
		path: path.to_path_buf(),
		error,
	}
}
