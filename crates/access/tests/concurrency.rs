//! Locking and refresh guarantees observed through the task manager.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use common::{TTL, fixture};
use pretty_assertions::assert_eq;
use quarry_access::{Error, action};

fn wait_until(what: &str, condition: impl Fn() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(10);
	while !condition() {
		assert!(Instant::now() < deadline, "timed out waiting for {what}");
		thread::sleep(Duration::from_millis(2));
	}
}

#[test]
fn concurrent_first_access_clones_once() {
	let fx = Arc::new(fixture(2));
	fx.git.set_write_delay(Duration::from_millis(100));
	let repo = fx.registry.get("org/repo", None).unwrap();
	let start = Arc::new(Barrier::new(5));

	let callers: Vec<_> = (0..5)
		.map(|_| {
			let fx = Arc::clone(&fx);
			let repo = Arc::clone(&repo);
			let start = Arc::clone(&start);
			thread::spawn(move || {
				start.wait();
				fx.tasks.run_task(&repo, action(|s| s.read_text("README.md")))
			})
		})
		.collect();

	for caller in callers {
		assert_eq!(caller.join().unwrap().unwrap(), "# fake\n");
	}
	assert_eq!(fx.git.clones(), 1);
	assert_eq!(fx.git.fetches(), 0);
	assert_eq!(fx.git.max_writes_in_flight(), 1);
}

#[test]
fn ttl_window_controls_refresh() {
	let fx = fixture(1);
	let repo = fx.registry.get("org/repo", None).unwrap();
	let read = || fx.tasks.run_task(&repo, action(|s| s.head())).unwrap();

	read();
	assert_eq!((fx.git.clones(), fx.git.fetches()), (1, 0));

	fx.clock.advance(Duration::from_secs(100));
	read();
	assert_eq!((fx.git.clones(), fx.git.fetches()), (1, 0));

	fx.clock.advance(Duration::from_secs(300));
	read();
	assert_eq!((fx.git.clones(), fx.git.fetches()), (1, 1));
	assert!(!repo.needs_refresh());
}

#[test]
fn refresh_picks_up_remote_changes() {
	let fx = fixture(1);
	let repo = fx.registry.get("org/repo", None).unwrap();
	let readme = || fx.tasks.run_task(&repo, action(|s| s.read_text("README.md")));

	assert_eq!(readme().unwrap(), "# fake\n");

	fx.git.set_file("README.md", "# changed\n");
	fx.git.push_commit("update readme");
	assert_eq!(readme().unwrap(), "# fake\n", "fresh copy is served until the ttl passes");

	fx.clock.advance(TTL + Duration::from_secs(1));
	assert_eq!(readme().unwrap(), "# changed\n");
}

#[test]
fn reads_never_overlap_refreshes_of_the_same_key() {
	let fx = Arc::new(fixture(4));
	fx.git.set_write_delay(Duration::from_millis(5));
	let repo = fx.registry.get("org/repo", None).unwrap();
	let overlaps = Arc::new(AtomicUsize::new(0));
	let stop = Arc::new(AtomicBool::new(false));

	let ticker = {
		let fx = Arc::clone(&fx);
		let stop = Arc::clone(&stop);
		thread::spawn(move || {
			while !stop.load(Ordering::SeqCst) {
				fx.clock.advance(TTL + Duration::from_secs(1));
				thread::sleep(Duration::from_millis(3));
			}
		})
	};

	let readers: Vec<_> = (0..6)
		.map(|_| {
			let fx = Arc::clone(&fx);
			let repo = Arc::clone(&repo);
			let overlaps = Arc::clone(&overlaps);
			thread::spawn(move || {
				for _ in 0..20 {
					let git = Arc::clone(&fx.git);
					let overlaps = Arc::clone(&overlaps);
					fx.tasks
						.run_task(
							&repo,
							action(move |s| {
								for _ in 0..3 {
									if git.writes_in_flight() > 0 {
										overlaps.fetch_add(1, Ordering::SeqCst);
									}
									thread::sleep(Duration::from_millis(1));
								}
								s.read_text("README.md")
							}),
						)
						.unwrap();
				}
			})
		})
		.collect();

	for reader in readers {
		reader.join().unwrap();
	}
	stop.store(true, Ordering::SeqCst);
	ticker.join().unwrap();

	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	assert_eq!(fx.git.max_writes_in_flight(), 1);
	assert!(fx.git.fetches() > 0, "ticker should have forced refreshes");
}

#[test]
fn distinct_keys_proceed_independently() {
	let fx = Arc::new(fixture(2));
	let a = fx.registry.get("org/a", None).unwrap();
	let b = fx.registry.get("org/b", None).unwrap();
	fx.tasks.run_task(&b, action(|s| s.head())).unwrap();

	// A's first access clones slowly while holding A's writer lock.
	fx.git.set_write_delay(Duration::from_millis(500));
	let slow = {
		let fx = Arc::clone(&fx);
		let a = Arc::clone(&a);
		thread::spawn(move || fx.tasks.run_task(&a, action(|s| s.head())))
	};
	wait_until("A's clone to start", || fx.git.writes_in_flight() == 1);

	let git = Arc::clone(&fx.git);
	let writes_during_read = fx
		.tasks
		.run_task(&b, action(move |_| Ok(git.writes_in_flight())))
		.unwrap();

	assert_eq!(writes_during_read, 1, "B was read while A was being written");
	slow.join().unwrap().unwrap();
}

#[test]
fn long_read_on_one_key_does_not_block_another() {
	let fx = Arc::new(fixture(2));
	let a = fx.registry.get("org/a", None).unwrap();
	let b = fx.registry.get("org/b", None).unwrap();
	fx.tasks.run_task(&a, action(|s| s.head())).unwrap();

	let (entered_tx, entered) = mpsc::channel();
	let (release, release_rx) = mpsc::channel::<()>();
	let reader = {
		let fx = Arc::clone(&fx);
		thread::spawn(move || {
			fx.tasks.run_task(
				&a,
				action(move |s| {
					let _ = entered_tx.send(());
					let _ = release_rx.recv_timeout(Duration::from_secs(10));
					s.head()
				}),
			)
		})
	};
	entered.recv_timeout(Duration::from_secs(10)).unwrap();

	// B needs its first clone, which takes B's writer lock.
	assert_eq!(
		fx.tasks.run_task(&b, action(|s| s.read_text("README.md"))).unwrap(),
		"# fake\n"
	);

	release.send(()).unwrap();
	reader.join().unwrap().unwrap();
}

#[test]
fn refresh_failure_is_isolated_and_retried() {
	let fx = fixture(2);
	let a = fx.registry.get("org/a", None).unwrap();
	let b = fx.registry.get("org/b", None).unwrap();

	fx.git.fail_clones(true);
	let err = fx.tasks.run_task(&a, action(|s| s.head())).unwrap_err();
	assert!(matches!(err, Error::Refresh { ref repo, .. } if repo == "org/a"));
	assert!(a.needs_refresh());

	fx.git.fail_clones(false);
	assert!(fx.tasks.run_task(&b, action(|s| s.head())).is_ok());
	assert!(fx.tasks.run_task(&a, action(|s| s.head())).is_ok());
	assert!(!a.needs_refresh());
}

#[test]
fn stale_copy_survives_failed_update_through_reclone() {
	let fx = fixture(1);
	let repo = fx.registry.get("org/repo", None).unwrap();
	fx.tasks.run_task(&repo, action(|s| s.head())).unwrap();

	fx.git.fail_fetches(true);
	fx.clock.advance(TTL + Duration::from_secs(1));
	assert_eq!(
		fx.tasks.run_task(&repo, action(|s| s.read_text("README.md"))).unwrap(),
		"# fake\n"
	);
	assert_eq!(fx.git.clones(), 2);
}

#[test]
fn not_found_leaves_freshness_untouched() {
	let fx = fixture(1);
	let repo = fx.registry.get("org/repo", None).unwrap();
	fx.tasks.run_task(&repo, action(|s| s.head())).unwrap();
	let refreshed_at = repo.last_refresh();

	let err = fx.tasks.run_task(&repo, action(|s| s.read_text("missing.txt"))).unwrap_err();
	assert!(err.is_not_found());

	assert_eq!(repo.last_refresh(), refreshed_at);
	assert!(fx.tasks.run_task(&repo, action(|s| s.exists("README.md"))).unwrap());
	assert_eq!((fx.git.clones(), fx.git.fetches()), (1, 0));
}

#[test]
fn worker_pool_bounds_parallel_reads() {
	let fx = Arc::new(fixture(3));
	let repo = fx.registry.get("org/repo", None).unwrap();
	fx.tasks.run_task(&repo, action(|s| s.head())).unwrap();

	let active = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));
	let callers: Vec<_> = (0..9)
		.map(|_| {
			let fx = Arc::clone(&fx);
			let repo = Arc::clone(&repo);
			let active = Arc::clone(&active);
			let peak = Arc::clone(&peak);
			thread::spawn(move || {
				fx.tasks.run_task(
					&repo,
					action(move |_| {
						let now = active.fetch_add(1, Ordering::SeqCst) + 1;
						peak.fetch_max(now, Ordering::SeqCst);
						thread::sleep(Duration::from_millis(30));
						active.fetch_sub(1, Ordering::SeqCst);
						Ok(())
					}),
				)
			})
		})
		.collect();

	for caller in callers {
		caller.join().unwrap().unwrap();
	}
	let peak = peak.load(Ordering::SeqCst);
	assert!(peak <= 3, "peak {peak} exceeded the worker count");
	assert!(peak >= 2, "readers of one key should share the lock");
}
