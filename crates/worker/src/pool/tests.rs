use std::sync::atomic::AtomicUsize;
use std::sync::mpsc;
use std::time::Duration;

use super::*;

#[test]
fn single_worker_runs_jobs_in_admission_order() {
	let pool = WorkerPool::new();
	let seen = Arc::new(Mutex::new(Vec::new()));
	for i in 0..10 {
		let seen = Arc::clone(&seen);
		pool.submit(move || seen.lock().push(i)).unwrap();
	}

	pool.start(1).unwrap();
	pool.shutdown();

	assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
}

#[test]
fn concurrency_is_bounded_by_worker_count() {
	let pool = WorkerPool::new();
	let active = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));

	for _ in 0..12 {
		let active = Arc::clone(&active);
		let peak = Arc::clone(&peak);
		pool.submit(move || {
			let now = active.fetch_add(1, Ordering::SeqCst) + 1;
			peak.fetch_max(now, Ordering::SeqCst);
			std::thread::sleep(Duration::from_millis(20));
			active.fetch_sub(1, Ordering::SeqCst);
		})
		.unwrap();
	}

	pool.start(3).unwrap();
	pool.shutdown();

	let peak = peak.load(Ordering::SeqCst);
	assert!(peak <= 3, "at most 3 jobs may overlap, saw {peak}");
	assert!(peak >= 2, "workers should overlap, saw {peak}");
	assert_eq!(pool.stats().completed, 12);
}

#[test]
fn panicking_job_does_not_kill_worker() {
	let pool = WorkerPool::new();
	pool.start(1).unwrap();

	pool.submit(|| panic!("job exploded")).unwrap();
	let (tx, rx) = mpsc::channel();
	pool.submit(move || tx.send("still alive").unwrap()).unwrap();

	assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("still alive"));
	pool.shutdown();

	let stats = pool.stats();
	assert_eq!(stats.panicked, 1);
	assert_eq!(stats.completed, 1);
	assert_eq!(stats.submitted, 2);
}

#[test]
fn shutdown_drains_queued_jobs_then_rejects_new_ones() {
	let pool = WorkerPool::new();
	let ran = Arc::new(AtomicUsize::new(0));
	for _ in 0..5 {
		let ran = Arc::clone(&ran);
		pool.submit(move || {
			std::thread::sleep(Duration::from_millis(5));
			ran.fetch_add(1, Ordering::SeqCst);
		})
		.unwrap();
	}

	pool.start(2).unwrap();
	pool.shutdown();

	assert_eq!(ran.load(Ordering::SeqCst), 5);
	assert_eq!(pool.queued(), 0);
	assert_eq!(pool.workers(), 0);
	assert!(pool.is_closed());
	assert!(matches!(pool.submit(|| {}), Err(PoolError::Closed)));
}

#[test]
fn start_rejects_zero_and_repeated_calls() {
	let pool = WorkerPool::new();
	assert!(matches!(pool.start(0), Err(PoolError::InvalidParallelism)));

	pool.start(2).unwrap();
	assert_eq!(pool.workers(), 2);
	assert!(matches!(pool.start(2), Err(PoolError::AlreadyStarted)));
}

#[test]
fn start_after_shutdown_is_rejected() {
	let pool = WorkerPool::new();
	pool.shutdown();
	assert!(matches!(pool.start(1), Err(PoolError::Closed)));
}

#[test]
fn shutdown_without_start_drops_queued_jobs() {
	let pool = WorkerPool::new();
	let (tx, rx) = mpsc::channel::<()>();
	for _ in 0..3 {
		let tx = tx.clone();
		pool.submit(move || tx.send(()).unwrap()).unwrap();
	}
	drop(tx);
	assert_eq!(pool.queued(), 3);

	pool.shutdown();

	assert_eq!(pool.queued(), 0);
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Err(mpsc::RecvTimeoutError::Disconnected));
	assert_eq!(pool.stats().completed, 0);
}

#[test]
fn workers_are_named() {
	let pool = WorkerPool::new();
	pool.start(1).unwrap();
	let (tx, rx) = mpsc::channel();
	pool.submit(move || tx.send(std::thread::current().name().map(str::to_string)).unwrap()).unwrap();

	let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(name.as_deref(), Some("quarry-worker-0"));
}
