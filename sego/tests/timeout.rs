// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use pretty_assertions::assert_eq;
use sego::{AsyncTimeout, Buffer, Error, Timeout};
use sego::streams::Source;

fn firing_order(intervals: &[u64]) -> Vec<u64> {
	let (tx, rx) = mpsc::channel();
	let timeouts: Vec<AsyncTimeout> = intervals
		.iter()
		.map(|&millis| {
			let tx = tx.clone();
			let mut timeout = AsyncTimeout::on_timeout(move || {
				tx.send(millis).unwrap();
			});
			timeout.timeout_mut().set_timeout(Duration::from_millis(millis));
			timeout
		})
		.collect();

	for timeout in &timeouts {
		timeout.enter();
	}
	thread::sleep(Duration::from_millis(1250));

	let mut fired = Vec::new();
	while let Ok(millis) = rx.try_recv() {
		fired.push(millis);
	}
	for timeout in &timeouts {
		assert!(timeout.exit(), "watchdog should have fired for {:?}", timeout.timeout().timeout());
	}
	fired
}

#[test]
fn watchdog_fires_in_expiry_order() {
	assert_eq!(firing_order(&[250, 500, 750, 1000]), [250, 500, 750, 1000]);
}

#[test]
fn reverse_insertion_fires_in_the_same_order() {
	assert_eq!(firing_order(&[1000, 750, 500, 250]), [250, 500, 750, 1000]);
}

#[test]
fn exit_without_expiry_reports_no_timeout() {
	let mut timeout = AsyncTimeout::new();
	timeout.timeout_mut().set_timeout(Duration::from_secs(60));
	timeout.enter();
	assert!(!timeout.exit());
}

#[test]
fn cancel_between_enter_and_exit_suppresses_one_firing() {
	let mut timeout = AsyncTimeout::new();
	timeout.timeout_mut().set_timeout(Duration::from_millis(100));

	timeout.enter();
	timeout.timeout().cancel();
	thread::sleep(Duration::from_millis(250));
	assert!(!timeout.exit(), "a cancelled epoch never fires");

	// The next epoch arms normally.
	timeout.enter();
	thread::sleep(Duration::from_millis(250));
	assert!(timeout.exit());
}

#[test]
fn wait_until_notified_times_out() {
	let mut timeout = Timeout::new();
	timeout.set_timeout(Duration::from_millis(50));

	let mutex = Mutex::new(());
	let condvar = Condvar::new();
	let mut guard = mutex.lock();
	let started = Instant::now();
	let result = timeout.wait_until_notified(&condvar, &mut guard);
	assert!(matches!(result, Err(Error::TimedOut { .. })));
	assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn wait_until_notified_returns_on_signal() {
	let mut timeout = Timeout::new();
	timeout.set_timeout(Duration::from_secs(5));

	let shared = Arc::new((Mutex::new(false), Condvar::new()));
	let signaller = Arc::clone(&shared);
	let handle = thread::spawn(move || {
		thread::sleep(Duration::from_millis(50));
		let (mutex, condvar) = &*signaller;
		let mut ready = mutex.lock();
		*ready = true;
		condvar.notify_all();
	});

	let (mutex, condvar) = &*shared;
	let mut ready = mutex.lock();
	while !*ready {
		timeout.wait_until_notified(condvar, &mut ready).unwrap();
	}
	drop(ready);
	handle.join().unwrap();
}

#[test]
fn canceled_wait_returns_normally() {
	let timeout = Arc::new({
		let mut t = Timeout::new();
		t.set_timeout(Duration::from_millis(150));
		t
	});
	let canceller = Arc::clone(&timeout);
	let handle = thread::spawn(move || {
		thread::sleep(Duration::from_millis(20));
		canceller.cancel();
	});

	let mutex = Mutex::new(());
	let condvar = Condvar::new();
	let mut guard = mutex.lock();
	timeout.wait_until_notified(&condvar, &mut guard).unwrap();
	drop(guard);
	handle.join().unwrap();
}

#[test]
fn deadline_in_the_past_fails_immediately() {
	let mut timeout = Timeout::new();
	timeout.set_deadline(Instant::now() - Duration::from_secs(1));

	let mutex = Mutex::new(());
	let condvar = Condvar::new();
	let mut guard = mutex.lock();
	assert!(matches!(
		timeout.wait_until_notified(&condvar, &mut guard),
		Err(Error::TimedOut { .. }),
	));
}

/// Blocks until its timeout interrupts it.
struct StuckSource;

impl Source for StuckSource {
	fn read(&mut self, _sink: &mut Buffer, _byte_count: usize) -> Result<usize, Error> {
		thread::sleep(Duration::from_millis(300));
		Ok(0)
	}
}

#[test]
fn wrapped_source_reports_timeouts() {
	let mut timeout = AsyncTimeout::new();
	timeout.timeout_mut().set_timeout(Duration::from_millis(50));
	let mut source = timeout.source(StuckSource);

	let mut sink = Buffer::new();
	let result = source.read(&mut sink, 1);
	assert!(matches!(result, Err(Error::TimedOut { .. })));
}

#[test]
fn wrapped_source_passes_fast_reads_through() {
	let mut timeout = AsyncTimeout::new();
	timeout.timeout_mut().set_timeout(Duration::from_secs(30));
	let data = b"quick".to_vec();
	let mut source = timeout.source(data.as_slice());

	let mut sink = Buffer::new();
	assert_eq!(source.read(&mut sink, 5).unwrap(), 5);
	assert_eq!(sink.read_all_utf8(), "quick");
}
