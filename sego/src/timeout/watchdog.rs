// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use crate::{Buffer, Error, Result, Timeout};
use crate::streams::{Sink, Source};

/// A [`Timeout`] enforced by a watchdog thread.
///
/// [`enter`](Self::enter) registers the coming expiry in a process-wide
/// queue; [`exit`](Self::exit) withdraws it and reports whether the watchdog
/// fired first. When an armed operation overruns, the watchdog invokes the
/// registered callback from its own thread — the callback's job is to shut
/// the underlying resource so the blocked operation returns. Re-entering
/// after a firing begins a new epoch.
pub struct AsyncTimeout {
	timeout: Timeout,
	node: Arc<Node>,
}

struct Node {
	id: u64,
	state: Mutex<State>,
	/// Cancel generation at the time of `enter`; a bump before expiry
	/// suppresses that single firing.
	armed_generation: AtomicU64,
	cancel: Arc<AtomicU64>,
	callback: Option<Box<dyn Fn() + Send + Sync>>,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum State {
	Idle,
	InQueue,
	TimedOut,
}

impl Default for AsyncTimeout {
	fn default() -> Self {
		Self::new()
	}
}

impl AsyncTimeout {
	/// Creates an async timeout with no callback; it still fails overrunning
	/// wrapped operations with [`Error::TimedOut`].
	pub fn new() -> Self {
		Self::build(None)
	}

	/// Creates an async timeout whose `callback` runs on the watchdog thread
	/// when an armed operation overruns. Interrupt the blocked work there,
	/// typically by closing the resource it is blocked on.
	pub fn on_timeout(callback: impl Fn() + Send + Sync + 'static) -> Self {
		Self::build(Some(Box::new(callback)))
	}

	fn build(callback: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
		static NEXT_ID: AtomicU64 = AtomicU64::new(0);
		let timeout = Timeout::new();
		Self {
			node: Arc::new(Node {
				id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
				state: Mutex::new(State::Idle),
				armed_generation: AtomicU64::new(0),
				cancel: timeout.cancel_handle(),
				callback,
			}),
			timeout,
		}
	}

	/// Returns the timeout settings.
	pub fn timeout(&self) -> &Timeout {
		&self.timeout
	}

	/// Returns the timeout settings mutably.
	pub fn timeout_mut(&mut self) -> &mut Timeout {
		&mut self.timeout
	}

	/// Arms the watchdog for the operation about to run. A no-op when neither
	/// an idle timeout nor a deadline is set, or when already armed.
	pub fn enter(&self) {
		let now = Instant::now();
		let Some(wait) = self.timeout.effective_wait(now) else { return };
		let expires = now + wait;

		{
			let mut state = self.node.state.lock();
			if *state == State::InQueue {
				return;
			}
			*state = State::InQueue;
		}
		self.node.armed_generation.store(
			self.node.cancel.load(Ordering::SeqCst),
			Ordering::SeqCst,
		);
		watchdog().schedule(expires, &self.node);
	}

	/// Disarms the watchdog, returning `true` if it fired while armed. The
	/// node is left ready for the next epoch either way.
	pub fn exit(&self) -> bool {
		watchdog().withdraw(&self.node);
		let mut state = self.node.state.lock();
		let fired = *state == State::TimedOut;
		*state = State::Idle;
		fired
	}

	/// Runs `op` between [`enter`](Self::enter) and [`exit`](Self::exit).
	/// When the watchdog fires first the result is [`Error::TimedOut`], with
	/// `op`'s own failure, if any, attached as the cause.
	pub fn around<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
		self.enter();
		let result = op();
		if self.exit() {
			Err(match result {
				Err(cause) => Error::timed_out_with(cause),
				Ok(_) => Error::timed_out(),
			})
		} else {
			result
		}
	}

	/// Wraps `source` so every read, and the close, is bounded by this
	/// timeout.
	pub fn source<S: Source>(self, source: S) -> TimedSource<S> {
		TimedSource { timeout: self, source }
	}

	/// Wraps `sink` so every write, flush, and close is bounded by this
	/// timeout.
	pub fn sink<S: Sink>(self, sink: S) -> TimedSink<S> {
		TimedSink { timeout: self, sink }
	}
}

/// A [`Source`] whose operations are bounded by an [`AsyncTimeout`].
pub struct TimedSource<S: Source> {
	timeout: AsyncTimeout,
	source: S,
}

impl<S: Source> TimedSource<S> {
	pub fn get_ref(&self) -> &S { &self.source }
	pub fn get_mut(&mut self) -> &mut S { &mut self.source }

	/// Returns the timeout settings mutably.
	pub fn timeout_mut(&mut self) -> &mut Timeout {
		self.timeout.timeout_mut()
	}
}

impl<S: Source> Source for TimedSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let source = &mut self.source;
		self.timeout.around(|| source.read(sink, byte_count))
	}

	fn timeout(&self) -> &Timeout {
		self.timeout.timeout()
	}

	fn close(&mut self) -> Result {
		let source = &mut self.source;
		self.timeout.around(|| source.close())
	}
}

/// A [`Sink`] whose operations are bounded by an [`AsyncTimeout`].
pub struct TimedSink<S: Sink> {
	timeout: AsyncTimeout,
	sink: S,
}

impl<S: Sink> TimedSink<S> {
	pub fn get_ref(&self) -> &S { &self.sink }
	pub fn get_mut(&mut self) -> &mut S { &mut self.sink }

	/// Returns the timeout settings mutably.
	pub fn timeout_mut(&mut self) -> &mut Timeout {
		self.timeout.timeout_mut()
	}
}

impl<S: Sink> Sink for TimedSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		let sink = &mut self.sink;
		self.timeout.around(|| sink.write(source, byte_count))
	}

	fn flush(&mut self) -> Result {
		let sink = &mut self.sink;
		self.timeout.around(|| sink.flush())
	}

	fn timeout(&self) -> &Timeout {
		self.timeout.timeout()
	}

	fn close(&mut self) -> Result {
		let sink = &mut self.sink;
		self.timeout.around(|| sink.close())
	}
}

/// The expiry queue shared by every [`AsyncTimeout`], drained by one watchdog
/// thread spawned on first use.
struct Watchdog {
	queue: Mutex<Vec<Entry>>,
	condvar: Condvar,
}

struct Entry {
	expires: Instant,
	seq: u64,
	node: Arc<Node>,
}

fn watchdog() -> &'static Watchdog {
	static WATCHDOG: Lazy<Watchdog> = Lazy::new(|| {
		thread::Builder::new()
			.name("sego-watchdog".into())
			.spawn(run_watchdog)
			.expect("failed to spawn the watchdog thread");
		tracing::debug!("watchdog thread started");
		Watchdog {
			queue: Mutex::new(Vec::new()),
			condvar: Condvar::new(),
		}
	});
	&WATCHDOG
}

impl Watchdog {
	fn schedule(&self, expires: Instant, node: &Arc<Node>) {
		static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);
		let entry = Entry {
			expires,
			seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
			node: Arc::clone(node),
		};

		let mut queue = self.queue.lock();
		let at = queue.partition_point(|e| (e.expires, e.seq) <= (entry.expires, entry.seq));
		queue.insert(at, entry);
		if at == 0 {
			// New head: the watchdog must shorten its sleep.
			self.condvar.notify_one();
		}
	}

	fn withdraw(&self, node: &Arc<Node>) {
		let mut queue = self.queue.lock();
		queue.retain(|entry| entry.node.id != node.id);
	}
}

fn run_watchdog() {
	let watchdog = watchdog();
	loop {
		let mut expired = Vec::new();
		{
			let mut queue = watchdog.queue.lock();
			match queue.first() {
				None => {
					watchdog.condvar.wait(&mut queue);
					continue;
				}
				Some(head) => {
					let now = Instant::now();
					if head.expires > now {
						let wait = head.expires - now;
						watchdog.condvar.wait_for(&mut queue, wait);
						continue;
					}
					while queue.first().is_some_and(|e| e.expires <= now) {
						expired.push(queue.remove(0));
					}
				}
			}

			// Mark states while still holding the queue lock, so a racing
			// exit() observes either the queue entry or the fired state.
			for entry in &expired {
				let canceled = entry.node.cancel.load(Ordering::SeqCst)
					!= entry.node.armed_generation.load(Ordering::SeqCst);
				let mut state = entry.node.state.lock();
				if *state == State::InQueue {
					*state = if canceled { State::Idle } else { State::TimedOut };
				}
			}
		}

		for entry in expired {
			let fired = *entry.node.state.lock() == State::TimedOut;
			if fired {
				tracing::trace!(id = entry.node.id, "async timeout fired");
				if let Some(callback) = &entry.node.callback {
					callback();
				}
			}
		}
	}
}
