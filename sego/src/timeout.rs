// SPDX-License-Identifier: Apache-2.0

mod watchdog;

pub use watchdog::*;

use std::cmp::min;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, MutexGuard};
use crate::{Error, Result};

/// A policy for how long a stream operation may block: an idle timeout bounds
/// one wait, an absolute deadline bounds the whole job. [`Duration::ZERO`]
/// means no idle timeout.
///
/// Cancellation is cooperative: [`cancel`](Self::cancel) bumps a generation
/// counter, and a blocked operation that observes the bump returns promptly
/// without reporting a timeout.
pub struct Timeout {
	timeout: Duration,
	deadline: Option<Instant>,
	generation: Arc<AtomicU64>,
}

impl Default for Timeout {
	fn default() -> Self {
		Self::new()
	}
}

impl Timeout {
	/// Creates a timeout with no idle timeout and no deadline.
	pub fn new() -> Self {
		Self {
			timeout: Duration::ZERO,
			deadline: None,
			generation: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Returns a shared timeout that never times out, for streams with no
	/// blocking to bound.
	pub fn none_ref() -> &'static Timeout {
		static NONE: Lazy<Timeout> = Lazy::new(Timeout::new);
		&NONE
	}

	/// Returns the idle timeout; zero means none.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Bounds a single blocking wait to `timeout`. Zero clears the bound.
	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = timeout;
	}

	/// Returns the absolute deadline, if one is set.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Fails every blocking operation on this timeout after `deadline`.
	pub fn set_deadline(&mut self, deadline: Instant) {
		self.deadline = Some(deadline);
	}

	/// Sets the deadline to `duration` from now.
	pub fn deadline_after(&mut self, duration: Duration) {
		self.set_deadline(Instant::now() + duration);
	}

	/// Clears the deadline.
	pub fn clear_deadline(&mut self) {
		self.deadline = None;
	}

	/// Requests that any blocked operation on this timeout return as soon as
	/// it safely can, without reporting a timeout. Cancelling is monotone: it
	/// affects waits in flight, never waits that begin later.
	pub fn cancel(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}

	pub(crate) fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	pub(crate) fn cancel_handle(&self) -> Arc<AtomicU64> {
		Arc::clone(&self.generation)
	}

	/// Fails with [`Error::TimedOut`] if the deadline has already passed.
	pub fn check_expired(&self) -> Result {
		match self.deadline {
			Some(deadline) if deadline <= Instant::now() => Err(Error::timed_out()),
			_ => Ok(()),
		}
	}

	/// Returns how long one wait may block from `now`: the smaller of the
	/// idle timeout and the time to the deadline, or `None` when unbounded.
	pub(crate) fn effective_wait(&self, now: Instant) -> Option<Duration> {
		let until_deadline = self.deadline
			.map(|deadline| deadline.saturating_duration_since(now));
		match (self.timeout, until_deadline) {
			(Duration::ZERO, None) => None,
			(Duration::ZERO, Some(remaining)) => Some(remaining),
			(timeout, None) => Some(timeout),
			(timeout, Some(remaining)) => Some(min(timeout, remaining)),
		}
	}

	/// Blocks on `condvar` until it is signaled, the effective wait elapses,
	/// or the timeout is cancelled.
	///
	/// The caller holds the lock guarding the awaited condition; it is
	/// released while blocked and reacquired before returning. Elapsing fails
	/// with [`Error::TimedOut`]; a cancelled timeout returns `Ok` as if it
	/// never fired.
	pub fn wait_until_notified<T: ?Sized>(
		&self,
		condvar: &Condvar,
		guard: &mut MutexGuard<'_, T>,
	) -> Result {
		let generation = self.generation();
		match self.effective_wait(Instant::now()) {
			None => {
				condvar.wait(guard);
				Ok(())
			}
			Some(wait) if wait.is_zero() => Err(Error::timed_out()),
			Some(wait) => {
				let outcome = condvar.wait_for(guard, wait);
				if !outcome.timed_out() || self.generation() != generation {
					Ok(())
				} else {
					Err(Error::timed_out())
				}
			}
		}
	}

	/// Runs `block` with this timeout tightened to the stricter of itself and
	/// `other`, restoring the previous settings on the way out. A zero value
	/// stays zero only when both sides are zero; otherwise the smaller
	/// non-zero value wins.
	pub fn intersect_with<R>(
		&mut self,
		other: &Timeout,
		block: impl FnOnce(&mut Timeout) -> R,
	) -> R {
		self.intersect_values(other.timeout, other.deadline, block)
	}

	pub(crate) fn intersect_values<R>(
		&mut self,
		timeout: Duration,
		deadline: Option<Instant>,
		block: impl FnOnce(&mut Timeout) -> R,
	) -> R {
		struct Restore<'t> {
			timeout: &'t mut Timeout,
			saved: (Duration, Option<Instant>),
		}

		impl Drop for Restore<'_> {
			fn drop(&mut self) {
				self.timeout.timeout = self.saved.0;
				self.timeout.deadline = self.saved.1;
			}
		}

		let saved = (self.timeout, self.deadline);
		self.timeout = min_non_zero(self.timeout, timeout);
		self.deadline = match (self.deadline, deadline) {
			(Some(a), Some(b)) => Some(min(a, b)),
			(a, b) => a.or(b),
		};

		let restore = Restore { timeout: self, saved };
		block(&mut *restore.timeout)
	}
}

fn min_non_zero(a: Duration, b: Duration) -> Duration {
	if a.is_zero() {
		b
	} else if b.is_zero() {
		a
	} else {
		min(a, b)
	}
}
