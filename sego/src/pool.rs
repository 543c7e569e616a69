// SPDX-License-Identifier: Apache-2.0

//! The process-wide segment pool.
//!
//! Buffers claim segments with [`take`] and hand them back with [`recycle`].
//! The pool is striped into a few independently locked shards to keep
//! contention low; a thread sticks to one shard for its lifetime. Each shard
//! retains at most its slice of [`MAX_SIZE`] bytes, so at steady state the pool
//! as a whole never holds more than `MAX_SIZE` plus one segment in transit.

use std::sync::atomic::{AtomicUsize, Ordering};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use crate::segment::{Segment, SIZE};

/// The maximum byte count retained by the pool, 64 segments.
pub const MAX_SIZE: usize = 64 * SIZE;

const SHARD_COUNT: usize = 4;
const SHARD_MAX: usize = MAX_SIZE / SHARD_COUNT;

static POOL: Lazy<SegmentPool> = Lazy::new(SegmentPool::new);

/// Returns the process-wide pool.
pub fn pool() -> &'static SegmentPool { &POOL }

/// A bounded reservoir of recycled segments.
pub struct SegmentPool {
	shards: [Mutex<Shard>; SHARD_COUNT],
}

#[derive(Default)]
struct Shard {
	segments: Vec<Segment>,
	byte_count: usize,
}

impl SegmentPool {
	fn new() -> Self {
		Self { shards: Default::default() }
	}

	fn shard(&self) -> &Mutex<Shard> {
		static NEXT: AtomicUsize = AtomicUsize::new(0);
		thread_local! {
			static SHARD: usize = NEXT.fetch_add(1, Ordering::Relaxed) % SHARD_COUNT;
		}
		&self.shards[SHARD.with(|index| *index)]
	}

	/// Pops a recycled segment, or allocates a fresh one when the shard is
	/// empty. Never blocks for long: the shard lock is only held to pop.
	pub fn take(&self) -> Segment {
		let recycled = {
			let mut shard = self.shard().lock();
			let seg = shard.segments.pop();
			if seg.is_some() {
				shard.byte_count -= SIZE;
			}
			seg
		};
		recycled.unwrap_or_else(|| {
			tracing::trace!("segment pool empty, allocating");
			Segment::alloc()
		})
	}

	/// Returns a segment to the pool. Shared segments are dropped instead;
	/// their block is still aliased elsewhere and must not be handed out for
	/// writing. Segments past the shard's byte cap are dropped for the
	/// allocator to reclaim.
	pub fn recycle(&self, mut segment: Segment) {
		if segment.is_shared() {
			return;
		}
		segment.reset();

		let mut shard = self.shard().lock();
		if shard.byte_count + SIZE > SHARD_MAX {
			return;
		}
		shard.byte_count += SIZE;
		shard.segments.push(segment);
	}

	/// Returns the total byte count currently retained.
	pub fn byte_count(&self) -> usize {
		self.shards
			.iter()
			.map(|shard| shard.lock().byte_count)
			.sum()
	}

	/// Drops every retained segment. Keeps pooled memory from leaking across
	/// test boundaries.
	#[doc(hidden)]
	pub fn drain(&self) {
		for shard in &self.shards {
			let mut shard = shard.lock();
			shard.segments.clear();
			shard.byte_count = 0;
		}
	}
}

#[cfg(test)]
mod test {
	use super::{pool, MAX_SIZE, SIZE};
	use crate::segment::Segment;

	#[test]
	fn recycle_rejects_shared() {
		let mut seg = Segment::alloc();
		seg.push_slice(b"pinned");
		let alias = seg.share_all();

		pool().drain();
		pool().recycle(seg);
		assert_eq!(pool().byte_count(), 0, "shared segment should be dropped");
		drop(alias);
	}

	#[test]
	fn byte_count_stays_bounded() {
		pool().drain();
		for _ in 0..2 * (MAX_SIZE / SIZE) {
			pool().recycle(Segment::alloc());
		}
		assert!(pool().byte_count() <= MAX_SIZE);
	}
}
