// SPDX-License-Identifier: Apache-2.0

mod cursor;
mod read;
mod write;

pub use cursor::*;

use std::cmp::min;
use std::collections::VecDeque;
use std::fmt;
use crate::byte_str::ByteString;
use crate::pool::pool;
use crate::segment::{Segment, SIZE};

/// A mutable sequence of bytes held in a queue of pooled segments.
///
/// A buffer is both a [`Source`](crate::streams::Source) and a
/// [`Sink`](crate::streams::Sink): bytes written to the back are read from the
/// front. Moving data between buffers transfers whole segments by pointer
/// wherever possible, so large transfers cost O(1) per segment instead of a
/// byte copy.
///
/// A buffer has one logical owner and is not thread-safe; the segment pool
/// behind every buffer is process-wide and thread-safe.
#[derive(Default)]
pub struct Buffer {
	segments: VecDeque<Segment>,
	len: usize,
}

impl Buffer {
	/// Creates an empty buffer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of readable bytes.
	pub fn len(&self) -> usize { self.len }

	/// Returns `true` if there are no readable bytes.
	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Recycles every segment, leaving the buffer empty.
	pub fn clear(&mut self) {
		for seg in self.segments.drain(..) {
			pool().recycle(seg);
		}
		self.len = 0;
	}

	/// Returns the byte at `index`, or `None` past the end.
	pub fn get(&self, mut index: usize) -> Option<u8> {
		for seg in &self.segments {
			if index < seg.len() {
				return Some(seg.data()[index]);
			}
			index -= seg.len();
		}
		None
	}

	/// Returns the index of the first occurrence of `byte` at or after `from`,
	/// or `None` if absent.
	pub fn index_of(&self, byte: u8, from: usize) -> Option<usize> {
		self.index_of_in(byte, from, self.len)
	}

	/// Returns the index of the first occurrence of `byte` in `[from, to)`.
	pub fn index_of_in(&self, byte: u8, from: usize, to: usize) -> Option<usize> {
		let to = min(to, self.len);
		if from >= to {
			return None;
		}
		let mut offset = 0;
		for seg in &self.segments {
			let data = seg.data();
			let end = offset + data.len();
			if end > from {
				let start = from.saturating_sub(offset);
				let stop = min(data.len(), to - offset);
				if let Some(i) = memchr::memchr(byte, &data[start..stop]) {
					return Some(offset + start + i);
				}
			}
			offset = end;
			if offset >= to {
				break;
			}
		}
		None
	}

	/// Returns the index of the first occurrence of `bytes` at or after
	/// `from`. A two-level scan: find the anchor byte, then compare the run.
	pub fn index_of_bytes(&self, bytes: &[u8], from: usize) -> Option<usize> {
		assert!(!bytes.is_empty(), "bytes must not be empty");
		let mut pos = from;
		while let Some(found) = self.index_of(bytes[0], pos) {
			if self.range_equals(found, bytes) {
				return Some(found);
			}
			pos = found + 1;
		}
		None
	}

	/// Returns `true` if the bytes at `offset` equal `bytes`. Out-of-range
	/// offsets compare unequal rather than panicking.
	pub fn range_equals(&self, offset: usize, bytes: &[u8]) -> bool {
		let Some(end) = offset.checked_add(bytes.len()) else { return false };
		if end > self.len {
			return false;
		}
		let mut compared = 0;
		let mut seg_offset = 0;
		for seg in &self.segments {
			let data = seg.data();
			let seg_end = seg_offset + data.len();
			if seg_end > offset + compared {
				let start = offset + compared - seg_offset;
				let take = min(data.len() - start, bytes.len() - compared);
				if data[start..start + take] != bytes[compared..compared + take] {
					return false;
				}
				compared += take;
				if compared == bytes.len() {
					return true;
				}
			}
			seg_offset = seg_end;
		}
		compared == bytes.len()
	}

	/// Returns an immutable snapshot of the current contents. The snapshot
	/// aliases this buffer's segments; both sides are copy-on-write from here
	/// on, so later writes to the buffer never show through.
	pub fn snapshot(&self) -> ByteString {
		ByteString::from_shared_segments(
			self.segments.iter().filter(|seg| !seg.is_empty()),
			self.len,
		)
	}

	/// Copies `byte_count` bytes at `offset` into `out` without consuming
	/// them. The copy aliases segments rather than copying bytes.
	pub fn copy_to(&self, out: &mut Buffer, mut offset: usize, mut byte_count: usize) {
		assert!(
			offset.checked_add(byte_count).is_some_and(|end| end <= self.len),
			"copy range [{offset}, {offset}+{byte_count}) out of bounds for buffer of {} bytes",
			self.len,
		);
		for seg in &self.segments {
			if byte_count == 0 {
				break;
			}
			let len = seg.len();
			if offset >= len {
				offset -= len;
				continue;
			}
			let take = min(len - offset, byte_count);
			out.push_segment(seg.share_range(offset, take));
			offset = 0;
			byte_count -= take;
		}
	}

	/// Consumes up to `byte_count` bytes, returning the number skipped.
	pub fn skip(&mut self, byte_count: usize) -> usize {
		self.read_segments(byte_count, |data| data.len())
	}

	/// Moves exactly `byte_count` bytes from the front of `source` to the back
	/// of this buffer.
	///
	/// Whole segments move by pointer. A partial head is copied into our tail
	/// when it fits, and split otherwise; splits of at least
	/// [`SHARE_MINIMUM`](crate::SHARE_MINIMUM) bytes alias the block instead
	/// of copying. Segment boundaries compact as they meet.
	///
	/// # Panics
	///
	/// Panics if `source` holds fewer than `byte_count` bytes.
	pub(crate) fn transfer_from(&mut self, source: &mut Buffer, mut byte_count: usize) {
		assert!(
			byte_count <= source.len,
			"byte_count ({byte_count}) exceeds source size ({})", source.len,
		);
		while byte_count > 0 {
			let head_len = source.segments
				.front()
				.expect("sized source should have a head segment")
				.len();
			if head_len == 0 {
				pool().recycle(source.segments.pop_front().unwrap());
				continue;
			}

			if byte_count < head_len {
				let fits_tail = self.segments
					.back()
					.is_some_and(|tail| !tail.is_shared() && tail.len() + byte_count <= SIZE);
				let head = source.segments.front_mut().unwrap();
				if fits_tail {
					let tail = self.segments.back_mut().unwrap();
					if tail.capacity() < byte_count {
						tail.shift();
					}
					tail.push_slice(&head.data()[..byte_count]);
					head.consume(byte_count);
					self.len += byte_count;
				} else {
					let piece = head.split_to(byte_count);
					self.push_segment(piece);
				}
				source.len -= byte_count;
				return;
			}

			let seg = source.segments.pop_front().unwrap();
			source.len -= head_len;
			self.push_segment(seg);
			byte_count -= head_len;
		}
	}

	/// Appends a segment, merging it into the tail when both sides allow it.
	/// Empty segments are recycled.
	pub(crate) fn push_segment(&mut self, seg: Segment) {
		let n = seg.len();
		if n == 0 {
			pool().recycle(seg);
			return;
		}
		match self.segments.back_mut() {
			Some(tail) if tail.can_absorb(&seg) => tail.absorb(seg),
			_ => self.segments.push_back(seg),
		}
		self.len += n;
	}

	/// Returns the tail segment with at least `min_capacity` writable bytes,
	/// claiming a pool segment if the current tail is shared or full.
	pub(crate) fn writable_tail(&mut self, min_capacity: usize) -> &mut Segment {
		debug_assert!(min_capacity <= SIZE);
		let reuse = match self.segments.back_mut() {
			Some(tail) if !tail.is_shared() => {
				if tail.capacity() >= min_capacity {
					true
				} else if SIZE - tail.len() >= min_capacity {
					tail.shift();
					true
				} else {
					false
				}
			}
			_ => false,
		};
		if !reuse {
			self.segments.push_back(pool().take());
		}
		self.segments
			.back_mut()
			.expect("a tail segment was just ensured")
	}

	/// Writes into the tail's spare capacity through `f`, which returns the
	/// number of bytes it produced.
	pub(crate) fn write_with<E>(
		&mut self,
		min_capacity: usize,
		f: impl FnOnce(&mut [u8]) -> Result<usize, E>,
	) -> Result<usize, E> {
		let tail = self.writable_tail(min_capacity);
		let n = f(tail.unfilled_mut())?;
		tail.add(n);
		self.len += n;
		Ok(n)
	}

	/// Consumes up to `max` front bytes through `f`, which returns how many of
	/// the offered bytes it took. Stops early when `f` takes fewer than
	/// offered. Drained segments are recycled.
	pub(crate) fn read_segments(
		&mut self,
		mut max: usize,
		mut f: impl FnMut(&[u8]) -> usize,
	) -> usize {
		let mut total = 0;
		while max > 0 {
			let Some(head) = self.segments.front_mut() else { break };
			if head.is_empty() {
				pool().recycle(self.segments.pop_front().unwrap());
				continue;
			}
			let offer = min(max, head.len());
			let taken = f(&head.data()[..offer]);
			debug_assert!(taken <= offer);
			head.consume(taken);
			self.len -= taken;
			total += taken;
			max -= taken;
			if head.is_empty() {
				pool().recycle(self.segments.pop_front().unwrap());
			}
			if taken < offer {
				break;
			}
		}
		total
	}

	pub(crate) fn segments(&self) -> &VecDeque<Segment> { &self.segments }
	pub(crate) fn segments_mut(&mut self) -> &mut VecDeque<Segment> { &mut self.segments }
	pub(crate) fn set_len(&mut self, len: usize) { self.len = len; }

	fn chunks(&self) -> impl Iterator<Item = &[u8]> {
		self.segments.iter().map(Segment::data)
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		self.clear();
	}
}

impl Clone for Buffer {
	/// Returns a buffer with the same contents. No bytes are copied: every
	/// segment is shared between the two buffers and copied only when either
	/// side writes.
	fn clone(&self) -> Self {
		let mut out = Buffer::new();
		self.copy_to(&mut out, 0, self.len);
		out
	}
}

impl PartialEq for Buffer {
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len
			&& self.chunks().flatten().eq(other.chunks().flatten())
	}
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const PREVIEW: usize = 64;
		write!(f, "Buffer[size={} data=", self.len)?;
		for byte in self.chunks().flatten().take(PREVIEW) {
			write!(f, "{byte:02x}")?;
		}
		if self.len > PREVIEW {
			write!(f, "…")?;
		}
		write!(f, "]")
	}
}

impl From<&[u8]> for Buffer {
	fn from(value: &[u8]) -> Self {
		let mut buf = Buffer::new();
		let _ = buf.write_slice(value);
		buf
	}
}

impl From<&str> for Buffer {
	fn from(value: &str) -> Self {
		value.as_bytes().into()
	}
}
