// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use crate::Buffer;
use crate::pool::pool;
use crate::segment::SIZE;

impl Buffer {
	/// Returns a cursor over this buffer's segments for read-only access to
	/// their backing memory. The mutable borrow enforces that one cursor is
	/// live at a time.
	pub fn read_unsafe(&mut self) -> UnsafeCursor<'_> {
		UnsafeCursor::new(self, false)
	}

	/// Returns a cursor permitting in-place modification of segment memory.
	/// Touching a shared segment's bytes through the cursor copies the block
	/// first, so aliasing snapshots never observe the edit.
	pub fn read_and_write_unsafe(&mut self) -> UnsafeCursor<'_> {
		UnsafeCursor::new(self, true)
	}
}

/// A scoped handle over a [`Buffer`]'s segment memory, for callers that must
/// interoperate with byte-slice APIs without an intermediate copy.
///
/// The cursor points at one byte offset at a time; [`data`](Self::data)
/// exposes the live bytes from that offset to the end of the containing
/// segment. Offset −1 ("before first") and the buffer size ("after last") are
/// valid unpositioned sentinels.
pub struct UnsafeCursor<'b> {
	buffer: &'b mut Buffer,
	readwrite: bool,
	offset: i64,
	seg: Option<usize>,
	seg_start: usize,
}

impl<'b> UnsafeCursor<'b> {
	fn new(buffer: &'b mut Buffer, readwrite: bool) -> Self {
		Self {
			buffer,
			readwrite,
			offset: -1,
			seg: None,
			seg_start: 0,
		}
	}

	/// Returns the current byte offset, or −1 before the first seek.
	pub fn offset(&self) -> i64 { self.offset }

	/// Returns `true` if the cursor may modify segment memory.
	pub fn is_read_write(&self) -> bool { self.readwrite }

	/// Positions the cursor at `offset`, returning the number of bytes from
	/// there to the end of the containing segment, or `None` for the −1 and
	/// end-of-buffer sentinels.
	///
	/// # Panics
	///
	/// Panics when `offset` is outside `[-1, buffer.len()]`.
	pub fn seek(&mut self, offset: i64) -> Option<usize> {
		let len = self.buffer.len() as i64;
		assert!(
			(-1..=len).contains(&offset),
			"offset {offset} out of range [-1, {len}]",
		);
		self.offset = offset;
		if offset == -1 || offset == len {
			self.seg = None;
			return None;
		}

		let mut start = 0;
		for (i, seg) in self.buffer.segments().iter().enumerate() {
			let end = start + seg.len();
			if (offset as usize) < end {
				self.seg = Some(i);
				self.seg_start = start;
				return Some(end - offset as usize);
			}
			start = end;
		}
		unreachable!("offset within bounds must land in a segment")
	}

	/// Advances to the next unvisited byte: offset 0 from the −1 sentinel,
	/// the following segment boundary otherwise. Returns the new window
	/// length, or `None` once the buffer is exhausted.
	pub fn next(&mut self) -> Option<usize> {
		let target = if self.offset == -1 {
			0
		} else {
			match self.seg {
				Some(i) => (self.seg_start + self.buffer.segments()[i].len()) as i64,
				None => return None,
			}
		};
		self.seek(target)
	}

	/// Returns the live bytes from the cursor offset to the end of the current
	/// segment.
	///
	/// # Panics
	///
	/// Panics when the cursor is at a sentinel offset.
	pub fn data(&self) -> &[u8] {
		let i = self.expect_positioned();
		let within = self.offset as usize - self.seg_start;
		&self.buffer.segments()[i].data()[within..]
	}

	/// Returns the current window mutably, copying the block first when it is
	/// shared.
	///
	/// # Panics
	///
	/// Panics on a read-only cursor, or at a sentinel offset.
	pub fn data_mut(&mut self) -> &mut [u8] {
		assert!(self.readwrite, "cursor was acquired read-only");
		let i = self.expect_positioned();
		let within = self.offset as usize - self.seg_start;
		&mut self.buffer.segments_mut()[i].data_mut()[within..]
	}

	/// Grows or shrinks the buffer to `new_size` bytes. Shrinking drops bytes
	/// from the end and parks the cursor at the new end; growing appends
	/// uninitialized capacity and parks the cursor at the old size.
	///
	/// # Panics
	///
	/// Panics on a read-only cursor.
	pub fn resize_buffer(&mut self, new_size: usize) {
		assert!(self.readwrite, "cursor was acquired read-only");
		let old_size = self.buffer.len();

		if new_size < old_size {
			let mut excess = old_size - new_size;
			while excess > 0 {
				let tail = self.buffer.segments_mut()
					.back_mut()
					.expect("a non-empty buffer has a tail");
				let tail_len = tail.len();
				if tail_len <= excess {
					let seg = self.buffer.segments_mut().pop_back().unwrap();
					pool().recycle(seg);
					excess -= tail_len;
				} else {
					tail.truncate(excess);
					excess = 0;
				}
			}
			self.buffer.set_len(new_size);
			self.seek(new_size as i64);
		} else if new_size > old_size {
			let mut needed = new_size - old_size;
			while needed > 0 {
				let tail = self.buffer.writable_tail(1);
				let n = min(needed, tail.capacity());
				tail.add(n);
				needed -= n;
				let len = self.buffer.len();
				self.buffer.set_len(len + n);
			}
			self.seek(old_size as i64);
		}
	}

	/// Appends at least `min_byte_count` bytes of uninitialized capacity,
	/// growing the buffer by the whole claimed tail. Parks the cursor at the
	/// old size and returns the number of bytes added.
	///
	/// # Panics
	///
	/// Panics on a read-only cursor, or when `min_byte_count` is zero or
	/// exceeds the segment size.
	pub fn expand_buffer(&mut self, min_byte_count: usize) -> usize {
		assert!(self.readwrite, "cursor was acquired read-only");
		assert!(
			min_byte_count > 0 && min_byte_count <= SIZE,
			"min_byte_count {min_byte_count} out of range (0, {SIZE}]",
		);
		let old_size = self.buffer.len();
		let tail = self.buffer.writable_tail(min_byte_count);
		let added = tail.capacity();
		tail.add(added);
		self.buffer.set_len(old_size + added);
		self.seek(old_size as i64);
		added
	}

	fn expect_positioned(&self) -> usize {
		self.seg.expect("cursor is not positioned at a byte; seek or next first")
	}
}
