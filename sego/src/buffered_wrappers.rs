// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use crate::{Buffer, Error, Result, Timeout};
use crate::segment::SIZE;
use crate::streams::{BufSink, BufSource, BufStream, Sink, Source};

/// A [`Source`] that amortizes small reads against an internal [`Buffer`],
/// surfacing every typed read in [`BufSource`].
pub struct BufferedSource<S: Source> {
	buffer: Buffer,
	source: S,
	closed: bool,
}

impl<S: Source> BufferedSource<S> {
	pub fn new(source: S) -> Self {
		Self {
			buffer: Buffer::new(),
			source,
			closed: false,
		}
	}

	/// Returns the underlying source.
	pub fn get_ref(&self) -> &S { &self.source }

	/// Returns the underlying source mutably. Reading from it directly leaves
	/// the bytes already buffered here in place.
	pub fn get_mut(&mut self) -> &mut S { &mut self.source }

	/// Returns a source that reads this source's coming bytes without
	/// consuming them. The peek borrows this source; once it is dropped,
	/// reading from `self` resumes at the unconsumed position.
	pub fn peek(&mut self) -> BufferedSource<PeekSource<'_, S>> {
		BufferedSource::new(PeekSource { parent: self, offset: 0 })
	}

	fn fill(&mut self) -> Result<usize> {
		self.source.read(&mut self.buffer, SIZE)
	}
}

impl<S: Source> Source for BufferedSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::Closed);
		}
		if self.buffer.is_empty() && self.fill()? == 0 {
			return Ok(0);
		}
		Source::read(&mut self.buffer, sink, byte_count)
	}

	fn timeout(&self) -> &Timeout {
		self.source.timeout()
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		let closed = self.source.close();
		self.buffer.clear();
		closed
	}
}

impl<S: Source> BufStream for BufferedSource<S> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Source> BufSource for BufferedSource<S> {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		if self.closed {
			return Err(Error::Closed);
		}
		while self.buffer.len() < byte_count {
			if self.fill()? == 0 {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

impl<S: Source> Drop for BufferedSource<S> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// The replaying source behind [`BufferedSource::peek`]. Reads look ahead in
/// the parent's buffer, refilling it from the parent's source as needed, and
/// never consume from it.
pub struct PeekSource<'a, S: Source> {
	parent: &'a mut BufferedSource<S>,
	offset: usize,
}

impl<S: Source> Source for PeekSource<'_, S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if byte_count == 0 {
			return Ok(0);
		}
		if !self.parent.request(self.offset + 1)? {
			return Ok(0);
		}
		let available = self.parent.buf().len() - self.offset;
		let n = min(byte_count, available);
		self.parent.buf().copy_to(sink, self.offset, n);
		self.offset += n;
		Ok(n)
	}

	fn timeout(&self) -> &Timeout {
		self.parent.timeout()
	}
}

/// A [`Sink`] that amortizes small writes against an internal [`Buffer`],
/// surfacing every typed write in [`BufSink`]. Typed writes push full
/// segments down to the underlying sink as they are completed.
pub struct BufferedSink<S: Sink> {
	buffer: Buffer,
	sink: S,
	closed: bool,
}

impl<S: Sink> BufferedSink<S> {
	pub fn new(sink: S) -> Self {
		Self {
			buffer: Buffer::new(),
			sink,
			closed: false,
		}
	}

	/// Returns the underlying sink.
	pub fn get_ref(&self) -> &S { &self.sink }

	/// Returns the underlying sink mutably. Writing to it directly reorders
	/// those bytes ahead of anything still buffered here.
	pub fn get_mut(&mut self) -> &mut S { &mut self.sink }
}

impl<S: Sink> Sink for BufferedSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		self.buffer.write(source, byte_count)?;
		self.emit_complete_segments()
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		self.emit()?;
		self.sink.flush()
	}

	fn timeout(&self) -> &Timeout {
		self.sink.timeout()
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		// Every step runs; the first failure is reported.
		let emitted = if self.buffer.is_empty() {
			Ok(())
		} else {
			let n = self.buffer.len();
			self.sink.write(&mut self.buffer, n)
		};
		let closed = self.sink.close();
		self.buffer.clear();
		emitted?;
		closed
	}
}

impl<S: Sink> BufStream for BufferedSink<S> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Sink> BufSink for BufferedSink<S> {
	fn emit_complete_segments(&mut self) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		let byte_count = self.buffer.complete_segment_byte_count();
		if byte_count > 0 {
			self.sink.write(&mut self.buffer, byte_count)?;
		}
		Ok(())
	}

	fn emit(&mut self) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		let byte_count = self.buffer.len();
		if byte_count > 0 {
			self.sink.write(&mut self.buffer, byte_count)?;
		}
		Ok(())
	}
}

impl<S: Sink> Drop for BufferedSink<S> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

impl Buffer {
	/// Returns the byte count that [`BufSink::emit_complete_segments`] would
	/// move: everything except a partial, appendable tail.
	pub(crate) fn complete_segment_byte_count(&self) -> usize {
		match self.segments().back() {
			Some(tail) if tail.capacity() > 0 && !tail.is_shared() => {
				self.len() - tail.len()
			}
			_ => self.len(),
		}
	}
}
