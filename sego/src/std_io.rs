// SPDX-License-Identifier: Apache-2.0

//! Adapters bridging [`std::io`] streams into [`Source`] and [`Sink`].

use std::cmp::min;
use std::io;
use crate::{Buffer, Error, Result};
use crate::streams::{Sink, Source};

/// A [`Source`] reading from a [`std::io::Read`].
pub struct ReaderSource<R: io::Read> {
	reader: R,
	closed: bool,
}

impl<R: io::Read> ReaderSource<R> {
	pub fn new(reader: R) -> Self {
		Self { reader, closed: false }
	}

	pub fn get_ref(&self) -> &R { &self.reader }
	pub fn get_mut(&mut self) -> &mut R { &mut self.reader }
}

impl<R: io::Read> From<R> for ReaderSource<R> {
	fn from(reader: R) -> Self {
		Self::new(reader)
	}
}

impl<R: io::Read> Source for ReaderSource<R> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::Closed);
		}
		if byte_count == 0 {
			return Ok(0);
		}
		let reader = &mut self.reader;
		sink.write_with(1, |spare| {
			let len = min(spare.len(), byte_count);
			reader.read(&mut spare[..len]).map_err(Error::from)
		})
	}

	fn close(&mut self) -> Result {
		self.closed = true;
		Ok(())
	}
}

/// A [`Sink`] writing to a [`std::io::Write`].
pub struct WriterSink<W: io::Write> {
	writer: W,
	closed: bool,
}

impl<W: io::Write> WriterSink<W> {
	pub fn new(writer: W) -> Self {
		Self { writer, closed: false }
	}

	pub fn get_ref(&self) -> &W { &self.writer }
	pub fn get_mut(&mut self) -> &mut W { &mut self.writer }
}

impl<W: io::Write> From<W> for WriterSink<W> {
	fn from(writer: W) -> Self {
		Self::new(writer)
	}
}

impl<W: io::Write> Sink for WriterSink<W> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		assert!(
			byte_count <= source.len(),
			"byte_count ({byte_count}) exceeds source size ({})", source.len(),
		);
		let mut remaining = byte_count;
		while remaining > 0 {
			let mut failure = None;
			let writer = &mut self.writer;
			let n = source.read_segments(remaining, |data| {
				match writer.write(data) {
					Ok(n) => n,
					Err(error) => {
						failure = Some(error);
						0
					}
				}
			});
			if let Some(error) = failure {
				return Err(error.into());
			}
			if n == 0 {
				return Err(io::Error::new(
					io::ErrorKind::WriteZero,
					"writer accepted no bytes",
				).into());
			}
			remaining -= n;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		Ok(self.writer.flush()?)
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		Ok(self.writer.flush()?)
	}
}

impl io::Read for Buffer {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(self.read_slice(buf))
	}
}

impl io::Write for Buffer {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.write_slice(buf).map_err(io::Error::from)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
