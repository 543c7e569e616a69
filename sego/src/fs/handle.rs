// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::{Buffer, BufferedSink, BufferedSource, Error, Result};
use crate::streams::{BufStream, Sink, Source};

/// The positional operations a [`FileHandle`] is built over. Offsets are
/// absolute; implementations supply their own interior synchronization.
pub trait RawFile: Send + Sync {
	fn size(&self) -> Result<u64>;
	fn resize(&self, size: u64) -> Result;
	/// Reads at `offset` into `dst`, returning the bytes read; zero at or
	/// past the end.
	fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize>;
	fn write_at(&self, offset: u64, src: &[u8]) -> Result;
	fn flush(&self) -> Result;
	fn close(&self) -> Result {
		Ok(())
	}
}

/// A random-access handle on an open file.
///
/// The handle hands out streaming adapters ([`source`](Self::source),
/// [`sink`](Self::sink)) that advance cursors of their own. Closing the
/// handle while streams are open defers releasing the resource until the last
/// stream closes; operations on the handle itself fail immediately after
/// [`close`](Self::close).
#[derive(Clone)]
pub struct FileHandle {
	inner: Arc<HandleInner>,
}

struct HandleInner {
	read_write: bool,
	raw: Box<dyn RawFile>,
	state: Mutex<HandleState>,
}

struct HandleState {
	closed: bool,
	open_streams: usize,
}

impl FileHandle {
	/// Wraps positional operations in a handle. `read_write` handles accept
	/// every operation; read-only handles reject mutation.
	pub fn new(raw: impl RawFile + 'static, read_write: bool) -> Self {
		Self {
			inner: Arc::new(HandleInner {
				read_write,
				raw: Box::new(raw),
				state: Mutex::new(HandleState {
					closed: false,
					open_streams: 0,
				}),
			}),
		}
	}

	/// Returns `true` if this handle accepts writes.
	pub fn is_read_write(&self) -> bool {
		self.inner.read_write
	}

	fn check_open(&self) -> Result {
		if self.inner.state.lock().closed {
			Err(Error::Closed)
		} else {
			Ok(())
		}
	}

	fn check_writable(&self) -> Result {
		self.check_open()?;
		if self.inner.read_write {
			Ok(())
		} else {
			Err(Error::Unsupported("file handle is read-only"))
		}
	}

	/// Returns the current file size.
	pub fn size(&self) -> Result<u64> {
		self.check_open()?;
		self.inner.raw.size()
	}

	/// Truncates or zero-extends the file to `size`.
	pub fn resize(&self, size: u64) -> Result {
		self.check_writable()?;
		self.inner.raw.resize(size)
	}

	/// Reads at `offset` into `dst`, returning the bytes read; zero at or
	/// past the end of the file.
	pub fn read(&self, offset: u64, dst: &mut [u8]) -> Result<usize> {
		self.check_open()?;
		self.inner.raw.read_at(offset, dst)
	}

	/// Writes all of `src` at `offset`, extending the file as needed.
	pub fn write(&self, offset: u64, src: &[u8]) -> Result {
		self.check_writable()?;
		self.inner.raw.write_at(offset, src)
	}

	/// Pushes written state down to the underlying storage.
	pub fn flush(&self) -> Result {
		self.check_writable()?;
		self.inner.raw.flush()
	}

	/// Closes the handle. The underlying resource is released once every
	/// derived stream is also closed.
	pub fn close(&self) -> Result {
		let release = {
			let mut state = self.inner.state.lock();
			if state.closed {
				return Ok(());
			}
			state.closed = true;
			state.open_streams == 0
		};
		if release {
			self.inner.raw.close()
		} else {
			Ok(())
		}
	}

	/// Returns a source reading forward from `file_offset`.
	pub fn source(&self, file_offset: u64) -> Result<FileHandleSource> {
		self.check_open()?;
		self.inner.state.lock().open_streams += 1;
		Ok(FileHandleSource {
			handle: self.clone(),
			position: file_offset,
			closed: false,
		})
	}

	/// Returns a sink writing forward from `file_offset`.
	pub fn sink(&self, file_offset: u64) -> Result<FileHandleSink> {
		self.check_writable()?;
		self.inner.state.lock().open_streams += 1;
		Ok(FileHandleSink {
			handle: self.clone(),
			position: file_offset,
			closed: false,
		})
	}

	/// Returns a sink writing from the current end of the file.
	pub fn appending_sink(&self) -> Result<FileHandleSink> {
		self.sink(self.size()?)
	}

	/// Returns the offset `stream` will read from next.
	///
	/// # Panics
	///
	/// Panics when `stream` came from a different handle.
	pub fn position(&self, stream: &FileHandleSource) -> Result<u64> {
		self.check_same_handle(&stream.handle);
		self.check_open()?;
		Ok(stream.position)
	}

	/// Moves `stream` to read from `offset` next.
	pub fn reposition(&self, stream: &mut FileHandleSource, offset: u64) -> Result {
		self.check_same_handle(&stream.handle);
		self.check_open()?;
		stream.position = offset;
		Ok(())
	}

	/// [`position`](Self::position) for a buffered stream: the buffered bytes
	/// are ahead of the underlying cursor, so they subtract.
	pub fn position_buffered(&self, stream: &BufferedSource<FileHandleSource>) -> Result<u64> {
		self.check_same_handle(&stream.get_ref().handle);
		self.check_open()?;
		Ok(stream.get_ref().position - stream.buf().len() as u64)
	}

	/// [`reposition`](Self::reposition) for a buffered stream. A target
	/// inside the buffered window skips within the buffer, keeping those
	/// bytes; a target outside it discards them.
	pub fn reposition_buffered(
		&self,
		stream: &mut BufferedSource<FileHandleSource>,
		offset: u64,
	) -> Result {
		self.check_same_handle(&stream.get_ref().handle);
		self.check_open()?;

		let buffered = stream.buf().len() as u64;
		let cursor = stream.get_ref().position;
		let window = (cursor - buffered)..cursor;
		if window.contains(&offset) {
			stream.buf_mut().skip((offset - window.start) as usize);
		} else {
			stream.buf_mut().clear();
			stream.get_mut().position = offset;
		}
		Ok(())
	}

	fn check_same_handle(&self, other: &FileHandle) {
		assert!(
			Arc::ptr_eq(&self.inner, &other.inner),
			"stream does not belong to this file handle",
		);
	}

	fn release_stream(&self) {
		let release = {
			let mut state = self.inner.state.lock();
			state.open_streams -= 1;
			state.closed && state.open_streams == 0
		};
		if release {
			let _ = self.inner.raw.close();
		}
	}
}

/// A [`Source`] advancing a cursor over a [`FileHandle`].
pub struct FileHandleSource {
	handle: FileHandle,
	position: u64,
	closed: bool,
}

impl FileHandleSource {
	/// Returns the handle this stream reads through.
	pub fn handle(&self) -> &FileHandle {
		&self.handle
	}
}

impl Source for FileHandleSource {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::Closed);
		}
		if byte_count == 0 {
			return Ok(0);
		}
		let position = self.position;
		let raw = &self.handle.inner.raw;
		let n = sink.write_with(1, |spare| {
			let len = min(spare.len(), byte_count);
			raw.read_at(position, &mut spare[..len])
		})?;
		self.position += n as u64;
		Ok(n)
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.handle.release_stream();
		Ok(())
	}
}

impl Drop for FileHandleSource {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// A [`Sink`] advancing a cursor over a [`FileHandle`].
pub struct FileHandleSink {
	handle: FileHandle,
	position: u64,
	closed: bool,
}

impl FileHandleSink {
	/// Returns the handle this stream writes through.
	pub fn handle(&self) -> &FileHandle {
		&self.handle
	}

	/// Returns the offset the next write lands at.
	pub fn position(&self) -> u64 {
		self.position
	}
}

impl Sink for FileHandleSink {
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
			let raw = &self.handle.inner.raw;
			let mut write_position = self.position;
			let mut failure = None;
			let n = source.read_segments(remaining, |data| {
				match raw.write_at(write_position, data) {
					Ok(()) => {
						write_position += data.len() as u64;
						data.len()
					}
					Err(error) => {
						failure = Some(error);
						0
					}
				}
			});
			if let Some(error) = failure {
				return Err(error);
			}
			self.position = write_position;
			remaining -= n;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::Closed);
		}
		self.handle.inner.raw.flush()
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.handle.release_stream();
		Ok(())
	}
}

impl Drop for FileHandleSink {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// Repositioning support for sinks: buffered bytes land at the old position
/// before the cursor moves.
impl FileHandle {
	/// Returns the offset `stream`'s next write lands at.
	pub fn sink_position(&self, stream: &FileHandleSink) -> Result<u64> {
		self.check_same_handle(&stream.handle);
		self.check_open()?;
		Ok(stream.position)
	}

	/// Flushes `stream`'s buffered bytes at the old position, then moves the
	/// cursor to `offset`.
	pub fn reposition_buffered_sink(
		&self,
		stream: &mut BufferedSink<FileHandleSink>,
		offset: u64,
	) -> Result {
		self.check_same_handle(&stream.get_ref().handle);
		self.check_open()?;
		stream.flush()?;
		stream.get_mut().position = offset;
		Ok(())
	}
}
