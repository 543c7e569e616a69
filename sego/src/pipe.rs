// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::io;
use std::sync::Arc;
use parking_lot::{Condvar, Mutex};
use crate::{Buffer, Error, Result, Timeout};
use crate::streams::{Sink, Source};

/// An in-memory stream connecting one writer to one reader through a bounded
/// [`Buffer`].
///
/// The sink blocks while the buffer holds `max_buffer_size` bytes or more;
/// the source blocks while it is empty. Each half respects its own
/// [`Timeout`]. Bytes arrive in write order.
pub struct Pipe {
	shared: Arc<Shared>,
}

struct Shared {
	max_buffer_size: usize,
	state: Mutex<State>,
	condvar: Condvar,
}

struct State {
	buffer: Buffer,
	sink_closed: bool,
	source_closed: bool,
	folded: Option<Box<dyn Sink + Send>>,
}

impl Pipe {
	/// Creates a pipe buffering at most `max_buffer_size` bytes.
	///
	/// # Panics
	///
	/// Panics when `max_buffer_size` is zero.
	pub fn new(max_buffer_size: usize) -> Self {
		assert!(max_buffer_size > 0, "max_buffer_size must be positive");
		Self {
			shared: Arc::new(Shared {
				max_buffer_size,
				state: Mutex::new(State {
					buffer: Buffer::new(),
					sink_closed: false,
					source_closed: false,
					folded: None,
				}),
				condvar: Condvar::new(),
			}),
		}
	}

	/// Returns the buffer capacity.
	pub fn max_buffer_size(&self) -> usize {
		self.shared.max_buffer_size
	}

	/// Returns the write half. The pipe has one logical writer; take this
	/// once.
	pub fn sink(&self) -> PipeSink {
		PipeSink {
			shared: Arc::clone(&self.shared),
			timeout: Timeout::new(),
			closed: false,
		}
	}

	/// Returns the read half. The pipe has one logical reader; take this
	/// once.
	pub fn source(&self) -> PipeSource {
		PipeSource {
			shared: Arc::clone(&self.shared),
			timeout: Timeout::new(),
			closed: false,
		}
	}

	/// Redirects the write half to `sink`: buffered bytes are drained into it
	/// atomically, subsequent writes are delivered to it directly, and the
	/// read half is invalidated. Closing the pipe's sink afterwards closes
	/// `sink`.
	///
	/// # Panics
	///
	/// Panics when the pipe is already folded.
	pub fn fold(&self, mut sink: impl Sink + Send + 'static) -> Result {
		let mut state = self.shared.state.lock();
		assert!(state.folded.is_none(), "pipe is already folded");
		if state.sink_closed {
			return Err(Error::Closed);
		}
		if state.source_closed {
			return Err(source_closed_error());
		}

		while !state.buffer.is_empty() {
			let n = state.buffer.len();
			sink.write(&mut state.buffer, n)?;
		}
		state.source_closed = true;
		state.folded = Some(Box::new(sink));
		tracing::debug!("pipe folded onto its underlying sink");
		self.shared.condvar.notify_all();
		Ok(())
	}
}

fn source_closed_error() -> Error {
	Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe source is closed"))
}

/// The write half of a [`Pipe`].
pub struct PipeSink {
	shared: Arc<Shared>,
	timeout: Timeout,
	closed: bool,
}

impl PipeSink {
	/// Returns the timeout bounding blocked writes, mutably.
	pub fn timeout_mut(&mut self) -> &mut Timeout {
		&mut self.timeout
	}
}

impl Sink for PipeSink {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		assert!(
			byte_count <= source.len(),
			"byte_count ({byte_count}) exceeds source size ({})", source.len(),
		);
		let mut remaining = byte_count;
		let mut state = self.shared.state.lock();
		while remaining > 0 {
			if self.closed || state.sink_closed {
				return Err(Error::Closed);
			}
			if let Some(folded) = state.folded.as_mut() {
				// The fold invalidated the blocking path; the delegate
				// enforces its own timeout, this half contributes its
				// deadline.
				self.timeout.check_expired()?;
				return folded.write(source, remaining);
			}
			if state.source_closed {
				return Err(source_closed_error());
			}

			let available = self.shared.max_buffer_size - state.buffer.len();
			if available == 0 {
				self.timeout.wait_until_notified(&self.shared.condvar, &mut state)?;
				continue;
			}

			let n = min(available, remaining);
			state.buffer.write(source, n)?;
			remaining -= n;
			self.shared.condvar.notify_all();
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		let mut state = self.shared.state.lock();
		if self.closed || state.sink_closed {
			return Err(Error::Closed);
		}
		if let Some(folded) = state.folded.as_mut() {
			return folded.flush();
		}
		if state.source_closed && !state.buffer.is_empty() {
			return Err(source_closed_error());
		}
		Ok(())
	}

	fn timeout(&self) -> &Timeout {
		&self.timeout
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;

		let mut state = self.shared.state.lock();
		if let Some(mut folded) = state.folded.take() {
			drop(state);
			return folded.close();
		}
		state.sink_closed = true;
		self.shared.condvar.notify_all();
		Ok(())
	}
}

impl Drop for PipeSink {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// The read half of a [`Pipe`].
pub struct PipeSource {
	shared: Arc<Shared>,
	timeout: Timeout,
	closed: bool,
}

impl PipeSource {
	/// Returns the timeout bounding blocked reads, mutably.
	pub fn timeout_mut(&mut self) -> &mut Timeout {
		&mut self.timeout
	}
}

impl Source for PipeSource {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut state = self.shared.state.lock();
		loop {
			if self.closed || state.source_closed {
				return Err(Error::Closed);
			}
			if !state.buffer.is_empty() {
				let n = Source::read(&mut state.buffer, sink, byte_count)?;
				self.shared.condvar.notify_all();
				return Ok(n);
			}
			if state.sink_closed {
				return Ok(0);
			}
			self.timeout.wait_until_notified(&self.shared.condvar, &mut state)?;
		}
	}

	fn timeout(&self) -> &Timeout {
		&self.timeout
	}

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;

		let mut state = self.shared.state.lock();
		state.source_closed = true;
		state.buffer.clear();
		self.shared.condvar.notify_all();
		Ok(())
	}
}

impl Drop for PipeSource {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
