// SPDX-License-Identifier: Apache-2.0

//! The unbuffered stream contracts and the typed operations surfaced on
//! buffered streams.

use std::cmp::min;
use std::mem;
use crate::{Buffer, ByteString, Charset, Error, Options, Result, SEGMENT_SIZE, Timeout};
use crate::buffered_wrappers::{BufferedSink, BufferedSource};
use crate::options;

/// A stream of bytes that can be read into a [`Buffer`].
pub trait Source {
	/// Reads up to `byte_count` bytes, appending them to `sink`. Returns the
	/// number of bytes read; `Ok(0)` means the source is exhausted.
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize>;

	/// Returns the timeout governing this source's blocking operations.
	fn timeout(&self) -> &Timeout {
		Timeout::none_ref()
	}

	/// Closes the source, releasing its resources. Closing is idempotent;
	/// reads after close fail with [`Error::Closed`].
	fn close(&mut self) -> Result {
		Ok(())
	}
}

/// A stream of bytes that can be written from a [`Buffer`].
pub trait Sink {
	/// Removes exactly `byte_count` bytes from `source` and writes them.
	///
	/// # Panics
	///
	/// Panics if `source` holds fewer than `byte_count` bytes.
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result;

	/// Pushes buffered state down to the underlying storage.
	fn flush(&mut self) -> Result {
		Ok(())
	}

	/// Returns the timeout governing this sink's blocking operations.
	fn timeout(&self) -> &Timeout {
		Timeout::none_ref()
	}

	/// Flushes and closes the sink. Resources are released even when the
	/// flush fails, and the first failure is the one reported. Closing is
	/// idempotent; writes after close fail with [`Error::Closed`].
	fn close(&mut self) -> Result {
		self.flush()
	}
}

/// Wraps a source in a [`BufferedSource`].
pub trait SourceBuffer: Source + Sized {
	fn buffer(self) -> BufferedSource<Self> {
		BufferedSource::new(self)
	}
}

impl<S: Source> SourceBuffer for S {}

/// Wraps a sink in a [`BufferedSink`].
pub trait SinkBuffer: Sink + Sized {
	fn buffer(self) -> BufferedSink<Self> {
		BufferedSink::new(self)
	}
}

impl<S: Sink> SinkBuffer for S {}

/// A [`Source`] forwarding every operation to a delegate. Wrap one to
/// intercept just the operations a decorator cares about.
pub struct ForwardingSource<S: Source> {
	delegate: S,
}

impl<S: Source> ForwardingSource<S> {
	pub fn new(delegate: S) -> Self {
		Self { delegate }
	}

	pub fn delegate(&self) -> &S { &self.delegate }
	pub fn delegate_mut(&mut self) -> &mut S { &mut self.delegate }
	pub fn into_delegate(self) -> S { self.delegate }
}

impl<S: Source> Source for ForwardingSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		self.delegate.read(sink, byte_count)
	}

	fn timeout(&self) -> &Timeout {
		self.delegate.timeout()
	}

	fn close(&mut self) -> Result {
		self.delegate.close()
	}
}

/// A [`Sink`] forwarding every operation to a delegate.
pub struct ForwardingSink<S: Sink> {
	delegate: S,
}

impl<S: Sink> ForwardingSink<S> {
	pub fn new(delegate: S) -> Self {
		Self { delegate }
	}

	pub fn delegate(&self) -> &S { &self.delegate }
	pub fn delegate_mut(&mut self) -> &mut S { &mut self.delegate }
	pub fn into_delegate(self) -> S { self.delegate }
}

impl<S: Sink> Sink for ForwardingSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		self.delegate.write(source, byte_count)
	}

	fn flush(&mut self) -> Result {
		self.delegate.flush()
	}

	fn timeout(&self) -> &Timeout {
		self.delegate.timeout()
	}

	fn close(&mut self) -> Result {
		self.delegate.close()
	}
}

/// A stream holding an internal [`Buffer`].
pub trait BufStream {
	fn buf(&self) -> &Buffer;
	fn buf_mut(&mut self) -> &mut Buffer;
}

macro_rules! gen_int_reads {
	($($name:ident $le_name:ident -> $ty:ident,)+) => {
		$(
		#[doc = concat!("Reads one big-endian [`", stringify!($ty), "`].")]
		fn $name(&mut self) -> Result<$ty> {
			self.require(mem::size_of::<$ty>())?;
			self.buf_mut().$name()
		}

		#[doc = concat!("Reads one little-endian [`", stringify!($ty), "`].")]
		fn $le_name(&mut self) -> Result<$ty> {
			self.require(mem::size_of::<$ty>())?;
			self.buf_mut().$le_name()
		}
		)+
	};
}

/// The typed read operations, surfaced on any buffered stream.
///
/// Every default implementation buffers the operation's minimum byte count
/// with [`require`](Self::require) and then decodes straight from segment
/// memory.
pub trait BufSource: BufStream + Source {
	/// Reads until the buffer holds at least `byte_count` bytes, returning
	/// whether it does. `Ok(false)` means the source was exhausted first.
	fn request(&mut self, byte_count: usize) -> Result<bool>;

	/// Reads until the buffer holds at least `byte_count` bytes, failing with
	/// [`Error::Eof`] if the source is exhausted first.
	fn require(&mut self, byte_count: usize) -> Result {
		if self.request(byte_count)? {
			Ok(())
		} else {
			Err(Error::Eof(None))
		}
	}

	/// Returns `true` when the buffer is empty and the source has no more
	/// bytes to offer.
	fn exhausted(&mut self) -> Result<bool> {
		Ok(!self.request(1)?)
	}

	/// Reads one byte.
	fn read_u8(&mut self) -> Result<u8> {
		self.require(1)?;
		self.buf_mut().read_u8()
	}

	/// Reads one signed byte.
	fn read_i8(&mut self) -> Result<i8> {
		self.require(1)?;
		self.buf_mut().read_i8()
	}

	gen_int_reads! {
		read_u16 read_u16_le -> u16,
		read_i16 read_i16_le -> i16,
		read_u32 read_u32_le -> u32,
		read_i32 read_i32_le -> i32,
		read_u64 read_u64_le -> u64,
		read_i64 read_i64_le -> i64,
	}

	/// Reads exactly `N` bytes into an array.
	fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		self.require(N)?;
		self.buf_mut().read_array()
	}

	/// Reads bytes into `dst`, returning the number read. Stops early only at
	/// the end of the source.
	fn read_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		let mut off = 0;
		while off < dst.len() && self.request(1)? {
			off += self.buf_mut().read_slice(&mut dst[off..]);
		}
		Ok(off)
	}

	/// Fills `dst` exactly, failing with [`Error::Eof`] if the source ends
	/// first.
	fn read_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		self.buf_mut().read_slice_exact(dst)
	}

	/// Reads exactly `byte_count` bytes into a vector.
	fn read_vec(&mut self, byte_count: usize) -> Result<Vec<u8>> {
		self.require(byte_count)?;
		self.buf_mut().read_vec(byte_count)
	}

	/// Reads exactly `byte_count` bytes into an immutable byte string.
	fn read_byte_string(&mut self, byte_count: usize) -> Result<ByteString> {
		self.require(byte_count)?;
		self.buf_mut().read_byte_string(byte_count)
	}

	/// Reads exactly `byte_count` bytes of UTF-8, substituting U+FFFD for
	/// malformed sequences.
	fn read_utf8(&mut self, byte_count: usize) -> Result<String> {
		self.require(byte_count)?;
		self.buf_mut().read_utf8(byte_count)
	}

	/// Reads the source to exhaustion as UTF-8.
	fn read_all_utf8(&mut self) -> Result<String> {
		while self.request(self.buf().len() + SEGMENT_SIZE)? {}
		Ok(self.buf_mut().read_all_utf8())
	}

	/// Reads one UTF-8 code point, buffering up to four bytes as needed. See
	/// [`Buffer::read_utf8_code_point`] for the malformed-sequence rules.
	fn read_utf8_code_point(&mut self) -> Result<char> {
		self.require(1)?;
		let b0 = self.buf().get(0).expect("require(1) buffered a byte");
		let byte_count = match b0 {
			_ if b0 & 0xe0 == 0xc0 => 2,
			_ if b0 & 0xf0 == 0xe0 => 3,
			_ if b0 & 0xf8 == 0xf0 => 4,
			_ => 1,
		};
		// Best effort: a truncated final sequence fails in the buffer.
		self.request(byte_count)?;
		self.buf_mut().read_utf8_code_point()
	}

	/// Reads a line up to `\n`, `\r\n`, or the end of the source, consuming
	/// the terminator but not returning it. Returns `None` when the source is
	/// exhausted.
	fn read_utf8_line(&mut self) -> Result<Option<String>> {
		let mut start = 0;
		loop {
			if self.buf().index_of(b'\n', start).is_some() {
				break;
			}
			start = self.buf().len();
			if !self.request(start + 1)? {
				break;
			}
		}
		self.buf_mut().read_utf8_line()
	}

	/// Reads a line up to `\n` or `\r\n`, requiring the terminator within
	/// `limit` bytes of content.
	fn read_utf8_line_strict(&mut self, limit: usize) -> Result<String> {
		let scan = limit.saturating_add(1);
		let mut start = 0;
		loop {
			let to = min(scan, self.buf().len());
			if self.buf().index_of_in(b'\n', start, to).is_some() {
				break;
			}
			start = self.buf().len();
			if start > scan || !self.request(start + 1)? {
				break;
			}
		}
		self.buf_mut().read_utf8_line_strict(limit)
	}

	/// Reads a signed decimal numeral, buffering until the numeral ends.
	fn read_decimal_i64(&mut self) -> Result<i64> {
		self.require(1)?;
		let mut pos = 0;
		while self.request(pos + 1)? {
			let b = self.buf().get(pos).expect("request buffered the byte");
			let is_numeral = b.is_ascii_digit() || (pos == 0 && b == b'-');
			if !is_numeral {
				break;
			}
			pos += 1;
		}
		self.buf_mut().read_decimal_i64()
	}

	/// Reads an unsigned hexadecimal numeral, buffering until it ends.
	fn read_hex_u64(&mut self) -> Result<u64> {
		self.require(1)?;
		let mut pos = 0;
		while self.request(pos + 1)? {
			let b = self.buf().get(pos).expect("request buffered the byte");
			if !b.is_ascii_hexdigit() {
				break;
			}
			pos += 1;
		}
		self.buf_mut().read_hex_u64()
	}

	/// Reads exactly `byte_count` bytes decoded with `charset`.
	fn read_string(&mut self, byte_count: usize, charset: Charset) -> Result<String> {
		self.require(byte_count)?;
		self.buf_mut().read_string(byte_count, charset)
	}

	/// Consumes up to `byte_count` bytes, returning the number skipped.
	fn skip(&mut self, byte_count: usize) -> Result<usize> {
		let mut skipped = 0;
		while skipped < byte_count && self.request(1)? {
			skipped += self.buf_mut().skip(byte_count - skipped);
		}
		Ok(skipped)
	}

	/// Returns the index of the first occurrence of `byte` at or after
	/// `from`, reading more of the source as the scan advances.
	fn index_of(&mut self, byte: u8, from: usize) -> Result<Option<usize>> {
		let mut start = from;
		loop {
			if let Some(i) = self.buf().index_of(byte, start) {
				return Ok(Some(i));
			}
			start = self.buf().len();
			if !self.request(start + 1)? {
				return Ok(None);
			}
		}
	}

	/// Consumes the longest option that prefixes the source, returning its
	/// index, or `None` (consuming nothing) when no option matches.
	fn select(&mut self, options: &Options) -> Result<Option<usize>> {
		options::select(self, options)
	}

	/// Drains this source into `sink`, returning the number of bytes moved.
	fn read_all(&mut self, sink: &mut (impl Sink + ?Sized)) -> Result<usize> {
		let mut total = 0;
		while self.request(1)? {
			let n = self.buf().len();
			sink.write(self.buf_mut(), n)?;
			total += n;
		}
		Ok(total)
	}
}

macro_rules! gen_int_writes {
	($($name:ident $le_name:ident -> $ty:ident,)+) => {
		$(
		#[doc = concat!("Writes one big-endian [`", stringify!($ty), "`].")]
		fn $name(&mut self, value: $ty) -> Result {
			self.buf_mut().$name(value)?;
			self.emit_complete_segments()
		}

		#[doc = concat!("Writes one little-endian [`", stringify!($ty), "`].")]
		fn $le_name(&mut self, value: $ty) -> Result {
			self.buf_mut().$le_name(value)?;
			self.emit_complete_segments()
		}
		)+
	};
}

/// The typed write operations, surfaced on any buffered stream.
///
/// Each default implementation encodes into the internal buffer and then
/// [emits complete segments](Self::emit_complete_segments), bounding the
/// memory a long write sequence can hold.
pub trait BufSink: BufStream + Sink {
	/// Moves the buffer's full segments to the underlying sink, leaving any
	/// partial tail in place for later writes to fill.
	fn emit_complete_segments(&mut self) -> Result {
		Ok(())
	}

	/// Moves all buffered bytes to the underlying sink.
	fn emit(&mut self) -> Result {
		Ok(())
	}

	/// Writes one byte.
	fn write_u8(&mut self, value: u8) -> Result {
		self.buf_mut().write_u8(value)?;
		self.emit_complete_segments()
	}

	/// Writes one signed byte.
	fn write_i8(&mut self, value: i8) -> Result {
		self.buf_mut().write_i8(value)?;
		self.emit_complete_segments()
	}

	gen_int_writes! {
		write_u16 write_u16_le -> u16,
		write_i16 write_i16_le -> i16,
		write_u32 write_u32_le -> u32,
		write_i32 write_i32_le -> i32,
		write_u64 write_u64_le -> u64,
		write_i64 write_i64_le -> i64,
	}

	/// Writes all of `bytes`.
	fn write_slice(&mut self, bytes: &[u8]) -> Result {
		self.buf_mut().write_slice(bytes)?;
		self.emit_complete_segments()
	}

	/// Writes a string's UTF-8 bytes.
	fn write_utf8(&mut self, string: &str) -> Result {
		self.buf_mut().write_utf8(string)?;
		self.emit_complete_segments()
	}

	/// Writes one UTF-8 encoded code point.
	fn write_utf8_code_point(&mut self, code_point: char) -> Result {
		self.buf_mut().write_utf8_code_point(code_point)?;
		self.emit_complete_segments()
	}

	/// Writes a byte string.
	fn write_byte_string(&mut self, value: &ByteString) -> Result {
		self.buf_mut().write_byte_string(value)?;
		self.emit_complete_segments()
	}

	/// Writes a string encoded with `charset`.
	fn write_string(&mut self, string: &str, charset: Charset) -> Result {
		self.buf_mut().write_string(string, charset)?;
		self.emit_complete_segments()
	}

	/// Writes a signed decimal numeral.
	fn write_decimal_i64(&mut self, value: i64) -> Result {
		self.buf_mut().write_decimal_i64(value)?;
		self.emit_complete_segments()
	}

	/// Writes an unsigned hexadecimal numeral.
	fn write_hex_u64(&mut self, value: u64) -> Result {
		self.buf_mut().write_hex_u64(value)?;
		self.emit_complete_segments()
	}

	/// Writes exactly `byte_count` bytes read from `source`, failing with
	/// [`Error::Eof`] if it ends early.
	fn write_from(&mut self, source: &mut (impl Source + ?Sized), byte_count: usize) -> Result {
		let mut remaining = byte_count;
		while remaining > 0 {
			let n = source.read(self.buf_mut(), remaining)?;
			if n == 0 {
				return Err(Error::Eof(None));
			}
			remaining -= n;
			self.emit_complete_segments()?;
		}
		Ok(())
	}

	/// Drains `source` into this sink, returning the number of bytes moved.
	fn write_all(&mut self, source: &mut (impl Source + ?Sized)) -> Result<usize> {
		let mut total = 0;
		loop {
			let n = source.read(self.buf_mut(), SEGMENT_SIZE)?;
			if n == 0 {
				break;
			}
			total += n;
			self.emit_complete_segments()?;
		}
		Ok(total)
	}
}

impl Source for &[u8] {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let n = min(byte_count, self.len());
		sink.write_slice(&self[..n])?;
		*self = &self[n..];
		Ok(n)
	}
}

impl<S: Source + ?Sized> Source for Box<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		(**self).read(sink, byte_count)
	}

	fn timeout(&self) -> &Timeout {
		(**self).timeout()
	}

	fn close(&mut self) -> Result {
		(**self).close()
	}
}

impl<S: Sink + ?Sized> Sink for Box<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		(**self).write(source, byte_count)
	}

	fn flush(&mut self) -> Result {
		(**self).flush()
	}

	fn timeout(&self) -> &Timeout {
		(**self).timeout()
	}

	fn close(&mut self) -> Result {
		(**self).close()
	}
}
