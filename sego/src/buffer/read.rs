// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use crate::{Buffer, ByteString, Charset, Error, Result};
use crate::pool::pool;
use crate::segment::Segment;
use crate::streams::{BufSink, BufSource, BufStream, Sink, Source};

const REPLACEMENT: char = '\u{fffd}';
const LINE_PREVIEW: usize = 32;

impl Buffer {
	/// Fails with [`Error::Eof`] unless at least `byte_count` bytes are
	/// readable.
	pub fn require(&self, byte_count: usize) -> Result {
		if self.len() < byte_count {
			Err(Error::Eof(None))
		} else {
			Ok(())
		}
	}

	/// Reads exactly `N` bytes into an array.
	pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		self.require(N)?;
		let mut array = [0; N];
		self.read_slice_exact(&mut array)?;
		Ok(array)
	}

	/// Reads bytes into `dst`, returning the number read.
	pub fn read_slice(&mut self, dst: &mut [u8]) -> usize {
		let mut off = 0;
		self.read_segments(dst.len(), |data| {
			dst[off..off + data.len()].copy_from_slice(data);
			off += data.len();
			data.len()
		})
	}

	/// Fills `dst` exactly, failing with [`Error::Eof`] and consuming nothing
	/// if not enough bytes are buffered.
	pub fn read_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		let n = self.read_slice(dst);
		debug_assert_eq!(n, dst.len(), "require should have guaranteed a full read");
		Ok(())
	}

	/// Reads exactly `byte_count` bytes into a vector.
	pub fn read_vec(&mut self, byte_count: usize) -> Result<Vec<u8>> {
		self.require(byte_count)?;
		let mut vec = vec![0; byte_count];
		self.read_slice_exact(&mut vec)?;
		Ok(vec)
	}

	/// Reads exactly `byte_count` bytes into an immutable byte string.
	pub fn read_byte_string(&mut self, byte_count: usize) -> Result<ByteString> {
		Ok(ByteString::from(self.read_vec(byte_count)?))
	}

	/// Reads one byte.
	pub fn read_u8(&mut self) -> Result<u8> {
		self.require(1)?;
		let mut byte = 0;
		self.read_segments(1, |data| {
			byte = data[0];
			1
		});
		Ok(byte)
	}

	/// Reads one signed byte.
	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|n| n as i8)
	}

	/// Reads exactly `byte_count` bytes of UTF-8, substituting U+FFFD for
	/// malformed sequences.
	pub fn read_utf8(&mut self, byte_count: usize) -> Result<String> {
		let bytes = self.read_vec(byte_count)?;
		Ok(match simdutf8::basic::from_utf8(&bytes) {
			Ok(valid) => valid.to_owned(),
			Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
		})
	}

	/// Drains the buffer as UTF-8, substituting U+FFFD for malformed
	/// sequences.
	pub fn read_all_utf8(&mut self) -> String {
		let len = self.len();
		self.read_utf8(len).expect("reading the full buffer cannot hit end of stream")
	}

	/// Reads one UTF-8 code point of one to four bytes.
	///
	/// Returns U+FFFD for overlong encodings, surrogate code points, values
	/// beyond U+10FFFF, and spurious leading continuation bytes (consuming
	/// exactly one byte). A truncated sequence at the end of the buffer fails
	/// with [`Error::Eof`]; a sequence whose continuation bytes stop early
	/// consumes only the bytes scanned so far, leaving the next character
	/// intact.
	pub fn read_utf8_code_point(&mut self) -> Result<char> {
		self.require(1)?;
		let b0 = self.get(0).expect("require(1) guarantees a byte");

		let (mut code_point, byte_count, min_code_point) = match b0 {
			_ if b0 & 0x80 == 0x00 => (b0 as u32, 1, 0x00),
			_ if b0 & 0xe0 == 0xc0 => ((b0 & 0x1f) as u32, 2, 0x80),
			_ if b0 & 0xf0 == 0xe0 => ((b0 & 0x0f) as u32, 3, 0x800),
			_ if b0 & 0xf8 == 0xf0 => ((b0 & 0x07) as u32, 4, 0x10000),
			_ => {
				// A lone continuation or invalid lead byte.
				self.skip(1);
				return Ok(REPLACEMENT);
			}
		};
		self.require(byte_count)?;

		for i in 1..byte_count {
			let b = self.get(i).expect("require guarantees the sequence length");
			if b & 0xc0 != 0x80 {
				// Missing continuation: consume the scanned prefix only.
				self.skip(i);
				return Ok(REPLACEMENT);
			}
			code_point = code_point << 6 | (b & 0x3f) as u32;
		}
		self.skip(byte_count);

		if code_point > 0x10ffff
			|| (0xd800..=0xdfff).contains(&code_point)
			|| code_point < min_code_point
		{
			return Ok(REPLACEMENT);
		}
		Ok(char::from_u32(code_point).expect("range-checked code point"))
	}

	/// Reads a line up to `\n`, `\r\n`, or the end of the buffer, consuming
	/// the terminator but not returning it. Returns `None` when the buffer is
	/// empty.
	pub fn read_utf8_line(&mut self) -> Result<Option<String>> {
		if self.is_empty() {
			return Ok(None);
		}
		match Buffer::index_of(self, b'\n', 0) {
			Some(newline) => self.read_line_at(newline).map(Some),
			None => {
				let len = self.len();
				self.read_utf8(len).map(Some)
			}
		}
	}

	/// Reads a line up to `\n` or `\r\n`, requiring the terminator within
	/// `limit` bytes of content. Fails with [`Error::Eof`] carrying a
	/// hex-encoded preview of the unterminated bytes otherwise.
	pub fn read_utf8_line_strict(&mut self, limit: usize) -> Result<String> {
		let scan = limit.saturating_add(1);
		if let Some(newline) = self.index_of_in(b'\n', 0, min(scan, self.len())) {
			return self.read_line_at(newline);
		}
		// A CRLF straddling the scan boundary still fits the limit.
		if scan < self.len()
			&& self.get(scan - 1) == Some(b'\r')
			&& self.get(scan) == Some(b'\n')
		{
			return self.read_line_at(scan);
		}

		let mut preview = String::new();
		for byte in self.peek_bytes(min(LINE_PREVIEW, self.len())) {
			preview.push_str(&format!("{byte:02x}"));
		}
		Err(Error::Eof(Some(format!(
			"\\n not found: limit={} content={preview}…",
			min(self.len(), limit),
		))))
	}

	fn read_line_at(&mut self, newline: usize) -> Result<String> {
		if newline > 0 && self.get(newline - 1) == Some(b'\r') {
			let line = self.read_utf8(newline - 1)?;
			self.skip(2);
			Ok(line)
		} else {
			let line = self.read_utf8(newline)?;
			self.skip(1);
			Ok(line)
		}
	}

	/// Reads a signed decimal numeral: an optional `-` followed by at least
	/// one digit. Stops at the first non-digit without consuming it. Values
	/// outside `i64` fail with [`Error::NumberFormat`] naming the literal;
	/// leading whitespace is not skipped.
	pub fn read_decimal_i64(&mut self) -> Result<i64> {
		self.require(1)?;
		let negative = self.get(0) == Some(b'-');
		let mut pos = usize::from(negative);
		// Accumulate negated so i64::MIN parses without overflow.
		let mut value = 0i64;
		let mut digits = 0;

		while let Some(b @ b'0'..=b'9') = self.get(pos) {
			let digit = (b - b'0') as i64;
			value = value
				.checked_mul(10)
				.and_then(|v| v.checked_sub(digit))
				.ok_or_else(|| Error::NumberFormat(
					format!("number too large: {}", self.peek_utf8(pos + 1)),
				))?;
			digits += 1;
			pos += 1;
		}

		if digits == 0 {
			return match self.get(pos) {
				Some(b) => Err(Error::NumberFormat(format!(
					"expected a digit{} but was 0x{b:02x}",
					if negative { "" } else { " or '-'" },
				))),
				None => Err(Error::Eof(None)),
			};
		}

		self.skip(pos);
		if negative {
			Ok(value)
		} else {
			value.checked_neg().ok_or_else(|| Error::NumberFormat(
				format!("number too large: {}", self.peek_utf8(pos)),
			))
		}
	}

	/// Reads an unsigned hexadecimal numeral of one to sixteen significant
	/// digits, case-insensitive. Stops at the first non-digit without
	/// consuming it.
	pub fn read_hex_u64(&mut self) -> Result<u64> {
		self.require(1)?;
		let mut pos = 0;
		let mut value = 0u64;

		while let Some(b) = self.get(pos) {
			let digit = match b {
				b'0'..=b'9' => (b - b'0') as u64,
				b'a'..=b'f' => (b - b'a' + 10) as u64,
				b'A'..=b'F' => (b - b'A' + 10) as u64,
				_ => break,
			};
			if value & 0xf000_0000_0000_0000 != 0 {
				return Err(Error::NumberFormat(
					format!("number too large: {}", self.peek_utf8(pos + 1)),
				));
			}
			value = value << 4 | digit;
			pos += 1;
		}

		if pos == 0 {
			let b = self.get(0).expect("require(1) guarantees a byte");
			return Err(Error::NumberFormat(
				format!("expected leading hex digit but was 0x{b:02x}"),
			));
		}
		self.skip(pos);
		Ok(value)
	}

	/// Reads exactly `byte_count` bytes decoded with `charset`, substituting
	/// U+FFFD for malformed code units.
	pub fn read_string(&mut self, byte_count: usize, charset: Charset) -> Result<String> {
		if charset == Charset::Utf8 {
			return self.read_utf8(byte_count);
		}
		let bytes = self.read_vec(byte_count)?;
		Ok(charset.decode(&bytes))
	}

	/// Drains this buffer into `sink`, one write per segment. Returns the
	/// number of bytes moved.
	pub fn read_all(&mut self, sink: &mut (impl Sink + ?Sized)) -> Result<usize> {
		let mut total = 0;
		loop {
			let Some(head) = self.segments().front() else { break };
			let head_len = head.len();
			if head_len == 0 {
				let seg = self.segments_mut().pop_front().unwrap();
				pool().recycle(seg);
				continue;
			}
			sink.write(self, head_len)?;
			total += head_len;
		}
		Ok(total)
	}

	/// Copies the first `count` bytes without consuming them.
	pub(crate) fn peek_bytes(&self, count: usize) -> Vec<u8> {
		debug_assert!(count <= self.len());
		self.segments()
			.iter()
			.flat_map(Segment::data)
			.take(count)
			.copied()
			.collect()
	}

	fn peek_utf8(&self, count: usize) -> String {
		String::from_utf8_lossy(&self.peek_bytes(count)).into_owned()
	}
}

macro_rules! gen_int_reads {
	($($name:ident $le_name:ident -> $ty:ident,)+) => {
		impl Buffer {
			$(
			#[doc = concat!("Reads one big-endian [`", stringify!($ty), "`].")]
			pub fn $name(&mut self) -> Result<$ty> {
				Ok($ty::from_be_bytes(self.read_array()?))
			}

			#[doc = concat!("Reads one little-endian [`", stringify!($ty), "`].")]
			pub fn $le_name(&mut self) -> Result<$ty> {
				Ok($ty::from_le_bytes(self.read_array()?))
			}
			)+
		}
	};
}

gen_int_reads! {
	read_u16 read_u16_le -> u16,
	read_i16 read_i16_le -> i16,
	read_u32 read_u32_le -> u32,
	read_i32 read_i32_le -> i32,
	read_u64 read_u64_le -> u64,
	read_i64 read_i64_le -> i64,
}

impl Source for Buffer {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let n = min(byte_count, self.len());
		sink.transfer_from(self, n);
		Ok(n)
	}

	fn close(&mut self) -> Result {
		self.clear();
		Ok(())
	}
}

impl BufStream for Buffer {
	fn buf(&self) -> &Buffer { self }
	fn buf_mut(&mut self) -> &mut Buffer { self }
}

impl BufSource for Buffer {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		Ok(self.len() >= byte_count)
	}
}

impl BufSink for Buffer {}
