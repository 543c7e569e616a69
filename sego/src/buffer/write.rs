// SPDX-License-Identifier: Apache-2.0

use arrayvec::ArrayVec;
use crate::{Buffer, ByteString, Charset, Result};
use crate::streams::Sink;

impl Buffer {
	/// Appends `bytes` to the writable tail.
	pub fn write_slice(&mut self, mut bytes: &[u8]) -> Result {
		while !bytes.is_empty() {
			let tail = self.writable_tail(1);
			let n = tail.push_slice(bytes);
			self.set_len(self.len() + n);
			bytes = &bytes[n..];
		}
		Ok(())
	}

	/// Appends a string's UTF-8 bytes.
	pub fn write_utf8(&mut self, string: &str) -> Result {
		self.write_slice(string.as_bytes())
	}

	/// Appends one code point, UTF-8 encoded in one to four bytes.
	pub fn write_utf8_code_point(&mut self, code_point: char) -> Result {
		let mut bytes = [0; 4];
		self.write_slice(code_point.encode_utf8(&mut bytes).as_bytes())
	}

	/// Appends a byte string. Segmented byte strings transfer their aliased
	/// blocks without copying.
	pub fn write_byte_string(&mut self, value: &ByteString) -> Result {
		value.push_into(self);
		Ok(())
	}

	/// Appends a string encoded with `charset`. Characters the charset cannot
	/// represent are written as `?`.
	pub fn write_string(&mut self, string: &str, charset: Charset) -> Result {
		if charset == Charset::Utf8 {
			return self.write_utf8(string);
		}
		charset.encode_into(string, self)
	}

	/// Appends a signed decimal numeral.
	pub fn write_decimal_i64(&mut self, value: i64) -> Result {
		if value == 0 {
			return self.write_u8(b'0');
		}
		let mut digits = ArrayVec::<u8, 20>::new();
		let mut magnitude = value.unsigned_abs();
		while magnitude > 0 {
			digits.push(b'0' + (magnitude % 10) as u8);
			magnitude /= 10;
		}
		if value < 0 {
			digits.push(b'-');
		}
		digits.reverse();
		self.write_slice(&digits)
	}

	/// Appends an unsigned hexadecimal numeral without leading zeros.
	pub fn write_hex_u64(&mut self, value: u64) -> Result {
		if value == 0 {
			return self.write_u8(b'0');
		}
		let width = (67 - value.leading_zeros() as usize) / 4;
		let mut digits = ArrayVec::<u8, 16>::new();
		for i in (0..width).rev() {
			let nibble = (value >> (i * 4) & 0xf) as usize;
			digits.push(b"0123456789abcdef"[nibble]);
		}
		self.write_slice(&digits)
	}

	/// Appends one byte.
	pub fn write_u8(&mut self, value: u8) -> Result {
		self.write_slice(&[value])
	}

	/// Appends one signed byte.
	pub fn write_i8(&mut self, value: i8) -> Result {
		self.write_u8(value as u8)
	}
}

macro_rules! gen_int_writes {
	($($name:ident $le_name:ident -> $ty:ident,)+) => {
		impl Buffer {
			$(
			#[doc = concat!("Appends one big-endian [`", stringify!($ty), "`].")]
			pub fn $name(&mut self, value: $ty) -> Result {
				self.write_slice(&value.to_be_bytes())
			}

			#[doc = concat!("Appends one little-endian [`", stringify!($ty), "`].")]
			pub fn $le_name(&mut self, value: $ty) -> Result {
				self.write_slice(&value.to_le_bytes())
			}
			)+
		}
	};
}

gen_int_writes! {
	write_u16 write_u16_le -> u16,
	write_i16 write_i16_le -> i16,
	write_u32 write_u32_le -> u32,
	write_i32 write_i32_le -> i32,
	write_u64 write_u64_le -> u64,
	write_i64 write_i64_le -> i64,
}

impl Sink for Buffer {
	/// Moves exactly `byte_count` bytes from `source`.
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		self.transfer_from(source, byte_count);
		Ok(())
	}

	fn close(&mut self) -> Result {
		self.clear();
		Ok(())
	}
}
