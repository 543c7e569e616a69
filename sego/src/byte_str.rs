// SPDX-License-Identifier: Apache-2.0

mod segmented;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use base64::Engine;
use base64::prelude::{BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD};
use once_cell::sync::OnceCell;
use crate::{Buffer, Error, Result};
use segmented::Segmented;

/// An immutable sequence of bytes.
///
/// A byte string is either *flat*, owning one contiguous allocation, or
/// *segmented*, aliasing the blocks of the [`Buffer`] it was snapshotted from.
/// The two forms are indistinguishable through this API: equality, ordering,
/// hashing and every codec operate on the logical bytes.
///
/// Hex and UTF-8 renderings are computed once and cached.
#[derive(Clone, Default)]
pub struct ByteString {
	repr: Repr,
	hex: OnceCell<String>,
	utf8: OnceCell<String>,
}

#[derive(Clone)]
enum Repr {
	Flat(Arc<[u8]>),
	Segmented(Segmented),
}

impl Default for Repr {
	fn default() -> Self {
		Self::Flat(Arc::from([]))
	}
}

impl ByteString {
	/// Returns an empty byte string.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Creates a byte string of `str`'s UTF-8 bytes.
	pub fn from_utf8(str: &str) -> Self {
		str.as_bytes().into()
	}

	/// Decodes a hex string, upper or lower case.
	pub fn from_hex(hex: &str) -> Result<Self> {
		base16ct::mixed::decode_vec(hex)
			.map(Self::from)
			.map_err(|err| Error::NumberFormat(format!("invalid hex {hex:?}: {err}")))
	}

	/// Decodes an unpadded base64 string, standard or URL-safe alphabet.
	pub fn from_base64(base64: &str) -> Result<Self> {
		BASE64_STANDARD_NO_PAD.decode(base64)
			.or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(base64))
			.map(Self::from)
			.map_err(|err| Error::NumberFormat(format!("invalid base64 {base64:?}: {err}")))
	}

	/// Returns the length in bytes.
	pub fn len(&self) -> usize {
		match &self.repr {
			Repr::Flat(data) => data.len(),
			Repr::Segmented(data) => data.len(),
		}
	}

	/// Returns `true` if the byte string is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the byte at `index`, or `None` out of bounds.
	pub fn get(&self, index: usize) -> Option<u8> {
		if index >= self.len() {
			return None;
		}
		Some(match &self.repr {
			Repr::Flat(data) => data[index],
			Repr::Segmented(data) => data.get(index),
		})
	}

	/// Encodes the bytes as a lowercase hex string, caching the rendering.
	pub fn hex(&self) -> &str {
		self.hex.get_or_init(|| match &self.repr {
			Repr::Flat(data) => base16ct::lower::encode_string(data),
			Repr::Segmented(_) => base16ct::lower::encode_string(&self.to_vec()),
		})
	}

	/// Decodes the bytes as UTF-8, substituting U+FFFD for malformed
	/// sequences, and caches the rendering.
	pub fn utf8(&self) -> &str {
		self.utf8.get_or_init(|| {
			let flat;
			let bytes = match &self.repr {
				Repr::Flat(data) => &data[..],
				Repr::Segmented(_) => {
					flat = self.to_vec();
					&flat
				}
			};
			match simdutf8::basic::from_utf8(bytes) {
				Ok(valid) => valid.to_owned(),
				Err(_) => String::from_utf8_lossy(bytes).into_owned(),
			}
		})
	}

	/// Encodes the bytes as unpadded base64.
	pub fn base64(&self) -> String {
		match &self.repr {
			Repr::Flat(data) => BASE64_STANDARD_NO_PAD.encode(data),
			Repr::Segmented(_) => BASE64_STANDARD_NO_PAD.encode(self.to_vec()),
		}
	}

	/// Encodes the bytes as unpadded URL-safe base64.
	pub fn base64_url(&self) -> String {
		match &self.repr {
			Repr::Flat(data) => BASE64_URL_SAFE_NO_PAD.encode(data),
			Repr::Segmented(_) => BASE64_URL_SAFE_NO_PAD.encode(self.to_vec()),
		}
	}

	/// Copies the bytes into a vector.
	pub fn to_vec(&self) -> Vec<u8> {
		let mut vec = Vec::with_capacity(self.len());
		for chunk in self.chunks() {
			vec.extend_from_slice(chunk);
		}
		vec
	}

	/// Returns the bytes as one contiguous slice, or `None` for a segmented
	/// byte string spanning more than one block.
	pub fn as_flat_slice(&self) -> Option<&[u8]> {
		match &self.repr {
			Repr::Flat(data) => Some(data),
			Repr::Segmented(data) => data.as_single_chunk(),
		}
	}

	/// Copies `[start, end)` into a new byte string.
	///
	/// # Panics
	///
	/// Panics when the range is out of bounds.
	pub fn substring(&self, start: usize, end: usize) -> Self {
		assert!(
			start <= end && end <= self.len(),
			"substring [{start}, {end}) out of bounds for {} bytes", self.len(),
		);
		let mut vec = Vec::with_capacity(end - start);
		let mut offset = 0;
		for chunk in self.chunks() {
			let chunk_end = offset + chunk.len();
			if chunk_end > start && offset < end {
				let from = start.saturating_sub(offset);
				let to = chunk.len().min(end - offset);
				vec.extend_from_slice(&chunk[from..to]);
			}
			offset = chunk_end;
		}
		vec.into()
	}

	/// Returns `true` if the byte string starts with `prefix`.
	pub fn starts_with(&self, prefix: &[u8]) -> bool {
		self.range_equals(0, prefix)
	}

	/// Returns `true` if the byte string ends with `suffix`.
	pub fn ends_with(&self, suffix: &[u8]) -> bool {
		self.len() >= suffix.len() && self.range_equals(self.len() - suffix.len(), suffix)
	}

	/// Returns `true` if the bytes at `offset` equal `bytes`. Out-of-range
	/// offsets compare unequal rather than panicking.
	pub fn range_equals(&self, offset: usize, bytes: &[u8]) -> bool {
		let Some(end) = offset.checked_add(bytes.len()) else { return false };
		if end > self.len() {
			return false;
		}
		self.bytes()
			.skip(offset)
			.take(bytes.len())
			.eq(bytes.iter().copied())
	}

	/// Returns the index of the first occurrence of `byte` at or after
	/// `from`.
	pub fn index_of(&self, byte: u8, from: usize) -> Option<usize> {
		let mut offset = 0;
		for chunk in self.chunks() {
			let end = offset + chunk.len();
			if end > from {
				let start = from.saturating_sub(offset);
				if let Some(i) = memchr::memchr(byte, &chunk[start..]) {
					return Some(offset + start + i);
				}
			}
			offset = end;
		}
		None
	}

	/// Builds a segmented byte string aliasing the blocks of live segments.
	/// Cloning the blocks' handles marks every source segment shared, so the
	/// buffer copies rather than overwrites on its next write.
	pub(crate) fn from_shared_segments<'s>(
		segments: impl Iterator<Item = &'s crate::segment::Segment>,
		len: usize,
	) -> Self {
		if len == 0 {
			return Self::empty();
		}
		Segmented::collect(segments, len).into()
	}

	/// Appends the bytes to `buf`. A segmented byte string transfers aliased
	/// blocks instead of copying.
	pub(crate) fn push_into(&self, buf: &mut Buffer) {
		match &self.repr {
			Repr::Flat(data) => {
				let _ = buf.write_slice(data);
			}
			Repr::Segmented(data) => data.push_into(buf),
		}
	}

	pub(crate) fn chunks(&self) -> Chunks<'_> {
		match &self.repr {
			Repr::Flat(data) => Chunks::Flat(Some(data)),
			Repr::Segmented(data) => Chunks::Segmented(data, 0),
		}
	}

	fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
		self.chunks().flatten().copied()
	}
}

pub(crate) enum Chunks<'b> {
	Flat(Option<&'b [u8]>),
	Segmented(&'b Segmented, usize),
}

impl<'b> Iterator for Chunks<'b> {
	type Item = &'b [u8];

	fn next(&mut self) -> Option<&'b [u8]> {
		match self {
			Self::Flat(chunk) => chunk.take().filter(|c| !c.is_empty()),
			Self::Segmented(data, index) => {
				let chunk = data.chunk(*index)?;
				*index += 1;
				Some(chunk)
			}
		}
	}
}

impl From<Vec<u8>> for ByteString {
	fn from(value: Vec<u8>) -> Self {
		Self {
			repr: Repr::Flat(value.into()),
			hex: OnceCell::new(),
			utf8: OnceCell::new(),
		}
	}
}

impl From<&[u8]> for ByteString {
	fn from(value: &[u8]) -> Self {
		value.to_vec().into()
	}
}

impl<const N: usize> From<[u8; N]> for ByteString {
	fn from(value: [u8; N]) -> Self {
		value.to_vec().into()
	}
}

impl From<&str> for ByteString {
	fn from(value: &str) -> Self {
		Self::from_utf8(value)
	}
}

impl From<Segmented> for ByteString {
	fn from(value: Segmented) -> Self {
		Self {
			repr: Repr::Segmented(value),
			hex: OnceCell::new(),
			utf8: OnceCell::new(),
		}
	}
}

impl PartialEq for ByteString {
	fn eq(&self, other: &Self) -> bool {
		self.len() == other.len() && self.bytes().eq(other.bytes())
	}
}

impl Eq for ByteString {}

impl PartialEq<[u8]> for ByteString {
	fn eq(&self, other: &[u8]) -> bool {
		self.len() == other.len() && self.bytes().eq(other.iter().copied())
	}
}

impl<const N: usize> PartialEq<[u8; N]> for ByteString {
	fn eq(&self, other: &[u8; N]) -> bool {
		self == other.as_slice()
	}
}

impl PartialEq<str> for ByteString {
	fn eq(&self, other: &str) -> bool {
		self == other.as_bytes()
	}
}

impl PartialOrd for ByteString {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for ByteString {
	fn cmp(&self, other: &Self) -> Ordering {
		self.bytes().cmp(other.bytes())
	}
}

impl Hash for ByteString {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for byte in self.bytes() {
			state.write_u8(byte);
		}
	}
}

impl fmt::Debug for ByteString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ByteString[size={} hex={}]", self.len(), self.hex())
	}
}
