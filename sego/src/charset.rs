// SPDX-License-Identifier: Apache-2.0

use crate::{Buffer, Result};

const REPLACEMENT: char = '\u{fffd}';

/// The character encodings [`Buffer::write_string`] and
/// [`Buffer::read_string`] support. Other encodings are out of scope;
/// delegate to a dedicated transcoder before writing.
///
/// Decoding substitutes U+FFFD for malformed code units; encoding writes `?`
/// for characters the target charset cannot represent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Charset {
	Utf8,
	Utf16Be,
	Utf16Le,
	Utf32Be,
	Utf32Le,
	Ascii,
}

impl Charset {
	pub(crate) fn encode_into(self, string: &str, buf: &mut Buffer) -> Result {
		match self {
			Self::Utf8 => buf.write_utf8(string)?,
			Self::Utf16Be => {
				for unit in string.encode_utf16() {
					buf.write_u16(unit)?;
				}
			}
			Self::Utf16Le => {
				for unit in string.encode_utf16() {
					buf.write_u16_le(unit)?;
				}
			}
			Self::Utf32Be => {
				for c in string.chars() {
					buf.write_u32(c as u32)?;
				}
			}
			Self::Utf32Le => {
				for c in string.chars() {
					buf.write_u32_le(c as u32)?;
				}
			}
			Self::Ascii => {
				for c in string.chars() {
					buf.write_u8(if c.is_ascii() { c as u8 } else { b'?' })?;
				}
			}
		}
		Ok(())
	}

	pub(crate) fn decode(self, bytes: &[u8]) -> String {
		match self {
			Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
			Self::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
			Self::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
			Self::Utf32Be => decode_utf32(bytes, u32::from_be_bytes),
			Self::Utf32Le => decode_utf32(bytes, u32::from_le_bytes),
			Self::Ascii => bytes
				.iter()
				.map(|&b| if b.is_ascii() { b as char } else { REPLACEMENT })
				.collect(),
		}
	}
}

fn decode_utf16(bytes: &[u8], unit: impl Fn([u8; 2]) -> u16) -> String {
	let mut units = bytes
		.chunks_exact(2)
		.map(|pair| unit([pair[0], pair[1]]));
	let mut out: String = char::decode_utf16(&mut units)
		.map(|result| result.unwrap_or(REPLACEMENT))
		.collect();
	if bytes.len() % 2 != 0 {
		out.push(REPLACEMENT);
	}
	out
}

fn decode_utf32(bytes: &[u8], unit: impl Fn([u8; 4]) -> u32) -> String {
	let mut out: String = bytes
		.chunks_exact(4)
		.map(|quad| unit([quad[0], quad[1], quad[2], quad[3]]))
		.map(|value| char::from_u32(value).unwrap_or(REPLACEMENT))
		.collect();
	if bytes.len() % 4 != 0 {
		out.push(REPLACEMENT);
	}
	out
}
