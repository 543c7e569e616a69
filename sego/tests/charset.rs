// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::{Buffer, Charset};

#[test]
fn utf16_round_trips_both_orders() {
	for charset in [Charset::Utf16Be, Charset::Utf16Le] {
		let mut buf = Buffer::new();
		buf.write_string("h€llo 𝄞", charset).unwrap();
		let len = buf.len();
		assert_eq!(buf.read_string(len, charset).unwrap(), "h€llo 𝄞");
	}
}

#[test]
fn utf32_round_trips_both_orders() {
	for charset in [Charset::Utf32Be, Charset::Utf32Le] {
		let mut buf = Buffer::new();
		buf.write_string("𝄞 clef", charset).unwrap();
		let len = buf.len();
		assert_eq!(buf.read_string(len, charset).unwrap(), "𝄞 clef");
	}
}

#[test]
fn utf16_byte_order_is_observable() {
	let mut buf = Buffer::new();
	buf.write_string("A", Charset::Utf16Be).unwrap();
	assert_eq!(buf.read_vec(2).unwrap(), [0x00, 0x41]);

	let mut buf = Buffer::new();
	buf.write_string("A", Charset::Utf16Le).unwrap();
	assert_eq!(buf.read_vec(2).unwrap(), [0x41, 0x00]);
}

#[test]
fn ascii_writes_question_marks() {
	let mut buf = Buffer::new();
	buf.write_string("naïve", Charset::Ascii).unwrap();
	assert_eq!(buf.read_all_utf8(), "na?ve");
}

#[test]
fn malformed_units_decode_to_replacement() {
	// A lone high surrogate in UTF-16BE.
	let mut buf = Buffer::new();
	buf.write_slice(&[0xd8, 0x00]).unwrap();
	assert_eq!(buf.read_string(2, Charset::Utf16Be).unwrap(), "\u{fffd}");

	// An out-of-range scalar in UTF-32BE, then a trailing partial unit.
	let mut buf = Buffer::new();
	buf.write_slice(&[0x00, 0x11, 0x00, 0x00, 0x00]).unwrap();
	assert_eq!(buf.read_string(5, Charset::Utf32Be).unwrap(), "\u{fffd}\u{fffd}");

	// Non-ASCII bytes read as US-ASCII.
	let mut buf = Buffer::new();
	buf.write_slice(&[b'o', 0x80, b'k']).unwrap();
	assert_eq!(buf.read_string(3, Charset::Ascii).unwrap(), "o\u{fffd}k");
}

#[test]
fn utf8_charset_is_the_default_path() {
	let mut buf = Buffer::new();
	buf.write_string("plain", Charset::Utf8).unwrap();
	assert_eq!(buf.read_string(5, Charset::Utf8).unwrap(), "plain");
}
