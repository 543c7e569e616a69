// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::{Buffer, ByteString, Options, SEGMENT_SIZE};
use sego::streams::{BufSource, SourceBuffer};

fn byte_options(values: &[String]) -> Options {
	Options::of(values.iter().map(|v| ByteString::from_utf8(v)))
}

#[test]
fn select_across_a_segment_boundary() {
	let prefix = "p".repeat(SEGMENT_SIZE + 10);
	let options = byte_options(&[
		format!("{prefix}a"),
		format!("{prefix}bc"),
		format!("{prefix}bd"),
	]);

	let mut buf = Buffer::new();
	buf.write_utf8(&format!("{prefix}bd")).unwrap();
	buf.write_utf8(&format!("{prefix}a")).unwrap();
	buf.write_utf8(&format!("{prefix}bc")).unwrap();

	assert_eq!(buf.select(&options).unwrap(), Some(2));
	assert_eq!(buf.select(&options).unwrap(), Some(0));
	assert_eq!(buf.select(&options).unwrap(), Some(1));
	assert!(buf.is_empty());
}

#[test]
fn select_refills_from_the_underlying_source() {
	let data = b"medium".to_vec();
	let mut source = data.as_slice().buffer();
	let options = byte_options(&[
		"small".to_owned(),
		"medium".to_owned(),
		"large".to_owned(),
	]);
	assert_eq!(source.select(&options).unwrap(), Some(1));
	assert!(source.exhausted().unwrap());
}

#[test]
fn no_match_consumes_nothing_on_a_stream() {
	let data = b"unmatched".to_vec();
	let mut source = data.as_slice().buffer();
	let options = byte_options(&["left".to_owned(), "right".to_owned()]);
	assert_eq!(source.select(&options).unwrap(), None);
	assert_eq!(source.read_utf8(9).unwrap(), "unmatched");
}

#[test]
fn options_index_like_a_list() {
	let options = byte_options(&["a".to_owned(), "b".to_owned()]);
	assert_eq!(options.len(), 2);
	assert_eq!(options[1], ByteString::from_utf8("b"));
	assert_eq!(options.get(5), None);
}
