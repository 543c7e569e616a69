// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::{Buffer, BufferedSink, BufferedSource, Error, ReaderSource, SEGMENT_SIZE, WriterSink};
use sego::streams::{BufSink, BufSource, ForwardingSource, Sink, SinkBuffer, Source, SourceBuffer};

#[test]
fn request_and_require() {
	let data = b"0123456789".to_vec();
	let mut source = data.as_slice().buffer();

	assert!(source.request(10).unwrap());
	assert!(!source.request(11).unwrap());
	assert!(source.require(10).is_ok());
	assert!(matches!(source.require(11), Err(Error::Eof(_))));
}

#[test]
fn exhausted_only_at_the_end() {
	let data = b"x".to_vec();
	let mut source = data.as_slice().buffer();
	assert!(!source.exhausted().unwrap());
	assert_eq!(source.read_u8().unwrap(), b'x');
	assert!(source.exhausted().unwrap());
}

#[test]
fn typed_reads_pull_through_the_buffer() {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(&0xcafe_babe_u32.to_be_bytes());
	bytes.extend_from_slice(&7_u16.to_le_bytes());
	bytes.extend_from_slice(b"done");

	let mut source = bytes.as_slice().buffer();
	assert_eq!(source.read_u32().unwrap(), 0xcafe_babe);
	assert_eq!(source.read_u16_le().unwrap(), 7);
	assert_eq!(source.read_utf8(4).unwrap(), "done");
}

#[test]
fn reads_after_close_fail() {
	let data = b"abc".to_vec();
	let mut source = data.as_slice().buffer();
	source.close().unwrap();
	source.close().unwrap();
	assert!(matches!(source.read_u8(), Err(Error::Closed)));
}

#[test]
fn peek_does_not_consume() {
	let data = b"park bench".to_vec();
	let mut source = data.as_slice().buffer();
	source.require(1).unwrap();

	let mut peek = source.peek();
	assert_eq!(peek.read_utf8(4).unwrap(), "park");
	assert_eq!(peek.read_utf8(6).unwrap(), " bench");
	assert!(peek.exhausted().unwrap());
	drop(peek);

	assert_eq!(source.read_utf8(4).unwrap(), "park");
}

#[test]
fn buffered_sink_emits_only_complete_segments() {
	let mut sink = BufferedSink::new(Buffer::new());
	sink.write_slice(&vec![1; SEGMENT_SIZE + 10]).unwrap();
	assert_eq!(sink.get_ref().len(), SEGMENT_SIZE, "the partial tail stays buffered");

	sink.flush().unwrap();
	assert_eq!(sink.get_ref().len(), SEGMENT_SIZE + 10);
}

#[test]
fn buffered_sink_close_flushes_once() {
	let mut sink = BufferedSink::new(Buffer::new());
	sink.write_utf8("tail").unwrap();
	sink.close().unwrap();
	assert!(matches!(sink.write_u8(1), Err(Error::Closed)));
	assert!(matches!(sink.flush(), Err(Error::Closed)));
	assert_eq!(sink.get_ref().len(), 4);
}

#[test]
fn skip_spans_refills() {
	let data = vec![9u8; SEGMENT_SIZE * 2];
	let mut source = data.as_slice().buffer();
	assert_eq!(source.skip(SEGMENT_SIZE + 5).unwrap(), SEGMENT_SIZE + 5);
	assert_eq!(source.skip(SEGMENT_SIZE).unwrap(), SEGMENT_SIZE - 5);
}

#[test]
fn index_of_reads_ahead() {
	let mut data = vec![b'a'; SEGMENT_SIZE + 3];
	data.push(b'!');
	let mut source = data.as_slice().buffer();
	assert_eq!(source.index_of(b'!', 0).unwrap(), Some(SEGMENT_SIZE + 3));
	assert_eq!(source.index_of(b'?', 0).unwrap(), None);
}

#[test]
fn write_from_demands_the_full_count() {
	let data = b"abc".to_vec();
	let mut short = data.as_slice();
	let mut sink = BufferedSink::new(Buffer::new());
	assert!(matches!(sink.write_from(&mut short, 5), Err(Error::Eof(_))));
}

#[test]
fn forwarding_source_delegates() {
	let data = b"pass through".to_vec();
	let mut source = BufferedSource::new(ForwardingSource::new(data.as_slice()));
	assert_eq!(source.read_utf8(12).unwrap(), "pass through");
}

#[test]
fn std_io_round_trip() {
	let mut encoded = Vec::new();
	{
		let mut sink = WriterSink::new(&mut encoded).buffer();
		sink.write_utf8("line one\n").unwrap();
		sink.write_decimal_i64(-42).unwrap();
		sink.close().unwrap();
	}

	let mut source = ReaderSource::new(encoded.as_slice()).buffer();
	assert_eq!(source.read_utf8_line().unwrap().as_deref(), Some("line one"));
	assert_eq!(source.read_decimal_i64().unwrap(), -42);
	assert!(source.exhausted().unwrap());
}

#[test]
fn read_all_drains_into_a_sink() {
	let data = vec![4u8; SEGMENT_SIZE + 44];
	let mut source = data.as_slice().buffer();
	let mut sink = Buffer::new();
	assert_eq!(source.read_all(&mut sink).unwrap(), data.len());
	assert_eq!(sink.len(), data.len());
}

#[test]
fn write_all_drains_a_source() {
	let data = vec![2u8; SEGMENT_SIZE * 3];
	let mut source: &[u8] = &data;
	let mut sink = BufferedSink::new(Buffer::new());
	assert_eq!(sink.write_all(&mut source).unwrap(), data.len());
	sink.flush().unwrap();
	assert_eq!(sink.get_ref().len(), data.len());
}

#[test]
fn buffer_is_both_ends() {
	let mut buf = Buffer::new();
	buf.write_utf8("both ends").unwrap();
	let mut out = Buffer::new();
	let n = buf.read(&mut out, 4).unwrap();
	assert_eq!(n, 4);
	assert_eq!(out.read_all_utf8(), "both");
	assert_eq!(buf.read_all_utf8(), " ends");
}
