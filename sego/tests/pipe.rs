// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sego::{Buffer, Error, Pipe, Result, SEGMENT_SIZE};
use sego::streams::{Sink, Source};

#[test]
fn bytes_arrive_in_write_order() {
	let pipe = Pipe::new(SEGMENT_SIZE);
	let mut sink = pipe.sink();
	let mut source = pipe.source();

	let payload: Vec<u8> = (0..SEGMENT_SIZE * 4).map(|i| i as u8).collect();
	let expected = payload.clone();

	let writer = thread::spawn(move || {
		let mut buf = Buffer::new();
		buf.write_slice(&payload).unwrap();
		let len = buf.len();
		sink.write(&mut buf, len).unwrap();
		sink.close().unwrap();
	});

	let mut received = Vec::new();
	let mut buf = Buffer::new();
	loop {
		let n = source.read(&mut buf, SEGMENT_SIZE).unwrap();
		if n == 0 {
			break;
		}
		received.extend_from_slice(&buf.read_vec(n).unwrap());
	}
	writer.join().unwrap();

	assert_eq!(received, expected);
}

#[test]
fn writer_blocks_at_capacity() {
	let pipe = Pipe::new(8);
	let mut sink = pipe.sink();
	let mut source = pipe.source();

	let writer = thread::spawn(move || {
		let mut buf = Buffer::from("0123456789abcdef");
		let len = buf.len();
		sink.write(&mut buf, len).unwrap();
		sink.close().unwrap();
	});

	thread::sleep(Duration::from_millis(50));
	let mut buf = Buffer::new();
	while source.read(&mut buf, 64).unwrap() > 0 {}
	writer.join().unwrap();
	assert_eq!(buf.read_all_utf8(), "0123456789abcdef");
}

#[test]
fn empty_pipe_read_times_out() {
	let pipe = Pipe::new(64);
	let _sink = pipe.sink();
	let mut source = pipe.source();
	source.timeout_mut().set_timeout(Duration::from_millis(50));

	let mut buf = Buffer::new();
	assert!(matches!(
		source.read(&mut buf, 1),
		Err(Error::TimedOut { .. }),
	));
}

#[test]
fn closed_sink_is_eof_for_the_reader() {
	let pipe = Pipe::new(64);
	let mut sink = pipe.sink();
	let mut source = pipe.source();

	let mut buf = Buffer::from("bye");
	sink.write(&mut buf, 3).unwrap();
	sink.close().unwrap();

	let mut out = Buffer::new();
	assert_eq!(source.read(&mut out, 10).unwrap(), 3);
	assert_eq!(source.read(&mut out, 10).unwrap(), 0);
}

#[test]
fn closed_source_fails_the_writer() {
	let pipe = Pipe::new(4);
	let mut sink = pipe.sink();
	let mut source = pipe.source();
	source.close().unwrap();

	let mut buf = Buffer::from("overflowing");
	let len = buf.len();
	assert!(sink.write(&mut buf, len).is_err());
}

#[derive(Clone, Default)]
struct RecordingSink {
	data: Arc<Mutex<Vec<u8>>>,
	closed: Arc<Mutex<bool>>,
}

impl Sink for RecordingSink {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		let bytes = source.read_vec(byte_count)?;
		self.data.lock().extend_from_slice(&bytes);
		Ok(())
	}

	fn close(&mut self) -> Result {
		*self.closed.lock() = true;
		Ok(())
	}
}

#[test]
fn fold_drains_and_redirects() {
	let pipe = Pipe::new(64);
	let mut sink = pipe.sink();
	let mut source = pipe.source();

	let mut buf = Buffer::from("buffered ");
	sink.write(&mut buf, 9).unwrap();

	let recorder = RecordingSink::default();
	pipe.fold(recorder.clone()).unwrap();

	// The source side is invalid after folding.
	let mut out = Buffer::new();
	assert!(matches!(source.read(&mut out, 1), Err(Error::Closed)));

	// New writes land in the underlying sink directly.
	let mut buf = Buffer::from("direct");
	sink.write(&mut buf, 6).unwrap();
	assert_eq!(recorder.data.lock().as_slice(), b"buffered direct");

	// Closing the pipe's sink closes the underlying sink.
	sink.close().unwrap();
	assert!(*recorder.closed.lock());
}

#[test]
fn timeouts_are_per_half() {
	let pipe = Pipe::new(16);
	let mut sink = pipe.sink();
	let source = pipe.source();
	sink.timeout_mut().set_timeout(Duration::from_millis(50));

	// Fill the pipe, then the next write must time out while the reader
	// stays idle.
	let mut buf = Buffer::from("0123456789abcdef!!");
	assert!(matches!(
		sink.write(&mut buf, 18),
		Err(Error::TimedOut { .. }),
	));
	drop(source);
}
