// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::{Buffer, ByteString, Error};
use sego::fs::{FakeFileSystem, FileSystem, Path, SYSTEM};
use sego::streams::{BufSource, Sink, Source, SourceBuffer};

fn fake_with_file(content: &str) -> (FakeFileSystem, Path) {
	let fs = FakeFileSystem::new();
	let file = Path::new("/file.bin");
	fs.write(&file, &ByteString::from_utf8(content)).unwrap();
	(fs, file)
}

#[test]
fn positional_reads_and_writes() {
	let (fs, file) = fake_with_file("0123456789");
	let handle = fs.open_read_write(&file, false, true).unwrap();

	let mut four = [0u8; 4];
	assert_eq!(handle.read(2, &mut four).unwrap(), 4);
	assert_eq!(&four, b"2345");

	handle.write(3, b"xyz").unwrap();
	let mut all = [0u8; 10];
	handle.read(0, &mut all).unwrap();
	assert_eq!(&all, b"012xyz6789");

	handle.close().unwrap();
	fs.check_no_open_files();
}

#[test]
fn reads_past_the_end_return_zero() {
	let (fs, file) = fake_with_file("abc");
	let handle = fs.open_read_only(&file).unwrap();
	let mut buf = [0u8; 4];
	assert_eq!(handle.read(3, &mut buf).unwrap(), 0);
	assert_eq!(handle.read(100, &mut buf).unwrap(), 0);
	handle.close().unwrap();
}

#[test]
fn resize_truncates_and_zero_extends() {
	let (fs, file) = fake_with_file("abcdef");
	let handle = fs.open_read_write(&file, false, true).unwrap();

	handle.resize(3).unwrap();
	assert_eq!(handle.size().unwrap(), 3);

	handle.resize(5).unwrap();
	let mut buf = [0u8; 5];
	handle.read(0, &mut buf).unwrap();
	assert_eq!(&buf, b"abc\0\0");
	handle.close().unwrap();
}

#[test]
fn read_only_handles_reject_mutation() {
	let (fs, file) = fake_with_file("abc");
	let handle = fs.open_read_only(&file).unwrap();
	assert!(matches!(handle.write(0, b"x"), Err(Error::Unsupported(_))));
	assert!(matches!(handle.resize(1), Err(Error::Unsupported(_))));
	assert!(matches!(handle.flush(), Err(Error::Unsupported(_))));
	assert!(matches!(handle.sink(0), Err(Error::Unsupported(_))));
	handle.close().unwrap();
}

#[test]
fn operations_after_close_fail() {
	let (fs, file) = fake_with_file("abc");
	let handle = fs.open_read_only(&file).unwrap();
	handle.close().unwrap();
	handle.close().unwrap();
	assert!(matches!(handle.size(), Err(Error::Closed)));
	let mut buf = [0; 1];
	assert!(matches!(handle.read(0, &mut buf), Err(Error::Closed)));
	assert!(matches!(handle.source(0), Err(Error::Closed)));
}

#[test]
fn streams_defer_the_underlying_close() {
	let (fs, file) = fake_with_file("stream me");
	let handle = fs.open_read_only(&file).unwrap();
	let mut source = handle.source(0).unwrap();

	handle.close().unwrap();
	assert!(matches!(handle.size(), Err(Error::Closed)));

	// The stream keeps the resource alive until it closes too.
	let mut buf = Buffer::new();
	assert_eq!(source.read(&mut buf, 6).unwrap(), 6);
	assert_eq!(buf.read_all_utf8(), "stream");
	source.close().unwrap();
	fs.check_no_open_files();
}

#[test]
fn source_and_sink_advance_cursors() {
	let (fs, file) = fake_with_file("");
	let handle = fs.open_read_write(&file, false, true).unwrap();

	let mut sink = handle.sink(0).unwrap();
	let mut buf = Buffer::from("hello world");
	sink.write(&mut buf, 11).unwrap();
	sink.close().unwrap();

	let mut source = handle.source(6).unwrap();
	assert_eq!(handle.position(&source).unwrap(), 6);
	let mut out = Buffer::new();
	source.read(&mut out, 5).unwrap();
	assert_eq!(out.read_all_utf8(), "world");
	assert_eq!(handle.position(&source).unwrap(), 11);

	handle.reposition(&mut source, 0).unwrap();
	let mut out = Buffer::new();
	source.read(&mut out, 5).unwrap();
	assert_eq!(out.read_all_utf8(), "hello");

	source.close().unwrap();
	handle.close().unwrap();
	fs.check_no_open_files();
}

#[test]
fn appending_sink_starts_at_the_end() {
	let (fs, file) = fake_with_file("head:");
	let handle = fs.open_read_write(&file, false, true).unwrap();
	let mut sink = handle.appending_sink().unwrap();
	let mut buf = Buffer::from("tail");
	sink.write(&mut buf, 4).unwrap();
	sink.close().unwrap();
	handle.close().unwrap();

	assert_eq!(fs.read(&file).unwrap().utf8(), "head:tail");
	fs.check_no_open_files();
}

#[test]
fn buffered_position_accounts_for_buffered_bytes() {
	let (fs, file) = fake_with_file("abcdefghij");
	let handle = fs.open_read_only(&file).unwrap();

	let mut source = handle.source(0).unwrap().buffer();
	assert_eq!(source.read_utf8(3).unwrap(), "abc");
	// The wrapper buffered the whole file; position still reports 3.
	assert_eq!(handle.position_buffered(&source).unwrap(), 3);

	// Repositioning inside the buffered window keeps the buffer.
	handle.reposition_buffered(&mut source, 7).unwrap();
	assert_eq!(source.read_utf8(3).unwrap(), "hij");

	// Repositioning outside the window discards it.
	handle.reposition_buffered(&mut source, 0).unwrap();
	assert_eq!(source.read_utf8(3).unwrap(), "abc");

	source.close().unwrap();
	handle.close().unwrap();
	fs.check_no_open_files();
}

#[test]
#[should_panic(expected = "mutually exclusive")]
fn conflicting_open_flags_panic() {
	let fs = FakeFileSystem::new();
	let _ = fs.open_read_write(&Path::new("/x"), true, true);
}

#[test]
fn system_handles_work_on_real_files() {
	let dir = tempfile::tempdir().unwrap();
	let root = Path::from_std(dir.path());
	let file = root.join_str("handle.bin");

	let handle = SYSTEM.open_read_write(&file, true, false).unwrap();
	handle.write(0, b"0123456789").unwrap();
	handle.resize(4).unwrap();
	assert_eq!(handle.size().unwrap(), 4);

	let mut buf = [0u8; 8];
	assert_eq!(handle.read(0, &mut buf).unwrap(), 4);
	assert_eq!(&buf[..4], b"0123");
	handle.flush().unwrap();
	handle.close().unwrap();
}
