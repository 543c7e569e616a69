// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::ByteString;
use sego::fs::{FakeFileSystem, FileSystem, ForwardingFileSystem, Path};

fn fake_with_tree() -> FakeFileSystem {
	let fs = FakeFileSystem::new();
	fs.create_directories(&Path::new("/a/b"), false).unwrap();
	fs.write(&Path::new("/a/b/one.txt"), &ByteString::from_utf8("one")).unwrap();
	fs.write(&Path::new("/a/two.txt"), &ByteString::from_utf8("two")).unwrap();
	fs
}

#[test]
fn write_read_round_trip() {
	let fs = FakeFileSystem::new();
	let file = Path::new("/hello.txt");
	fs.write(&file, &ByteString::from_utf8("hello world")).unwrap();
	assert_eq!(fs.read(&file).unwrap().utf8(), "hello world");
	fs.check_no_open_files();
}

#[test]
fn metadata_distinguishes_kinds() {
	let fs = fake_with_tree();
	assert!(fs.metadata(&Path::new("/a")).unwrap().is_directory);
	assert!(fs.metadata(&Path::new("/a/two.txt")).unwrap().is_regular_file);
	assert_eq!(fs.metadata(&Path::new("/a/two.txt")).unwrap().size, Some(3));
	assert!(fs.metadata_or_null(&Path::new("/missing")).unwrap().is_none());
	assert!(fs.metadata(&Path::new("/missing")).is_err());
	assert!(fs.exists(&Path::new("/a/b/one.txt")).unwrap());
}

#[test]
fn listing_is_sorted_and_distinguishes_failures() {
	let fs = fake_with_tree();
	let entries = fs.list(&Path::new("/a")).unwrap();
	let names: Vec<String> = entries.iter().map(|p| p.name().to_owned()).collect();
	assert_eq!(names, ["b", "two.txt"]);

	assert!(fs.list(&Path::new("/missing")).is_err());
	assert!(fs.list(&Path::new("/a/two.txt")).is_err());
	assert_eq!(fs.list_or_null(&Path::new("/missing")).unwrap(), None);
	assert_eq!(fs.list_or_null(&Path::new("/a/two.txt")).unwrap(), None);
}

#[test]
fn list_recursively_emits_directories_first() {
	let fs = fake_with_tree();
	let all: Vec<String> = fs
		.list_recursively(&Path::new("/"), false)
		.unwrap()
		.map(|entry| entry.unwrap().to_string())
		.collect();
	assert_eq!(all, ["/a", "/a/b", "/a/b/one.txt", "/a/two.txt"]);
}

#[test]
fn list_recursively_detects_symlink_cycles() {
	let fs = fake_with_tree();
	fs.create_symlink(&Path::new("/a/b/loop"), &Path::new("/a")).unwrap();

	let outcome: Vec<_> = fs
		.list_recursively(&Path::new("/"), true)
		.unwrap()
		.collect();
	let error = outcome
		.into_iter()
		.find_map(|entry| entry.err())
		.expect("a cycle error");
	assert!(error.to_string().starts_with("symlink cycle at "), "{error}");

	// Without following links the traversal terminates quietly.
	let safe = fs.list_recursively(&Path::new("/"), false).unwrap();
	assert!(safe.collect::<Result<Vec<_>, _>>().is_ok());
}

#[test]
fn atomic_move_swaps_instantaneously() {
	let fs = fake_with_tree();
	let source = Path::new("/a/two.txt");
	let target = Path::new("/a/renamed.txt");

	assert!(fs.exists(&source).unwrap());
	assert!(!fs.exists(&target).unwrap());
	fs.atomic_move(&source, &target).unwrap();
	assert!(!fs.exists(&source).unwrap());
	assert!(fs.exists(&target).unwrap());
	assert_eq!(fs.read(&target).unwrap().utf8(), "two");
}

#[test]
fn atomic_move_renames_directories_with_contents() {
	let fs = fake_with_tree();
	fs.atomic_move(&Path::new("/a"), &Path::new("/z")).unwrap();
	assert_eq!(fs.read(&Path::new("/z/b/one.txt")).unwrap().utf8(), "one");
	assert!(!fs.exists(&Path::new("/a")).unwrap());
}

#[test]
fn atomic_move_refuses_nonempty_targets() {
	let fs = fake_with_tree();
	assert!(fs.atomic_move(&Path::new("/a/two.txt"), &Path::new("/a/b")).is_err());
}

#[test]
fn copy_duplicates_contents() {
	let fs = fake_with_tree();
	fs.copy(&Path::new("/a/two.txt"), &Path::new("/copy.txt")).unwrap();
	assert_eq!(fs.read(&Path::new("/copy.txt")).unwrap().utf8(), "two");
	assert_eq!(fs.read(&Path::new("/a/two.txt")).unwrap().utf8(), "two");
	fs.check_no_open_files();
}

#[test]
fn delete_recursively_removes_links_not_targets() {
	let fs = fake_with_tree();
	fs.create_symlink(&Path::new("/link"), &Path::new("/a")).unwrap();

	fs.delete_recursively(&Path::new("/link"), true).unwrap();
	assert!(!fs.exists(&Path::new("/link")).unwrap());
	assert_eq!(
		fs.read(&Path::new("/a/b/one.txt")).unwrap().utf8(),
		"one",
		"the link target must survive",
	);
}

#[test]
fn delete_recursively_survives_link_cycles() {
	let fs = fake_with_tree();
	fs.create_symlink(&Path::new("/a/b/up"), &Path::new("/a")).unwrap();
	fs.delete_recursively(&Path::new("/a"), true).unwrap();
	assert!(!fs.exists(&Path::new("/a")).unwrap());
}

#[test]
fn must_flags_are_honored() {
	let fs = FakeFileSystem::new();
	let file = Path::new("/f");
	assert!(fs.appending_sink(&file, true).is_err(), "must_exist without a file");
	fs.write(&file, &ByteString::from_utf8("x")).unwrap();
	assert!(fs.sink(&file, true).is_err(), "must_create over a file");
	assert!(fs.delete(&Path::new("/missing"), true).is_err());
	fs.delete(&Path::new("/missing"), false).unwrap();
	assert!(fs.create_directory(&file, false).is_err(), "a file is not a directory");
	fs.check_no_open_files();
}

#[test]
fn appending_sink_appends() {
	let fs = FakeFileSystem::new();
	let file = Path::new("/log");
	fs.write(&file, &ByteString::from_utf8("one,")).unwrap();
	{
		let mut sink = fs.appending_sink(&file, false).unwrap();
		let mut buf = sego::Buffer::from("two");
		use sego::streams::Sink;
		sink.write(&mut buf, 3).unwrap();
		sink.close().unwrap();
	}
	assert_eq!(fs.read(&file).unwrap().utf8(), "one,two");
	fs.check_no_open_files();
}

#[test]
fn canonicalize_follows_symlinks() {
	let fs = fake_with_tree();
	fs.create_symlink(&Path::new("/shortcut"), &Path::new("/a/b")).unwrap();
	let canonical = fs.canonicalize(&Path::new("/shortcut/one.txt")).unwrap();
	assert_eq!(canonical.as_str(), "/a/b/one.txt");
}

#[test]
#[should_panic(expected = "expected 0 open files")]
fn open_file_ledger_catches_leaks() {
	let fs = fake_with_tree();
	let source = fs.source(&Path::new("/a/two.txt")).unwrap();
	fs.check_no_open_files();
	drop(source);
}

#[test]
fn forwarding_rewrites_paths() {
	let fs = fake_with_tree();
	let prefixed = ForwardingFileSystem::new(fs.clone())
		.on_path_parameter(|path, _function, _parameter| {
			Ok(Path::new("/a").join(path))
		});

	assert_eq!(prefixed.read(&Path::new("two.txt")).unwrap().utf8(), "two");
	assert!(prefixed.exists(&Path::new("b/one.txt")).unwrap());
}

mod system {
	use super::*;
	use pretty_assertions::assert_eq;
	use sego::fs::SYSTEM;

	#[test]
	fn round_trip_in_a_temp_dir() {
		let dir = tempfile::tempdir().unwrap();
		let root = Path::from_std(dir.path());
		let file = root.join_str("data.bin");

		SYSTEM.write(&file, &ByteString::from([1, 2, 3])).unwrap();
		assert_eq!(SYSTEM.read(&file).unwrap(), ByteString::from([1, 2, 3]));
		assert!(SYSTEM.metadata(&file).unwrap().is_regular_file);
	}

	#[test]
	fn atomic_move_is_observable_as_a_swap() {
		let dir = tempfile::tempdir().unwrap();
		let root = Path::from_std(dir.path());
		let source = root.join_str("before");
		let target = root.join_str("after");

		SYSTEM.write(&source, &ByteString::from_utf8("contents")).unwrap();
		SYSTEM.atomic_move(&source, &target).unwrap();
		assert!(!SYSTEM.exists(&source).unwrap());
		assert_eq!(SYSTEM.read(&target).unwrap().utf8(), "contents");
	}

	#[cfg(unix)]
	#[test]
	fn delete_recursively_spares_symlink_targets() {
		let dir = tempfile::tempdir().unwrap();
		let root = Path::from_std(dir.path());
		let a = root.join_str("a");
		let file = a.join_str("file.txt");
		let link = root.join_str("link");

		SYSTEM.create_directory(&a, true).unwrap();
		SYSTEM.write(&file, &ByteString::from_utf8("original bytes")).unwrap();
		SYSTEM.create_symlink(&link, &a).unwrap();

		SYSTEM.delete_recursively(&link, true).unwrap();
		assert!(!SYSTEM.exists(&link).unwrap());
		assert_eq!(SYSTEM.read(&file).unwrap().utf8(), "original bytes");
	}

	#[test]
	fn listing_is_sorted() {
		let dir = tempfile::tempdir().unwrap();
		let root = Path::from_std(dir.path());
		for name in ["zeta", "alpha", "mid"] {
			SYSTEM.write(&root.join_str(name), &ByteString::from_utf8(name)).unwrap();
		}
		let names: Vec<String> = SYSTEM
			.list(&root)
			.unwrap()
			.iter()
			.map(|p| p.name().to_owned())
			.collect();
		assert_eq!(names, ["alpha", "mid", "zeta"]);
	}

	#[cfg(unix)]
	#[test]
	fn list_recursively_detects_cycles_on_the_host() {
		let dir = tempfile::tempdir().unwrap();
		let root = Path::from_std(dir.path());
		let a = root.join_str("a");
		SYSTEM.create_directory(&a, true).unwrap();
		SYSTEM.create_symlink(&a.join_str("loop"), &a).unwrap();

		let error = SYSTEM
			.list_recursively(&root, true)
			.unwrap()
			.find_map(|entry| entry.err())
			.expect("a cycle error");
		assert!(error.to_string().starts_with("symlink cycle at "), "{error}");
	}
}
