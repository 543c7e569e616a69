// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use sego::fs::Path;

fn path(s: &str) -> Path {
	Path::new(s)
}

#[test]
fn posix_roots() {
	assert!(path("/").is_root());
	assert!(path("/a").is_absolute());
	assert!(path("a/b").is_relative());
	assert_eq!(path("/a/b").root().unwrap().as_str(), "/");
	assert_eq!(path("a/b").root(), None);
}

#[test]
fn keeps_the_dominant_slash_style() {
	assert_eq!(path(r"a\b").as_str(), r"a\b");
	assert_eq!(path("a/b").as_str(), "a/b");
	assert_eq!(path(r"a\b/c").as_str(), r"a\b\c");
}

#[test]
fn unc_and_long_paths() {
	let unc = path(r"\\server\share\file.txt");
	assert!(unc.is_absolute());
	assert_eq!(unc.name(), "file.txt");
	assert_eq!(unc.segments(), ["server", "share", "file.txt"]);

	let long = path(r"\\?\C:\temp");
	assert!(long.is_absolute());
	assert_eq!(long.segments(), ["?", "C:", "temp"]);
}

#[test]
fn drive_relative_and_absolute() {
	assert!(path(r"C:\Windows").is_absolute());
	assert!(path("C:Temp").is_relative());
	assert_eq!(path("C:Temp").volume_letter(), Some('C'));
	assert_eq!(path("C:Temp").name(), "Temp");
}

#[test]
fn names_and_segments() {
	assert_eq!(path("/a/b/c.txt").name(), "c.txt");
	assert_eq!(path("/").name(), "");
	assert_eq!(path("a").name(), "a");
	assert_eq!(path("/a/b/c").segments(), ["a", "b", "c"]);
}

#[test]
fn normalization_rules() {
	assert_eq!(path("/a/b/../c/./d").normalized().as_str(), "/a/c/d");
	assert_eq!(path("a/..").normalized().as_str(), ".");
	assert_eq!(path("../a/..").normalized().as_str(), "..");
	// Climbing the root stays literal rather than silently vanishing.
	assert_eq!(path("/..").normalized().as_str(), "/..");
}

#[test]
fn join_follows_resolution_rules() {
	assert_eq!(path("a").join_str("b").as_str(), "a/b");
	assert_eq!(path("/a").join_str("/b").as_str(), "/b");
	assert_eq!(path(".").join_str("b").as_str(), "b");
	assert_eq!((&path("/tmp") / "logs" ).as_str(), "/tmp/logs");
	assert_eq!(path(r"C:\a").join_str(r"D:\b").as_str(), r"D:\b");
}

#[test]
fn relative_to_round_trips() {
	let base = path("/projects/app");
	let file = path("/projects/app/src/main.rs");
	let relative = file.relative_to(&base).unwrap();
	assert_eq!(relative.as_str(), "src/main.rs");
	assert_eq!(base.join(&relative), file);
}

#[test]
fn relative_to_failure_modes() {
	assert!(path("/a").relative_to(&path("C:/a")).is_err());
	assert!(path("a").relative_to(&path("/a")).is_err());
	// Mismatched unresolved `..` prefixes cannot be bridged.
	assert!(path("../x").relative_to(&path("../../y")).is_err());
}

#[test]
fn display_is_the_path_text() {
	assert_eq!(path("/a/b").to_string(), "/a/b");
	assert_eq!(format!("{:?}", path("/a/b")), "Path(/a/b)");
}
