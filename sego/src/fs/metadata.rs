// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::time::SystemTime;
use super::Path;

/// What a filesystem knows about a path, without following symlinks.
///
/// Fields a filesystem cannot provide are `None`; `extras` carries
/// implementation-specific attributes under string keys.
#[derive(Clone, Debug, Default)]
pub struct FileMetadata {
	pub is_regular_file: bool,
	pub is_directory: bool,
	/// The target of a symbolic link, when the path is one.
	pub symlink_target: Option<Path>,
	pub size: Option<u64>,
	pub created_at: Option<SystemTime>,
	pub last_modified_at: Option<SystemTime>,
	pub last_accessed_at: Option<SystemTime>,
	pub extras: BTreeMap<String, String>,
}

impl FileMetadata {
	pub fn file(size: u64) -> Self {
		Self {
			is_regular_file: true,
			size: Some(size),
			..Self::default()
		}
	}

	pub fn directory() -> Self {
		Self {
			is_directory: true,
			..Self::default()
		}
	}

	pub fn symlink(target: Path) -> Self {
		Self {
			symlink_target: Some(target),
			..Self::default()
		}
	}
}
