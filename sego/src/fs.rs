// SPDX-License-Identifier: Apache-2.0

//! Filesystem access behind one capability trait.
//!
//! [`FileSystem`] is the contract the core consumes; [`SystemFileSystem`]
//! adapts the host, [`FakeFileSystem`] is an in-memory rendition for tests,
//! and [`ForwardingFileSystem`] decorates any of them. Streams come back as
//! the crate's [`Source`]/[`Sink`] pairs, random access as a [`FileHandle`].

mod fake;
mod forward;
mod handle;
mod metadata;
mod path;
mod system;

pub use fake::*;
pub use forward::*;
pub use handle::*;
pub use metadata::*;
pub use path::*;
pub use system::*;

use crate::{Buffer, ByteString, Error, Result, SEGMENT_SIZE};
use crate::streams::{Sink, Source};

/// Read and write access to a hierarchical collection of files.
///
/// Listings are sorted by byte order. Metadata never follows symlinks; the
/// `*_or_null` variants return `Ok(None)` where the plain variants fail with
/// [`Error::NotFound`].
pub trait FileSystem: Send + Sync {
	/// Resolves `.`, `..`, and symlinks to a canonical absolute path. Fails
	/// when any component does not exist.
	fn canonicalize(&self, path: &Path) -> Result<Path>;

	/// Returns a path's metadata, or `None` when nothing exists there. May
	/// still fail for inaccessible paths.
	fn metadata_or_null(&self, path: &Path) -> Result<Option<FileMetadata>>;

	/// Returns a path's metadata, failing when nothing exists there.
	fn metadata(&self, path: &Path) -> Result<FileMetadata> {
		self.metadata_or_null(path)?
			.ok_or_else(|| Error::NotFound(path.to_string()))
	}

	fn exists(&self, path: &Path) -> Result<bool> {
		Ok(self.metadata_or_null(path)?.is_some())
	}

	/// Returns a directory's entries. Fails with [`Error::NotFound`] for a
	/// missing path, and distinguishably (an IO error) for a non-directory.
	fn list(&self, dir: &Path) -> Result<Vec<Path>>;

	/// Returns a directory's entries, or `None` for a file or missing path.
	fn list_or_null(&self, dir: &Path) -> Result<Option<Vec<Path>>>;

	/// Returns a lazy depth-first traversal of `dir`, directories emitted
	/// before their contents. Fails here when `dir` is missing or not a
	/// directory; entries that become unlistable mid-traversal are skipped
	/// silently. With `follow_symlinks`, linked directories are entered and
	/// cycles fail with [`Error::SymlinkCycle`].
	fn list_recursively(&self, dir: &Path, follow_symlinks: bool) -> Result<ListRecursively<'_>>
	where
		Self: Sized,
	{
		ListRecursively::new(self, dir, follow_symlinks)
	}

	/// Opens a read-only stream. Fails when the file is missing.
	fn source(&self, file: &Path) -> Result<Box<dyn Source + Send>>;

	/// Opens a truncating write stream, creating the file as needed. With
	/// `must_create`, fails when the file already exists.
	fn sink(&self, file: &Path, must_create: bool) -> Result<Box<dyn Sink + Send>>;

	/// Opens an appending write stream, creating the file unless
	/// `must_exist`.
	fn appending_sink(&self, file: &Path, must_exist: bool) -> Result<Box<dyn Sink + Send>>;

	/// Opens a read-only random-access handle.
	fn open_read_only(&self, file: &Path) -> Result<FileHandle>;

	/// Opens a read-write random-access handle, creating the file as needed.
	///
	/// # Panics
	///
	/// Panics when both `must_create` and `must_exist` are set; they are
	/// mutually exclusive.
	fn open_read_write(&self, file: &Path, must_create: bool, must_exist: bool)
		-> Result<FileHandle>;

	/// Creates a directory. Without `must_create`, an existing directory is
	/// accepted.
	fn create_directory(&self, dir: &Path, must_create: bool) -> Result;

	/// Creates a directory and any missing ancestors.
	fn create_directories(&self, dir: &Path, must_create: bool) -> Result {
		let mut missing = Vec::new();
		let mut cursor = Some(dir.clone());
		while let Some(path) = cursor {
			if self.exists(&path)? {
				break;
			}
			cursor = path.parent();
			missing.push(path);
		}
		if missing.is_empty() {
			return self.create_directory(dir, must_create);
		}
		for path in missing.into_iter().rev() {
			self.create_directory(&path, false)?;
		}
		Ok(())
	}

	/// Renames `source` to `target` in one step visible to concurrent
	/// observers. An existing `target` may be clobbered only if it is a file
	/// or empty directory and the platform allows it.
	fn atomic_move(&self, source: &Path, target: &Path) -> Result;

	/// Copies file contents. Metadata is not carried over.
	fn copy(&self, source: &Path, target: &Path) -> Result {
		let mut src = self.source(source)?;
		let mut dst = self.sink(target, false)?;
		let copied = copy_streams(&mut *src, &mut *dst);
		let dst_closed = dst.close();
		let src_closed = src.close();
		copied?;
		dst_closed?;
		src_closed
	}

	/// Deletes one file, symlink, or empty directory.
	fn delete(&self, path: &Path, must_exist: bool) -> Result;

	/// Deletes `root` and everything beneath it. Symlinks are removed, never
	/// followed, so a cycle through links cannot recurse and the link's
	/// target survives.
	fn delete_recursively(&self, root: &Path, must_exist: bool) -> Result {
		if self.metadata_or_null(root)?.is_none() {
			return if must_exist {
				Err(Error::NotFound(root.to_string()))
			} else {
				Ok(())
			};
		}
		tracing::debug!(root = %root, "deleting recursively");

		// Postorder with an explicit stack; directories are revisited for
		// deletion once their contents are gone.
		let mut stack = vec![(root.clone(), false)];
		while let Some((path, visited)) = stack.pop() {
			if visited {
				self.delete(&path, false)?;
				continue;
			}
			let descend = self.metadata_or_null(&path)?
				.is_some_and(|m| m.is_directory && m.symlink_target.is_none());
			if descend {
				stack.push((path.clone(), true));
				for child in self.list_or_null(&path)?.unwrap_or_default() {
					stack.push((child, false));
				}
			} else {
				self.delete(&path, false)?;
			}
		}
		Ok(())
	}

	/// Creates a symbolic link at `link` pointing to `target`. Fails when
	/// `link` already exists.
	fn create_symlink(&self, link: &Path, target: &Path) -> Result;

	/// Reads a whole file.
	fn read(&self, file: &Path) -> Result<ByteString> {
		let mut src = self.source(file)?;
		let mut buffer = Buffer::new();
		let drained = loop {
			match src.read(&mut buffer, SEGMENT_SIZE) {
				Ok(0) => break Ok(()),
				Ok(_) => {}
				Err(error) => break Err(error),
			}
		};
		let closed = src.close();
		drained?;
		closed?;
		let len = buffer.len();
		buffer.read_byte_string(len)
	}

	/// Replaces a whole file.
	fn write(&self, file: &Path, content: &ByteString) -> Result {
		let mut dst = self.sink(file, false)?;
		let mut buffer = Buffer::new();
		buffer.write_byte_string(content)?;
		let len = buffer.len();
		let written = dst.write(&mut buffer, len);
		let closed = dst.close();
		written?;
		closed
	}
}

fn copy_streams(src: &mut (impl Source + ?Sized), dst: &mut (impl Sink + ?Sized)) -> Result {
	let mut buffer = Buffer::new();
	loop {
		let n = src.read(&mut buffer, SEGMENT_SIZE)?;
		if n == 0 {
			return Ok(());
		}
		let len = buffer.len();
		dst.write(&mut buffer, len)?;
	}
}

/// The lazy traversal behind [`FileSystem::list_recursively`].
pub struct ListRecursively<'a> {
	fs: &'a dyn FileSystem,
	follow_symlinks: bool,
	stack: Vec<Frame>,
}

struct Frame {
	entries: std::vec::IntoIter<Path>,
	/// Canonical identity of the directory being traversed, for cycle
	/// detection under `follow_symlinks`.
	canonical: Option<Path>,
}

impl<'a> ListRecursively<'a> {
	fn new(fs: &'a dyn FileSystem, dir: &Path, follow_symlinks: bool) -> Result<Self> {
		let entries = fs.list(dir)?;
		let canonical = fs.canonicalize(dir).ok();
		Ok(Self {
			fs,
			follow_symlinks,
			stack: vec![Frame { entries: entries.into_iter(), canonical }],
		})
	}

	fn descends(&self, path: &Path) -> bool {
		let Ok(Some(metadata)) = self.fs.metadata_or_null(path) else { return false };
		if metadata.is_directory {
			return true;
		}
		if !self.follow_symlinks || metadata.symlink_target.is_none() {
			return false;
		}
		matches!(
			self.fs.canonicalize(path).and_then(|target| self.fs.metadata(&target)),
			Ok(target) if target.is_directory
		)
	}
}

impl Iterator for ListRecursively<'_> {
	type Item = Result<Path>;

	fn next(&mut self) -> Option<Result<Path>> {
		loop {
			let frame = self.stack.last_mut()?;
			let Some(path) = frame.entries.next() else {
				self.stack.pop();
				continue;
			};

			if self.descends(&path) {
				let canonical = self.fs.canonicalize(&path).ok();
				if let Some(canonical) = &canonical {
					let cycle = self.stack
						.iter()
						.any(|frame| frame.canonical.as_ref() == Some(canonical));
					if cycle {
						self.stack.clear();
						return Some(Err(Error::SymlinkCycle(path.to_string())));
					}
				}
				// Listings that fail mid-traversal are skipped, not raised.
				if let Ok(Some(entries)) = self.fs.list_or_null(&path) {
					self.stack.push(Frame {
						entries: entries.into_iter(),
						canonical,
					});
				}
			}
			return Some(Ok(path));
		}
	}
}
