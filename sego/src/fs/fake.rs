// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use parking_lot::Mutex;
use crate::{Buffer, Error, Result};
use crate::streams::{Sink, Source};
use super::{FileHandle, FileMetadata, FileSystem, Path, RawFile};

const MAX_SYMLINK_DEPTH: usize = 40;

/// An in-memory [`FileSystem`] for tests.
///
/// Every mutation happens under one lock, so an [`atomic_move`]
/// (FileSystem::atomic_move) is observed as an instantaneous swap. The fake
/// also keeps a ledger of open files; [`check_no_open_files`]
/// (Self::check_no_open_files) asserts that a test closed everything it
/// opened.
#[derive(Clone)]
pub struct FakeFileSystem {
	inner: Arc<Inner>,
}

impl Default for FakeFileSystem {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Default)]
struct Inner {
	state: Mutex<FakeState>,
	next_open_id: AtomicU64,
}

#[derive(Default)]
struct FakeState {
	/// Canonical absolute path → element. Keys use `/` separators.
	elements: BTreeMap<String, Element>,
	open_files: Vec<OpenFile>,
}

struct OpenFile {
	id: u64,
	path: String,
	mode: &'static str,
}

#[derive(Clone)]
enum Element {
	Directory {
		created_at: SystemTime,
	},
	File {
		data: Arc<Mutex<Vec<u8>>>,
		created_at: SystemTime,
		modified_at: SystemTime,
	},
	Symlink {
		target: Path,
		created_at: SystemTime,
	},
}

impl FakeFileSystem {
	pub fn new() -> Self {
		let fake = Self { inner: Arc::new(Inner::default()) };
		fake.inner.state.lock().elements.insert(
			"/".into(),
			Element::Directory { created_at: SystemTime::now() },
		);
		fake
	}

	/// Panics unless every stream and handle opened through this filesystem
	/// has been closed. Call at the end of a test.
	pub fn check_no_open_files(&self) {
		let state = self.inner.state.lock();
		assert!(
			state.open_files.is_empty(),
			"expected 0 open files, but found: {}",
			state.open_files
				.iter()
				.map(|open| format!("{} ({})", open.path, open.mode))
				.collect::<Vec<_>>()
				.join(", "),
		);
	}

	fn track_open(&self, path: &str, mode: &'static str) -> LedgerGuard {
		let id = self.inner.next_open_id.fetch_add(1, Ordering::Relaxed);
		tracing::trace!(path, mode, "fake filesystem opened a file");
		self.inner.state.lock().open_files.push(OpenFile {
			id,
			path: path.to_owned(),
			mode,
		});
		LedgerGuard { inner: Arc::clone(&self.inner), id }
	}
}

/// Deregisters an open file when the owning stream closes.
struct LedgerGuard {
	inner: Arc<Inner>,
	id: u64,
}

impl LedgerGuard {
	fn release(&self) {
		self.inner.state.lock().open_files.retain(|open| open.id != self.id);
	}
}

fn not_a_directory(path: &Path) -> Error {
	Error::Io(io::Error::new(
		io::ErrorKind::InvalidInput,
		format!("not a directory: {path}"),
	))
}

fn already_exists(path: &Path) -> Error {
	Error::Io(io::Error::new(
		io::ErrorKind::AlreadyExists,
		format!("already exists: {path}"),
	))
}

impl FakeState {
	/// Resolves `path` to a canonical `/`-separated key, following symlinks
	/// in intermediate components always, and in the final component only
	/// with `follow_last`.
	fn canonical_key(&self, path: &Path, follow_last: bool) -> Result<String> {
		self.resolve(&Path::new("/").join(path).normalized(), follow_last, MAX_SYMLINK_DEPTH)
	}

	fn resolve(&self, absolute: &Path, follow_last: bool, depth: usize) -> Result<String> {
		let segments = absolute.segments();
		let mut resolved = Path::new("/");
		for (i, segment) in segments.iter().enumerate() {
			resolved = resolved.join_str(segment);
			let last = i + 1 == segments.len();
			if last && !follow_last {
				break;
			}
			if let Some(Element::Symlink { target, .. }) = self.elements.get(resolved.as_str()) {
				if depth == 0 {
					return Err(Error::Io(io::Error::new(
						io::ErrorKind::InvalidInput,
						format!("too many levels of symbolic links: {absolute}"),
					)));
				}
				let parent = resolved.parent().unwrap_or_else(|| Path::new("/"));
				let mut rebased = parent.join(target);
				for rest in &segments[i + 1..] {
					rebased = rebased.join_str(rest);
				}
				let rebased = Path::new("/").join(&rebased).normalized();
				return self.resolve(&rebased, follow_last, depth - 1);
			}
		}
		Ok(resolved.as_str().to_owned())
	}

	fn get(&self, key: &str) -> Option<&Element> {
		self.elements.get(key)
	}

	fn require_parent_directory(&self, key: &str) -> Result {
		let path = Path::new(key);
		let Some(parent) = path.parent() else { return Ok(()) };
		match self.get(parent.as_str()) {
			Some(Element::Directory { .. }) => Ok(()),
			Some(_) => Err(not_a_directory(&parent)),
			None => Err(Error::NotFound(parent.to_string())),
		}
	}

	fn children(&self, key: &str) -> Vec<String> {
		let prefix = if key == "/" { "/".to_owned() } else { format!("{key}/") };
		self.elements
			.range(prefix.clone()..)
			.take_while(|(k, _)| k.starts_with(&prefix))
			.filter(|(k, _)| k.as_str() != key && !k[prefix.len()..].contains('/'))
			.map(|(k, _)| k.clone())
			.collect()
	}
}

impl FileSystem for FakeFileSystem {
	fn canonicalize(&self, path: &Path) -> Result<Path> {
		let state = self.inner.state.lock();
		let key = state.canonical_key(path, true)?;
		if state.get(&key).is_none() {
			return Err(Error::NotFound(path.to_string()));
		}
		Ok(Path::new(&key))
	}

	fn metadata_or_null(&self, path: &Path) -> Result<Option<FileMetadata>> {
		let state = self.inner.state.lock();
		let key = state.canonical_key(path, false)?;
		Ok(state.get(&key).map(|element| match element {
			Element::Directory { created_at } => FileMetadata {
				created_at: Some(*created_at),
				..FileMetadata::directory()
			},
			Element::File { data, created_at, modified_at } => FileMetadata {
				created_at: Some(*created_at),
				last_modified_at: Some(*modified_at),
				..FileMetadata::file(data.lock().len() as u64)
			},
			Element::Symlink { target, created_at } => FileMetadata {
				created_at: Some(*created_at),
				..FileMetadata::symlink(target.clone())
			},
		}))
	}

	fn list(&self, dir: &Path) -> Result<Vec<Path>> {
		let state = self.inner.state.lock();
		let key = state.canonical_key(dir, true)?;
		match state.get(&key) {
			Some(Element::Directory { .. }) => Ok(state
				.children(&key)
				.into_iter()
				.map(|child| {
					let name = child.rsplit('/').next().unwrap_or_default().to_owned();
					dir.join_str(&name)
				})
				.collect()),
			Some(_) => Err(not_a_directory(dir)),
			None => Err(Error::NotFound(dir.to_string())),
		}
	}

	fn list_or_null(&self, dir: &Path) -> Result<Option<Vec<Path>>> {
		match self.list(dir) {
			Ok(entries) => Ok(Some(entries)),
			Err(Error::NotFound(_)) => Ok(None),
			Err(Error::Io(error)) if error.kind() == io::ErrorKind::InvalidInput => Ok(None),
			Err(error) => Err(error),
		}
	}

	fn source(&self, file: &Path) -> Result<Box<dyn Source + Send>> {
		let (data, ledger) = {
			let state = self.inner.state.lock();
			let key = state.canonical_key(file, true)?;
			match state.get(&key) {
				Some(Element::File { data, .. }) => (Arc::clone(data), key),
				Some(_) => return Err(not_a_directory(file)),
				None => return Err(Error::NotFound(file.to_string())),
			}
		};
		let ledger = self.track_open(&ledger, "source");
		Ok(Box::new(FakeSource {
			data,
			position: 0,
			ledger: Some(ledger),
		}))
	}

	fn sink(&self, file: &Path, must_create: bool) -> Result<Box<dyn Sink + Send>> {
		let data = self.open_for_write(file, must_create, false, true)?;
		let ledger = self.track_open(file.as_str(), "sink");
		Ok(Box::new(FakeSink { data, ledger: Some(ledger) }))
	}

	fn appending_sink(&self, file: &Path, must_exist: bool) -> Result<Box<dyn Sink + Send>> {
		let data = self.open_for_write(file, false, must_exist, false)?;
		let ledger = self.track_open(file.as_str(), "appending sink");
		Ok(Box::new(FakeSink { data, ledger: Some(ledger) }))
	}

	fn open_read_only(&self, file: &Path) -> Result<FileHandle> {
		let (data, key) = {
			let state = self.inner.state.lock();
			let key = state.canonical_key(file, true)?;
			match state.get(&key) {
				Some(Element::File { data, .. }) => (Arc::clone(data), key),
				Some(_) => return Err(not_a_directory(file)),
				None => return Err(Error::NotFound(file.to_string())),
			}
		};
		let ledger = self.track_open(&key, "read-only handle");
		Ok(FileHandle::new(
			FakeRawFile { data, ledger: Mutex::new(Some(ledger)) },
			false,
		))
	}

	fn open_read_write(&self, file: &Path, must_create: bool, must_exist: bool)
		-> Result<FileHandle> {
		assert!(
			!(must_create && must_exist),
			"must_create and must_exist are mutually exclusive",
		);
		let data = self.open_for_write(file, must_create, must_exist, false)?;
		let ledger = self.track_open(file.as_str(), "read-write handle");
		Ok(FileHandle::new(
			FakeRawFile { data, ledger: Mutex::new(Some(ledger)) },
			true,
		))
	}

	fn create_directory(&self, dir: &Path, must_create: bool) -> Result {
		let mut state = self.inner.state.lock();
		let key = state.canonical_key(dir, true)?;
		match state.get(&key) {
			Some(Element::Directory { .. }) if !must_create => return Ok(()),
			Some(_) => return Err(already_exists(dir)),
			None => {}
		}
		state.require_parent_directory(&key)?;
		state.elements.insert(key, Element::Directory { created_at: SystemTime::now() });
		Ok(())
	}

	fn atomic_move(&self, source: &Path, target: &Path) -> Result {
		let mut state = self.inner.state.lock();
		let source_key = state.canonical_key(source, false)?;
		let target_key = state.canonical_key(target, false)?;
		if state.get(&source_key).is_none() {
			return Err(Error::NotFound(source.to_string()));
		}
		state.require_parent_directory(&target_key)?;

		match state.get(&target_key) {
			Some(Element::Directory { .. }) if !state.children(&target_key).is_empty() => {
				return Err(already_exists(target));
			}
			_ => {}
		}

		// One lock holds both ends, so observers see the swap or nothing.
		let moved = state.elements.remove(&source_key).expect("presence checked above");
		state.elements.remove(&target_key);
		if matches!(moved, Element::Directory { .. }) {
			let prefix = format!("{source_key}/");
			let descendants: Vec<String> = state.elements
				.range(prefix.clone()..)
				.take_while(|(k, _)| k.starts_with(&prefix))
				.map(|(k, _)| k.clone())
				.collect();
			for old_key in descendants {
				let element = state.elements.remove(&old_key).expect("key listed above");
				let new_key = format!("{target_key}{}", &old_key[source_key.len()..]);
				state.elements.insert(new_key, element);
			}
		}
		state.elements.insert(target_key, moved);
		Ok(())
	}

	fn delete(&self, path: &Path, must_exist: bool) -> Result {
		let mut state = self.inner.state.lock();
		let key = state.canonical_key(path, false)?;
		match state.get(&key) {
			None => {
				if must_exist {
					Err(Error::NotFound(path.to_string()))
				} else {
					Ok(())
				}
			}
			Some(Element::Directory { .. }) if !state.children(&key).is_empty() => {
				Err(Error::Io(io::Error::new(
					io::ErrorKind::InvalidInput,
					format!("directory not empty: {path}"),
				)))
			}
			Some(_) => {
				state.elements.remove(&key);
				Ok(())
			}
		}
	}

	fn create_symlink(&self, link: &Path, target: &Path) -> Result {
		let mut state = self.inner.state.lock();
		let key = state.canonical_key(link, false)?;
		if state.get(&key).is_some() {
			return Err(already_exists(link));
		}
		state.require_parent_directory(&key)?;
		state.elements.insert(key, Element::Symlink {
			target: target.clone(),
			created_at: SystemTime::now(),
		});
		Ok(())
	}
}

impl FakeFileSystem {
	fn open_for_write(
		&self,
		file: &Path,
		must_create: bool,
		must_exist: bool,
		truncate: bool,
	) -> Result<Arc<Mutex<Vec<u8>>>> {
		let mut state = self.inner.state.lock();
		let key = state.canonical_key(file, true)?;
		match state.get(&key) {
			Some(Element::File { data, .. }) => {
				if must_create {
					return Err(already_exists(file));
				}
				let data = Arc::clone(data);
				if truncate {
					data.lock().clear();
				}
				Ok(data)
			}
			Some(_) => Err(not_a_directory(file)),
			None => {
				if must_exist {
					return Err(Error::NotFound(file.to_string()));
				}
				state.require_parent_directory(&key)?;
				let data = Arc::new(Mutex::new(Vec::new()));
				let now = SystemTime::now();
				state.elements.insert(key, Element::File {
					data: Arc::clone(&data),
					created_at: now,
					modified_at: now,
				});
				Ok(data)
			}
		}
	}
}

struct FakeSource {
	data: Arc<Mutex<Vec<u8>>>,
	position: usize,
	ledger: Option<LedgerGuard>,
}

impl Source for FakeSource {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.ledger.is_none() {
			return Err(Error::Closed);
		}
		let data = self.data.lock();
		let remaining = data.len().saturating_sub(self.position);
		let n = byte_count.min(remaining);
		if n == 0 {
			return Ok(0);
		}
		sink.write_slice(&data[self.position..self.position + n])?;
		self.position += n;
		Ok(n)
	}

	fn close(&mut self) -> Result {
		if let Some(ledger) = self.ledger.take() {
			ledger.release();
		}
		Ok(())
	}
}

impl Drop for FakeSource {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

struct FakeSink {
	data: Arc<Mutex<Vec<u8>>>,
	ledger: Option<LedgerGuard>,
}

impl Sink for FakeSink {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		if self.ledger.is_none() {
			return Err(Error::Closed);
		}
		assert!(
			byte_count <= source.len(),
			"byte_count ({byte_count}) exceeds source size ({})", source.len(),
		);
		let mut data = self.data.lock();
		source.read_segments(byte_count, |bytes| {
			data.extend_from_slice(bytes);
			bytes.len()
		});
		Ok(())
	}

	fn close(&mut self) -> Result {
		if let Some(ledger) = self.ledger.take() {
			ledger.release();
		}
		Ok(())
	}
}

impl Drop for FakeSink {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

struct FakeRawFile {
	data: Arc<Mutex<Vec<u8>>>,
	ledger: Mutex<Option<LedgerGuard>>,
}

impl RawFile for FakeRawFile {
	fn size(&self) -> Result<u64> {
		Ok(self.data.lock().len() as u64)
	}

	fn resize(&self, size: u64) -> Result {
		self.data.lock().resize(size as usize, 0);
		Ok(())
	}

	fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize> {
		let data = self.data.lock();
		let offset = offset.min(data.len() as u64) as usize;
		let n = dst.len().min(data.len() - offset);
		dst[..n].copy_from_slice(&data[offset..offset + n]);
		Ok(n)
	}

	fn write_at(&self, offset: u64, src: &[u8]) -> Result {
		let mut data = self.data.lock();
		let end = offset as usize + src.len();
		if data.len() < end {
			data.resize(end, 0);
		}
		data[offset as usize..end].copy_from_slice(src);
		Ok(())
	}

	fn flush(&self) -> Result {
		Ok(())
	}

	fn close(&self) -> Result {
		if let Some(ledger) = self.ledger.lock().take() {
			ledger.release();
		}
		Ok(())
	}
}
