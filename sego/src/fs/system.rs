// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File, OpenOptions};
use std::io;
use cfg_if::cfg_if;
use itertools::Itertools;
use crate::{Error, ReaderSource, Result, WriterSink};
use crate::streams::{Sink, Source};
use super::{FileHandle, FileMetadata, FileSystem, Path, RawFile};

/// The host filesystem.
pub const SYSTEM: SystemFileSystem = SystemFileSystem;

/// A [`FileSystem`] backed by the host through [`std::fs`], with positional
/// file access through the platform's pread/pwrite equivalents.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
	fn canonicalize(&self, path: &Path) -> Result<Path> {
		Ok(Path::from_std(&fs::canonicalize(path.to_std_path())?))
	}

	fn metadata_or_null(&self, path: &Path) -> Result<Option<FileMetadata>> {
		let metadata = match fs::symlink_metadata(path.to_std_path()) {
			Ok(metadata) => metadata,
			Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(error) => return Err(error.into()),
		};
		let file_type = metadata.file_type();
		let symlink_target = if file_type.is_symlink() {
			fs::read_link(path.to_std_path())
				.ok()
				.map(|target| Path::from_std(&target))
		} else {
			None
		};
		Ok(Some(FileMetadata {
			is_regular_file: file_type.is_file(),
			is_directory: file_type.is_dir(),
			symlink_target,
			size: Some(metadata.len()),
			created_at: metadata.created().ok(),
			last_modified_at: metadata.modified().ok(),
			last_accessed_at: metadata.accessed().ok(),
			extras: Default::default(),
		}))
	}

	fn list(&self, dir: &Path) -> Result<Vec<Path>> {
		let entries = fs::read_dir(dir.to_std_path())?
			.map(|entry| entry.map(|e| dir.join_str(&e.file_name().to_string_lossy())))
			.collect::<io::Result<Vec<Path>>>()?;
		Ok(entries.into_iter().sorted().collect())
	}

	fn list_or_null(&self, dir: &Path) -> Result<Option<Vec<Path>>> {
		match fs::metadata(dir.to_std_path()) {
			Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(error) => Err(error.into()),
			Ok(metadata) if !metadata.is_dir() => Ok(None),
			Ok(_) => self.list(dir).map(Some),
		}
	}

	fn source(&self, file: &Path) -> Result<Box<dyn Source + Send>> {
		let file = File::open(file.to_std_path())?;
		Ok(Box::new(ReaderSource::new(file)))
	}

	fn sink(&self, file: &Path, must_create: bool) -> Result<Box<dyn Sink + Send>> {
		let file = OpenOptions::new()
			.write(true)
			.truncate(true)
			.create(!must_create)
			.create_new(must_create)
			.open(file.to_std_path())?;
		Ok(Box::new(WriterSink::new(file)))
	}

	fn appending_sink(&self, file: &Path, must_exist: bool) -> Result<Box<dyn Sink + Send>> {
		let file = OpenOptions::new()
			.append(true)
			.create(!must_exist)
			.open(file.to_std_path())?;
		Ok(Box::new(WriterSink::new(file)))
	}

	fn open_read_only(&self, file: &Path) -> Result<FileHandle> {
		let file = File::open(file.to_std_path())?;
		Ok(FileHandle::new(SystemRawFile { file }, false))
	}

	fn open_read_write(&self, file: &Path, must_create: bool, must_exist: bool)
		-> Result<FileHandle> {
		assert!(
			!(must_create && must_exist),
			"must_create and must_exist are mutually exclusive",
		);
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(!must_exist && !must_create)
			.create_new(must_create)
			.open(file.to_std_path())?;
		Ok(FileHandle::new(SystemRawFile { file }, true))
	}

	fn create_directory(&self, dir: &Path, must_create: bool) -> Result {
		match fs::create_dir(dir.to_std_path()) {
			Ok(()) => Ok(()),
			Err(error) if error.kind() == io::ErrorKind::AlreadyExists && !must_create => {
				if self.metadata(dir)?.is_directory {
					Ok(())
				} else {
					Err(error.into())
				}
			}
			Err(error) => Err(error.into()),
		}
	}

	fn atomic_move(&self, source: &Path, target: &Path) -> Result {
		Ok(fs::rename(source.to_std_path(), target.to_std_path())?)
	}

	fn delete(&self, path: &Path, must_exist: bool) -> Result {
		let metadata = match fs::symlink_metadata(path.to_std_path()) {
			Ok(metadata) => metadata,
			Err(error) if error.kind() == io::ErrorKind::NotFound => {
				return if must_exist {
					Err(Error::NotFound(path.to_string()))
				} else {
					Ok(())
				};
			}
			Err(error) => return Err(error.into()),
		};
		if metadata.file_type().is_dir() {
			Ok(fs::remove_dir(path.to_std_path())?)
		} else {
			Ok(fs::remove_file(path.to_std_path())?)
		}
	}

	fn create_symlink(&self, link: &Path, target: &Path) -> Result {
		cfg_if! {
			if #[cfg(unix)] {
				Ok(std::os::unix::fs::symlink(target.to_std_path(), link.to_std_path())?)
			} else if #[cfg(windows)] {
				Ok(std::os::windows::fs::symlink_file(target.to_std_path(), link.to_std_path())?)
			} else {
				let _ = (link, target);
				Err(Error::Unsupported("symlinks are not supported on this platform"))
			}
		}
	}
}

struct SystemRawFile {
	file: File,
}

impl RawFile for SystemRawFile {
	fn size(&self) -> Result<u64> {
		Ok(self.file.metadata()?.len())
	}

	fn resize(&self, size: u64) -> Result {
		Ok(self.file.set_len(size)?)
	}

	fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<usize> {
		cfg_if! {
			if #[cfg(unix)] {
				use std::os::unix::fs::FileExt;
				Ok(self.file.read_at(dst, offset)?)
			} else if #[cfg(windows)] {
				use std::os::windows::fs::FileExt;
				Ok(self.file.seek_read(dst, offset)?)
			} else {
				let _ = (offset, dst);
				Err(Error::Unsupported("positional reads are not supported on this platform"))
			}
		}
	}

	fn write_at(&self, offset: u64, src: &[u8]) -> Result {
		cfg_if! {
			if #[cfg(unix)] {
				use std::os::unix::fs::FileExt;
				Ok(self.file.write_all_at(src, offset)?)
			} else if #[cfg(windows)] {
				use std::os::windows::fs::FileExt;
				let mut written = 0;
				while written < src.len() {
					written += self.file.seek_write(&src[written..], offset + written as u64)?;
				}
				Ok(())
			} else {
				let _ = (offset, src);
				Err(Error::Unsupported("positional writes are not supported on this platform"))
			}
		}
	}

	fn flush(&self) -> Result {
		Ok(self.file.sync_all()?)
	}
}
