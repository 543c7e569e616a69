// SPDX-License-Identifier: Apache-2.0

use crate::Result;
use crate::streams::{Sink, Source};
use super::{FileHandle, FileMetadata, FileSystem, Path};

type ParameterHook =
	Box<dyn Fn(&Path, &'static str, &'static str) -> Result<Path> + Send + Sync>;
type ResultHook = Box<dyn Fn(Path, &'static str) -> Result<Path> + Send + Sync>;

/// A [`FileSystem`] forwarding every operation to a delegate, with hooks to
/// rewrite the paths going in and coming out. Use it to root a filesystem in
/// a subtree, shuffle names, or observe traffic.
pub struct ForwardingFileSystem<F: FileSystem> {
	delegate: F,
	on_path_parameter: Option<ParameterHook>,
	on_path_result: Option<ResultHook>,
}

impl<F: FileSystem> ForwardingFileSystem<F> {
	pub fn new(delegate: F) -> Self {
		Self {
			delegate,
			on_path_parameter: None,
			on_path_result: None,
		}
	}

	/// Rewrites each path argument before it reaches the delegate. The hook
	/// receives the function and parameter names for context.
	pub fn on_path_parameter(
		mut self,
		hook: impl Fn(&Path, &'static str, &'static str) -> Result<Path> + Send + Sync + 'static,
	) -> Self {
		self.on_path_parameter = Some(Box::new(hook));
		self
	}

	/// Rewrites each path the delegate returns.
	pub fn on_path_result(
		mut self,
		hook: impl Fn(Path, &'static str) -> Result<Path> + Send + Sync + 'static,
	) -> Self {
		self.on_path_result = Some(Box::new(hook));
		self
	}

	pub fn delegate(&self) -> &F {
		&self.delegate
	}

	fn parameter(&self, path: &Path, function: &'static str, name: &'static str) -> Result<Path> {
		match &self.on_path_parameter {
			Some(hook) => hook(path, function, name),
			None => Ok(path.clone()),
		}
	}

	fn result(&self, path: Path, function: &'static str) -> Result<Path> {
		match &self.on_path_result {
			Some(hook) => hook(path, function),
			None => Ok(path),
		}
	}

	fn results(&self, paths: Vec<Path>, function: &'static str) -> Result<Vec<Path>> {
		paths
			.into_iter()
			.map(|path| self.result(path, function))
			.collect()
	}
}

impl<F: FileSystem> FileSystem for ForwardingFileSystem<F> {
	fn canonicalize(&self, path: &Path) -> Result<Path> {
		let path = self.parameter(path, "canonicalize", "path")?;
		self.result(self.delegate.canonicalize(&path)?, "canonicalize")
	}

	fn metadata_or_null(&self, path: &Path) -> Result<Option<FileMetadata>> {
		let path = self.parameter(path, "metadata_or_null", "path")?;
		self.delegate.metadata_or_null(&path)
	}

	fn list(&self, dir: &Path) -> Result<Vec<Path>> {
		let dir = self.parameter(dir, "list", "dir")?;
		self.results(self.delegate.list(&dir)?, "list")
	}

	fn list_or_null(&self, dir: &Path) -> Result<Option<Vec<Path>>> {
		let dir = self.parameter(dir, "list_or_null", "dir")?;
		match self.delegate.list_or_null(&dir)? {
			Some(entries) => Ok(Some(self.results(entries, "list_or_null")?)),
			None => Ok(None),
		}
	}

	fn source(&self, file: &Path) -> Result<Box<dyn Source + Send>> {
		let file = self.parameter(file, "source", "file")?;
		self.delegate.source(&file)
	}

	fn sink(&self, file: &Path, must_create: bool) -> Result<Box<dyn Sink + Send>> {
		let file = self.parameter(file, "sink", "file")?;
		self.delegate.sink(&file, must_create)
	}

	fn appending_sink(&self, file: &Path, must_exist: bool) -> Result<Box<dyn Sink + Send>> {
		let file = self.parameter(file, "appending_sink", "file")?;
		self.delegate.appending_sink(&file, must_exist)
	}

	fn open_read_only(&self, file: &Path) -> Result<FileHandle> {
		let file = self.parameter(file, "open_read_only", "file")?;
		self.delegate.open_read_only(&file)
	}

	fn open_read_write(&self, file: &Path, must_create: bool, must_exist: bool)
		-> Result<FileHandle> {
		let file = self.parameter(file, "open_read_write", "file")?;
		self.delegate.open_read_write(&file, must_create, must_exist)
	}

	fn create_directory(&self, dir: &Path, must_create: bool) -> Result {
		let dir = self.parameter(dir, "create_directory", "dir")?;
		self.delegate.create_directory(&dir, must_create)
	}

	fn atomic_move(&self, source: &Path, target: &Path) -> Result {
		let source = self.parameter(source, "atomic_move", "source")?;
		let target = self.parameter(target, "atomic_move", "target")?;
		self.delegate.atomic_move(&source, &target)
	}

	fn delete(&self, path: &Path, must_exist: bool) -> Result {
		let path = self.parameter(path, "delete", "path")?;
		self.delegate.delete(&path, must_exist)
	}

	fn create_symlink(&self, link: &Path, target: &Path) -> Result {
		let link = self.parameter(link, "create_symlink", "link")?;
		let target = self.parameter(target, "create_symlink", "target")?;
		self.delegate.create_symlink(&link, &target)
	}
}
