// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

pub type Result<T = ()> = result::Result<T, Error>;

/// The error type for stream, buffer, timeout and filesystem operations.
///
/// Programmer errors (negative counts, out-of-range offsets, mutually
/// exclusive flags) are contract violations and panic instead; every
/// data-dependent or environmental failure is a variant here.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Generic IO failure.
	#[error("IO error")]
	Io(#[source] io::Error),
	/// A path that was required to exist does not.
	#[error("file not found: {0}")]
	NotFound(String),
	/// The stream ended in the middle of a typed read. Some reads attach a
	/// diagnostic detail, like the hex preview of an unterminated line.
	#[error("{}", eof_message(.0))]
	Eof(Option<String>),
	/// An idle timeout or deadline elapsed during a blocking operation. If the
	/// operation also failed on its own, that failure is kept as the cause.
	#[error("timeout")]
	TimedOut {
		#[source]
		cause: Option<Box<Error>>,
	},
	/// The calling thread was interrupted while blocked.
	#[error("interrupted")]
	Interrupted,
	/// Operation on a closed stream, handle, or filesystem.
	#[error("closed")]
	Closed,
	/// A numeric literal was malformed or out of range.
	#[error("number format: {0}")]
	NumberFormat(String),
	/// Directory traversal revisited a directory through a symlink.
	#[error("symlink cycle at {0}")]
	SymlinkCycle(String),
	/// Two paths have no common root to relativize against.
	#[error("cannot relativize: {0}")]
	PathRelativize(String),
	/// The underlying platform cannot provide the capability.
	#[error("unsupported: {0}")]
	Unsupported(&'static str),
}

impl Error {
	/// Creates a timeout error with no underlying cause.
	pub fn timed_out() -> Self {
		Self::TimedOut { cause: None }
	}

	/// Creates a timeout error wrapping the failure observed while the
	/// operation was being interrupted.
	pub fn timed_out_with(cause: Error) -> Self {
		Self::TimedOut { cause: Some(Box::new(cause)) }
	}

	/// Returns `true` for [`Error::Eof`].
	pub fn is_eof(&self) -> bool {
		matches!(self, Self::Eof(_))
	}

	/// Returns `true` for [`Error::TimedOut`].
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::TimedOut { .. })
	}

	/// Returns the source downcast into an IO error, if any.
	pub fn io_source(&self) -> Option<&io::Error> {
		if let Self::Io(source) = self {
			Some(source)
		} else {
			None
		}
	}
}

fn eof_message(detail: &Option<String>) -> String {
	match detail {
		Some(detail) => format!("premature end of stream: {detail}"),
		None => "premature end of stream".to_owned(),
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		match value.kind() {
			io::ErrorKind::NotFound => Self::NotFound(value.to_string()),
			io::ErrorKind::UnexpectedEof => Self::Eof(None),
			io::ErrorKind::TimedOut => Self::timed_out(),
			io::ErrorKind::Interrupted => Self::Interrupted,
			_ => Self::Io(value),
		}
	}
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		match &value {
			Error::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
			Error::Eof(_) => io::Error::new(io::ErrorKind::UnexpectedEof, value),
			Error::TimedOut { .. } => io::Error::new(io::ErrorKind::TimedOut, value),
			Error::Interrupted => io::Error::new(io::ErrorKind::Interrupted, value),
			Error::Io(source) => io::Error::new(source.kind(), value),
			_ => io::Error::other(value),
		}
	}
}
