// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Div;
use std::str::FromStr;
use cfg_if::cfg_if;
use crate::{ByteString, Error, Result};

cfg_if! {
	if #[cfg(windows)] {
		const DIRECTORY_SEPARATOR: u8 = b'\\';
	} else {
		const DIRECTORY_SEPARATOR: u8 = b'/';
	}
}

/// A normalized, platform-neutral filename.
///
/// Both separator styles parse on every platform; a path keeps the dominant
/// style of its input. Duplicate separators collapse, `.` components drop,
/// and trailing separators trim at construction. `..` components stay
/// literal until [`normalized`](Self::normalized) resolves them — and one
/// that would climb past the root stays literal even then.
///
/// Recognized roots: `/`, `\`, `\\host\share` (UNC), `C:\` and the
/// drive-relative `C:`, and `\\?\` long paths through the UNC form.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Path {
	bytes: ByteString,
}

fn is_slash(byte: u8) -> bool {
	byte == b'/' || byte == b'\\'
}

impl Path {
	/// Parses a path, accepting both separator styles.
	pub fn new(path: &str) -> Self {
		Self::parse_bytes(path.as_bytes(), false)
	}

	/// Converts a host path.
	pub fn from_std(path: &std::path::Path) -> Self {
		Self::new(&path.to_string_lossy())
	}

	/// Converts to a host path.
	pub fn to_std_path(&self) -> std::path::PathBuf {
		std::path::PathBuf::from(self.as_str().to_owned())
	}

	fn parse_bytes(input: &[u8], normalize: bool) -> Self {
		let slash = input
			.iter()
			.copied()
			.find(|&b| is_slash(b))
			.unwrap_or(DIRECTORY_SEPARATOR);

		let mut prefix = Vec::new();
		let lead = input.iter().take_while(|&&b| is_slash(b)).count();
		if lead >= 2 && slash == b'\\' {
			prefix.extend_from_slice(b"\\\\");
		} else if lead >= 1 {
			prefix.push(slash);
		}

		let mut index = lead;
		if prefix.is_empty()
			&& input.len() >= index + 2
			&& input[index].is_ascii_alphabetic()
			&& input[index + 1] == b':'
		{
			prefix.push(input[index]);
			prefix.push(b':');
			index += 2;
			if input.get(index).copied().is_some_and(is_slash) {
				prefix.push(slash);
				index += input[index..].iter().take_while(|&&b| is_slash(b)).count();
			}
		}

		let mut components: Vec<&[u8]> = Vec::new();
		for part in input[index..].split(|&b| is_slash(b)) {
			match part {
				b"" | b"." => {}
				b".." if normalize => match components.last() {
					Some(&last) if last != b".." => {
						components.pop();
					}
					// At the top, a `..` stays literal: climbing a root
					// cannot resolve, and a relative path must remember the
					// climb.
					_ => components.push(part),
				},
				_ => components.push(part),
			}
		}

		let mut bytes = prefix;
		for (i, component) in components.iter().enumerate() {
			if i > 0 {
				bytes.push(slash);
			}
			bytes.extend_from_slice(component);
		}
		if bytes.is_empty() {
			bytes.push(b'.');
		}

		Self { bytes: bytes.into() }
	}

	fn bytes(&self) -> &[u8] {
		self.bytes
			.as_flat_slice()
			.expect("paths are flat byte strings")
	}

	/// Returns the path as text.
	pub fn as_str(&self) -> &str {
		self.bytes.utf8()
	}

	/// Returns the underlying bytes.
	pub fn as_byte_string(&self) -> &ByteString {
		&self.bytes
	}

	/// Returns the separator this path uses.
	pub fn slash(&self) -> u8 {
		if self.bytes().contains(&b'\\') {
			b'\\'
		} else {
			b'/'
		}
	}

	/// Returns the length of the root prefix, or `None` for relative paths.
	fn root_length(&self) -> Option<usize> {
		let bytes = self.bytes();
		match bytes {
			[b'\\', b'\\', ..] => Some(2),
			[s, ..] if is_slash(*s) => Some(1),
			[drive, b':', s, ..] if drive.is_ascii_alphabetic() && is_slash(*s) => Some(3),
			_ => None,
		}
	}

	/// Bytes that can never be part of a name: the root, or a drive-relative
	/// `C:` prefix.
	fn prefix_length(&self) -> usize {
		self.root_length()
			.unwrap_or_else(|| if self.volume_letter().is_some() { 2 } else { 0 })
	}

	/// Returns this path's root, or `None` for relative paths.
	pub fn root(&self) -> Option<Path> {
		let len = self.root_length()?;
		Some(Self { bytes: self.bytes()[..len].into() })
	}

	/// Returns `true` when the path starts at a root.
	pub fn is_absolute(&self) -> bool {
		self.root_length().is_some()
	}

	pub fn is_relative(&self) -> bool {
		!self.is_absolute()
	}

	/// Returns `true` when the path is exactly a root.
	pub fn is_root(&self) -> bool {
		self.root_length() == Some(self.bytes().len())
	}

	/// Returns the Windows volume letter, on `C:\` and drive-relative `C:`
	/// forms alike.
	pub fn volume_letter(&self) -> Option<char> {
		match self.bytes() {
			[drive, b':', ..] if drive.is_ascii_alphabetic() => Some(*drive as char),
			_ => None,
		}
	}

	/// Returns the last component, or `""` for a root.
	pub fn name(&self) -> &str {
		let bytes = self.bytes();
		let prefix = self.prefix_length();
		let start = bytes[prefix..]
			.iter()
			.rposition(|&b| is_slash(b))
			.map_or(prefix, |i| prefix + i + 1);
		std::str::from_utf8(&bytes[start..]).unwrap_or("")
	}

	/// Returns the components after the root.
	pub fn segments(&self) -> Vec<String> {
		let prefix = self.prefix_length();
		self.bytes()[prefix..]
			.split(|&b| is_slash(b))
			.filter(|part| !part.is_empty())
			.map(|part| String::from_utf8_lossy(part).into_owned())
			.collect()
	}

	/// Returns the path without its last component: `None` for roots, single
	/// relative components, and `.`.
	pub fn parent(&self) -> Option<Path> {
		let bytes = self.bytes();
		if self.is_root() || bytes == b"." {
			return None;
		}
		let prefix = self.prefix_length();
		match bytes[prefix..].iter().rposition(|&b| is_slash(b)) {
			Some(i) => Some(Self { bytes: bytes[..prefix + i].into() }),
			None if prefix > 0 => Some(Self { bytes: bytes[..prefix].into() }),
			None => None,
		}
	}

	/// Resolves `child` against this path: an absolute or drive-lettered
	/// child wins outright, anything else is appended and re-parsed.
	pub fn join(&self, child: &Path) -> Path {
		if child.is_absolute() || child.volume_letter().is_some() {
			return child.clone();
		}
		let mut bytes = self.bytes().to_vec();
		bytes.push(self.slash());
		bytes.extend_from_slice(child.bytes());
		Self::parse_bytes(&bytes, false)
	}

	/// [`join`](Self::join) with a string child.
	pub fn join_str(&self, child: &str) -> Path {
		self.join(&Path::new(child))
	}

	/// Resolves `.` and `..` components. A `..` that would climb past the
	/// root stays literal.
	pub fn normalized(&self) -> Path {
		Self::parse_bytes(self.bytes(), true)
	}

	/// Returns this path expressed relative to `other`, following the
	/// `java.nio` convention: both paths must share a root (or volume
	/// letter), and after dropping the common prefix the base may not retain
	/// unresolved `..` components.
	pub fn relative_to(&self, other: &Path) -> Result<Path> {
		let target = self.normalized();
		let base = other.normalized();

		let compatible = match (target.root(), base.root()) {
			(Some(a), Some(b)) => a == b,
			(None, None) => target.volume_letter() == base.volume_letter(),
			_ => false,
		};
		if !compatible {
			return Err(self.relativize_error(other));
		}

		let target_segments = target.segments();
		let base_segments = base.segments();
		let common = target_segments
			.iter()
			.zip(&base_segments)
			.take_while(|(a, b)| a == b)
			.count();
		if base_segments[common..].iter().any(|segment| segment == "..") {
			return Err(self.relativize_error(other));
		}

		let slash = char::from(target.slash()).to_string();
		let mut parts: Vec<&str> = Vec::new();
		for _ in common..base_segments.len() {
			parts.push("..");
		}
		parts.extend(target_segments[common..].iter().map(String::as_str));
		if parts.is_empty() {
			return Ok(Path::new("."));
		}
		Ok(Path::new(&parts.join(&slash)))
	}

	fn relativize_error(&self, other: &Path) -> Error {
		Error::PathRelativize(format!("{self} is not relative to {other}"))
	}
}

impl From<&str> for Path {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl FromStr for Path {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self::new(s))
	}
}

impl Div<&str> for &Path {
	type Output = Path;

	fn div(self, child: &str) -> Path {
		self.join_str(child)
	}
}

impl Div<&Path> for &Path {
	type Output = Path;

	fn div(self, child: &Path) -> Path {
		self.join(child)
	}
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl fmt::Debug for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Path({})", self.as_str())
	}
}
