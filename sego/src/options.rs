// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Index;
use itertools::Itertools;
use crate::{ByteString, Result};
use crate::streams::BufSource;

/// An indexed set of byte strings compiled into a prefix trie, for selecting
/// the longest option that prefixes a stream in one forward pass.
///
/// The trie is a single flat `i32` array. A *select* node branches on one
/// byte across N children; a *scan* node compares a literal run of bytes
/// shared by every remaining option. Child offsets below zero are leaves
/// encoding a matched option as `-index - 1`.
pub struct Options {
	byte_strings: Box<[ByteString]>,
	trie: Box<[i32]>,
}

impl Options {
	/// Compiles the options into a trie. Option indices reported by
	/// [`select`](crate::streams::BufSource::select) refer to iteration order
	/// here; duplicate byte strings keep the first index.
	///
	/// # Panics
	///
	/// Panics when `options` is empty or contains the empty byte string,
	/// which would prefix everything.
	pub fn of(options: impl IntoIterator<Item = ByteString>) -> Self {
		let byte_strings: Box<[ByteString]> = options.into_iter().collect();
		assert!(!byte_strings.is_empty(), "at least one option is required");
		assert!(
			byte_strings.iter().all(|option| !option.is_empty()),
			"the empty byte string is not a supported option",
		);

		let mut sorted: Vec<(Vec<u8>, usize)> = byte_strings
			.iter()
			.enumerate()
			.map(|(index, option)| (option.to_vec(), index))
			.sorted()
			.collect();
		sorted.dedup_by(|(a, _), (b, _)| a == b);

		let mut trie = Vec::new();
		build(&mut trie, &sorted, 0);
		Self {
			byte_strings,
			trie: trie.into(),
		}
	}

	/// Returns the number of options.
	pub fn len(&self) -> usize {
		self.byte_strings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.byte_strings.is_empty()
	}

	/// Returns the option at `index`.
	pub fn get(&self, index: usize) -> Option<&ByteString> {
		self.byte_strings.get(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &ByteString> {
		self.byte_strings.iter()
	}
}

impl Index<usize> for Options {
	type Output = ByteString;

	fn index(&self, index: usize) -> &ByteString {
		&self.byte_strings[index]
	}
}

impl fmt::Debug for Options {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.byte_strings.iter()).finish()
	}
}

/// Appends the trie node covering `options`, which are sorted, distinct,
/// identical through `depth` bytes, and never shorter than `depth`. Returns
/// the node's position.
fn build(trie: &mut Vec<i32>, options: &[(Vec<u8>, usize)], depth: usize) -> i32 {
	let pos = trie.len() as i32;

	let (terminal, rest) = if options[0].0.len() == depth {
		(options[0].1 as i32, &options[1..])
	} else {
		(-1, options)
	};
	debug_assert!(
		!rest.is_empty(),
		"single-option subtrees are encoded as leaf offsets by the parent",
	);

	let groups = group_by_byte(rest, depth);

	if terminal < 0 && groups.len() == 1 {
		// Scan node: the longest literal run every option shares.
		let first = &rest[0].0;
		let mut run_len = 0;
		loop {
			let d = depth + run_len;
			if rest.iter().any(|(bytes, _)| bytes.len() <= d) {
				break;
			}
			let byte = first[d];
			if rest.iter().any(|(bytes, _)| bytes[d] != byte) {
				break;
			}
			run_len += 1;
			if rest.len() == 1 && first.len() == d + 1 {
				break;
			}
		}

		trie.push(-(run_len as i32));
		trie.push(terminal);
		for j in 0..run_len {
			trie.push(first[depth + j] as i32);
		}
		let next_slot = trie.len();
		trie.push(0);
		trie[next_slot] = if rest.len() == 1 && first.len() == depth + run_len {
			-(rest[0].1 as i32) - 1
		} else {
			build(trie, rest, depth + run_len)
		};
	} else {
		// Select node: branch on the byte at `depth`.
		trie.push(groups.len() as i32);
		trie.push(terminal);
		for &(byte, _) in &groups {
			trie.push(byte as i32);
		}
		let offsets_at = trie.len();
		trie.resize(offsets_at + groups.len(), 0);
		for (j, (_, subset)) in groups.iter().enumerate() {
			trie[offsets_at + j] = if subset.len() == 1 && subset[0].0.len() == depth + 1 {
				-(subset[0].1 as i32) - 1
			} else {
				build(trie, subset, depth + 1)
			};
		}
	}
	pos
}

fn group_by_byte(options: &[(Vec<u8>, usize)], depth: usize) -> Vec<(u8, &[(Vec<u8>, usize)])> {
	let mut groups: Vec<(u8, &[(Vec<u8>, usize)])> = Vec::new();
	let mut start = 0;
	while start < options.len() {
		let byte = options[start].0[depth];
		let end = start
			+ options[start..]
				.iter()
				.take_while(|(bytes, _)| bytes[depth] == byte)
				.count();
		groups.push((byte, &options[start..end]));
		start = end;
	}
	groups
}

/// Walks the trie against the source's coming bytes, requesting one byte at a
/// time, and consumes exactly the longest match. A mismatch consumes nothing.
pub(crate) fn select<S: BufSource + ?Sized>(
	source: &mut S,
	options: &Options,
) -> Result<Option<usize>> {
	let trie = &options.trie;
	let mut p = 0;
	let mut n = 0;
	let mut best = None;

	'walk: loop {
		let node = trie[p];
		let terminal = trie[p + 1];
		if terminal >= 0 {
			best = Some((terminal as usize, n));
		}

		if node < 0 {
			let run_len = (-node) as usize;
			for j in 0..run_len {
				let Some(byte) = peek(source, n)? else { break 'walk };
				if byte as i32 != trie[p + 2 + j] {
					break 'walk;
				}
				n += 1;
			}
			let next = trie[p + 2 + run_len];
			if next < 0 {
				best = Some(((-next - 1) as usize, n));
				break;
			}
			p = next as usize;
		} else {
			let child_count = node as usize;
			let Some(byte) = peek(source, n)? else { break };
			let mut followed = false;
			for j in 0..child_count {
				if trie[p + 2 + j] == byte as i32 {
					let offset = trie[p + 2 + child_count + j];
					n += 1;
					if offset < 0 {
						best = Some(((-offset - 1) as usize, n));
						break 'walk;
					}
					p = offset as usize;
					followed = true;
					break;
				}
			}
			if !followed {
				break;
			}
		}
	}

	match best {
		Some((index, len)) => {
			let skipped = source.skip(len)?;
			debug_assert_eq!(skipped, len, "matched bytes should be buffered");
			Ok(Some(index))
		}
		None => Ok(None),
	}
}

fn peek<S: BufSource + ?Sized>(source: &mut S, index: usize) -> Result<Option<u8>> {
	if !source.request(index + 1)? {
		return Ok(None);
	}
	Ok(source.buf().get(index))
}

#[cfg(test)]
mod test {
	use crate::{Buffer, ByteString};
	use crate::streams::BufSource;
	use super::Options;

	fn options(values: &[&str]) -> Options {
		Options::of(values.iter().copied().map(ByteString::from))
	}

	#[test]
	fn longest_match_wins() {
		let options = options(&["a", "ab", "abc"]);
		let mut buf = Buffer::from("abcd");
		assert_eq!(buf.select(&options).unwrap(), Some(2));
		assert_eq!(buf.read_all_utf8(), "d");
	}

	#[test]
	fn mismatch_consumes_nothing() {
		let options = options(&["left", "right"]);
		let mut buf = Buffer::from("middle");
		assert_eq!(buf.select(&options).unwrap(), None);
		assert_eq!(buf.len(), 6);
	}

	#[test]
	fn partial_match_falls_back_to_terminal() {
		let options = options(&["ab", "abcd"]);
		let mut buf = Buffer::from("abcx");
		assert_eq!(buf.select(&options).unwrap(), Some(0));
		assert_eq!(buf.read_all_utf8(), "cx");
	}

	#[test]
	fn duplicates_keep_the_first_index() {
		let options = options(&["dup", "dup", "other"]);
		let mut buf = Buffer::from("dup");
		assert_eq!(buf.select(&options).unwrap(), Some(0));
	}
}
