// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use crate::Buffer;
use crate::segment::{Block, Segment};

/// The segmented byte string representation: parallel arrays of aliased
/// blocks and a directory of cumulative end offsets plus each block's start
/// position. A snapshot of a buffer lands here without copying a byte.
#[derive(Clone)]
pub(crate) struct Segmented {
	blocks: Box<[Arc<Block>]>,
	/// `(cumulative end offset, start position within the block)` per block.
	directory: Box<[(usize, usize)]>,
}

impl Segmented {
	pub(crate) fn collect<'s>(
		segments: impl Iterator<Item = &'s Segment>,
		len: usize,
	) -> Self {
		let mut blocks = Vec::new();
		let mut directory = Vec::new();
		let mut end = 0;
		for seg in segments {
			end += seg.len();
			blocks.push(Arc::clone(seg.block()));
			directory.push((end, seg.pos()));
		}
		debug_assert_eq!(end, len, "directory should cover the snapshot length");
		Self {
			blocks: blocks.into(),
			directory: directory.into(),
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.directory.last().map_or(0, |&(end, _)| end)
	}

	/// Returns the live bytes of block `index`, or `None` past the last.
	pub(crate) fn chunk(&self, index: usize) -> Option<&[u8]> {
		let &(end, pos) = self.directory.get(index)?;
		let start = if index == 0 { 0 } else { self.directory[index - 1].0 };
		Some(&self.blocks[index][pos..pos + (end - start)])
	}

	pub(crate) fn as_single_chunk(&self) -> Option<&[u8]> {
		match self.directory.len() {
			0 => Some(&[]),
			1 => self.chunk(0),
			_ => None,
		}
	}

	/// Returns the byte at `offset`, found by binary search over the
	/// directory's cumulative ends.
	pub(crate) fn get(&self, offset: usize) -> u8 {
		debug_assert!(offset < self.len());
		let index = self.directory
			.partition_point(|&(end, _)| end <= offset);
		let start = if index == 0 { 0 } else { self.directory[index - 1].0 };
		let pos = self.directory[index].1;
		self.blocks[index][pos + (offset - start)]
	}

	/// Transfers every block into `buf` as a shared segment.
	pub(crate) fn push_into(&self, buf: &mut Buffer) {
		let mut start = 0;
		for (index, &(end, pos)) in self.directory.iter().enumerate() {
			let block = Arc::clone(&self.blocks[index]);
			buf.push_segment(Segment::from_block(block, pos, pos + (end - start)));
			start = end;
		}
	}
}
