//! Location of a compressed block inside a [`SegmentPool`](super::SegmentPool)
//!
//! A handle is a `(segment, offset)` pair: the index of a segment in the pool
//! and the word offset of the block header inside that segment. The 64-bit
//! form used in block headers and persisted metadata is
//! `segment << 32 | offset`, a fixed 32/32 split.

use std::fmt;

/// Segment index marking "no block"
pub const UNDEFINED_SEGMENT: u32 = u32::MAX;

/// 64-bit encoding of the undefined handle
pub const UNDEFINED_POINTER: u64 = u64::MAX;

const OFFSET_BITS: u32 = 32;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHandle {
    segment: u32,
    offset: u32,
}

impl BlockHandle {
    /// Only the pool hands out handles
    pub(crate) fn new(segment: u32, offset: u32) -> Self {
        debug_assert_ne!(segment, UNDEFINED_SEGMENT);
        Self { segment, offset }
    }

    #[inline]
    pub fn segment(self) -> u32 {
        self.segment
    }

    #[inline]
    pub fn offset(self) -> u32 {
        self.offset
    }

    /// Encode to the persisted 64-bit form
    #[inline]
    pub fn to_raw(self) -> u64 {
        ((self.segment as u64) << OFFSET_BITS) | self.offset as u64
    }

    /// Encode an optional handle, mapping `None` to [`UNDEFINED_POINTER`]
    #[inline]
    pub fn encode(handle: Option<BlockHandle>) -> u64 {
        handle.map_or(UNDEFINED_POINTER, BlockHandle::to_raw)
    }

    /// Decode the persisted 64-bit form; any value whose segment half is
    /// [`UNDEFINED_SEGMENT`] decodes to `None`.
    ///
    /// Decoding does not check the handle against a pool; the pool validates
    /// handles when they are dereferenced.
    #[inline]
    pub fn decode(raw: u64) -> Option<BlockHandle> {
        let segment = (raw >> OFFSET_BITS) as u32;
        if segment == UNDEFINED_SEGMENT {
            None
        } else {
            Some(Self {
                segment,
                offset: (raw & OFFSET_MASK) as u32,
            })
        }
    }

    /// Decode the two header words written by the pool
    #[inline]
    pub(crate) fn from_words(segment: u32, offset: u32) -> Option<BlockHandle> {
        (segment != UNDEFINED_SEGMENT).then_some(Self { segment, offset })
    }
}

impl fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHandle({}:{})", self.segment, self.offset)
    }
}
