//! segdex - a compressed inverted-index engine
//!
//! This library provides:
//! - A bidirectional term dictionary with dense, never-reused term ids
//! - PForDelta block compression (128 integers per block) with patched exceptions
//! - An append-only segment pool storing compressed blocks as per-term linked lists
//! - Per-term staging buffers that drain into the pool in whole blocks
//! - Multi-term AND retrieval via SvS intersection with galloping search
//! - Whole-index save/load over any `Read`/`Write`

pub mod error;
pub mod index;
pub mod query;
pub mod structures;

pub use error::{Error, Result};

pub use index::{
    IndexConfig, IndexStats, InvertedIndex, ListOrder, Posting, PostingsMeta, SharedIndex,
};

pub use query::{PostingCursor, TermPostings, gallop_search, intersect, intersect_into};

pub use structures::{
    BLOCK_SIZE, BlockHandle, BlockHeader, DeltaMode, MAX_BLOCK_WORDS, MAX_POOL_SIZE, SegmentPool,
    TermDictionary, UNDEFINED_POINTER, UNDEFINED_SEGMENT,
};

/// Document (or conjunction) identifier.
pub type DocId = u32;
/// Per-posting score. Scores are integers; any quantization happens upstream.
pub type Score = u32;
/// Dense term identifier issued by the [`TermDictionary`].
pub type TermId = u32;

/// Sentinel marking the logical end of a partially filled result buffer.
/// Never a valid document id.
pub const TERMINAL_DOCID: DocId = u32::MAX;
