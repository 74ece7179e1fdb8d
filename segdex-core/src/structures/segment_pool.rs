//! Append-only arena of fixed-capacity segments holding compressed blocks
//!
//! Each block stores its docids and scores as two PForDelta streams behind a
//! small header, and carries the handle of the next block of the same term so
//! every term's postings form a singly linked list through the pool.
//!
//! Block layout (32-bit words):
//! ```text
//! [0] total block size in words
//! [1] next block segment, or UNDEFINED_SEGMENT
//! [2] next block offset
//! [3] boundary docid (last docid of the block in traversal order)
//! [4] element count (< BLOCK_SIZE only for a partial block)
//! [5] docid payload size
//!     docid payload
//!     score payload size
//!     score payload
//! ```
//!
//! Segments are allocated lazily, never resized and never freed while the pool
//! lives. A segment that cannot fit the next block is sealed and a fresh one
//! begun, so a handle stays valid for the lifetime of the pool.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::block_handle::{BlockHandle, UNDEFINED_SEGMENT};
use super::pfor_delta::{DeltaMode, MAX_ENCODED_WORDS, decode_block, encode_block};
use crate::structures::BLOCK_SIZE;
use crate::{DocId, Error, Result, Score};

/// Default segment capacity in words (4 MiB per segment)
pub const MAX_POOL_SIZE: usize = 1 << 20;

/// Fixed header words in front of the docid payload
pub const BLOCK_HEADER_WORDS: usize = 6;

/// Largest block the pool can be asked to store
pub const MAX_BLOCK_WORDS: usize = BLOCK_HEADER_WORDS + MAX_ENCODED_WORDS + 1 + MAX_ENCODED_WORDS;

/// Magic number for persisted pools ("POOL" in LE)
pub const POOL_MAGIC: u32 = 0x4C4F_4F50;

/// Persisted pool format version
pub const POOL_FORMAT_VERSION: u32 = 1;

const SIZE_WORD: usize = 0;
const NEXT_SEGMENT_WORD: usize = 1;
const NEXT_OFFSET_WORD: usize = 2;
const BOUNDARY_WORD: usize = 3;
const COUNT_WORD: usize = 4;
const DOC_LEN_WORD: usize = 5;

/// Order in which a term's blocks are linked and read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Oldest block first; docids ascend along the list
    #[default]
    Forward,
    /// Newest block first; docids descend along the list
    Reverse,
}

impl ListOrder {
    /// Delta coding used for docid streams in this order
    #[inline]
    pub fn delta_mode(self) -> DeltaMode {
        match self {
            ListOrder::Forward => DeltaMode::Forward,
            ListOrder::Reverse => DeltaMode::Reverse,
        }
    }

    /// True if `a` comes strictly before `b` when walking a list
    #[inline]
    pub fn precedes(self, a: DocId, b: DocId) -> bool {
        match self {
            ListOrder::Forward => a < b,
            ListOrder::Reverse => a > b,
        }
    }

    fn to_flag(self) -> u8 {
        match self {
            ListOrder::Forward => 0,
            ListOrder::Reverse => 1,
        }
    }

    fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(ListOrder::Forward),
            1 => Ok(ListOrder::Reverse),
            other => Err(Error::Corruption(format!("unknown list order flag {}", other))),
        }
    }
}

/// Decoded block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total block size in words
    pub size: usize,
    /// Next block of the same list
    pub next: Option<BlockHandle>,
    /// Last docid of the block in traversal order
    pub boundary_docid: DocId,
    /// Number of postings in the block
    pub count: usize,
    /// Words of compressed docids
    pub doc_words: usize,
    /// Words of compressed scores
    pub score_words: usize,
}

impl BlockHeader {
    /// True for the ragged tail block of a list
    pub fn is_partial(&self) -> bool {
        self.count < BLOCK_SIZE
    }
}

pub struct SegmentPool {
    segments: Vec<Box<[u32]>>,
    segment_capacity: usize,
    /// Fill level of the last segment
    offset: usize,
    order: ListOrder,
    scratch: Vec<u32>,
}

impl SegmentPool {
    /// Create an empty pool. Fails if a worst-case block would not fit an
    /// empty segment.
    pub fn new(segment_capacity: usize, order: ListOrder) -> Result<Self> {
        if segment_capacity < MAX_BLOCK_WORDS {
            return Err(Error::Config(format!(
                "segment capacity {} words cannot hold a worst-case block of {} words",
                segment_capacity, MAX_BLOCK_WORDS
            )));
        }
        if segment_capacity > u32::MAX as usize {
            return Err(Error::Config(format!(
                "segment capacity {} words exceeds the 32-bit offset range",
                segment_capacity
            )));
        }
        Ok(Self {
            segments: Vec::new(),
            segment_capacity,
            offset: 0,
            order,
            scratch: Vec::with_capacity(MAX_BLOCK_WORDS),
        })
    }

    pub fn order(&self) -> ListOrder {
        self.order
    }

    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Words handed out so far, counting sealed segments in full
    pub fn words_used(&self) -> usize {
        match self.segments.len() {
            0 => 0,
            n => (n - 1) * self.segment_capacity + self.offset,
        }
    }

    /// Bytes held by allocated segments
    pub fn memory_bytes(&self) -> usize {
        self.segments.len() * self.segment_capacity * std::mem::size_of::<u32>()
    }

    /// Compress one block of postings and link it into a list.
    ///
    /// `docids` must be strictly ascending and hold 1..=BLOCK_SIZE entries;
    /// `scores` runs parallel to it. For forward pools the block is appended
    /// after `previous` (the list's current tail); for reverse pools it is
    /// prepended in front of `previous` (the list's current head). Returns the
    /// handle of the new block.
    pub fn compress_and_append(
        &mut self,
        docids: &[DocId],
        scores: &[Score],
        previous: Option<BlockHandle>,
    ) -> Result<BlockHandle> {
        if docids.len() != scores.len() {
            return Err(Error::InvalidInput(format!(
                "{} docids but {} scores",
                docids.len(),
                scores.len()
            )));
        }
        if docids.is_empty() || docids.len() > BLOCK_SIZE {
            return Err(Error::InvalidInput(format!(
                "block must hold 1..={} postings, got {}",
                BLOCK_SIZE,
                docids.len()
            )));
        }
        if !docids.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidInput("docids must be strictly ascending".into()));
        }
        if let Some(prev) = previous {
            self.block_words(prev)?;
        }

        let count = docids.len();
        let mut doc_buf = [0u32; BLOCK_SIZE];
        let mut score_buf = [0u32; BLOCK_SIZE];
        doc_buf[..count].copy_from_slice(docids);
        score_buf[..count].copy_from_slice(scores);
        if self.order == ListOrder::Reverse {
            doc_buf[..count].reverse();
            score_buf[..count].reverse();
        }
        let boundary = doc_buf[count - 1];

        self.scratch.clear();
        self.scratch.resize(BLOCK_HEADER_WORDS, 0);
        let doc_info = encode_block(&doc_buf[..count], self.order.delta_mode(), &mut self.scratch)?;
        self.scratch.push(0);
        let score_info = encode_block(&score_buf[..count], DeltaMode::None, &mut self.scratch)?;

        let next = match self.order {
            ListOrder::Forward => None,
            ListOrder::Reverse => previous,
        };
        let (next_segment, next_offset) = match next {
            Some(h) => (h.segment(), h.offset()),
            None => (UNDEFINED_SEGMENT, 0),
        };
        let size = self.scratch.len();
        self.scratch[SIZE_WORD] = size as u32;
        self.scratch[NEXT_SEGMENT_WORD] = next_segment;
        self.scratch[NEXT_OFFSET_WORD] = next_offset;
        self.scratch[BOUNDARY_WORD] = boundary;
        self.scratch[COUNT_WORD] = count as u32;
        self.scratch[DOC_LEN_WORD] = doc_info.words as u32;
        self.scratch[BLOCK_HEADER_WORDS + doc_info.words] = score_info.words as u32;

        let handle = self.reserve(size)?;
        let start = handle.offset() as usize;
        self.segments[handle.segment() as usize][start..start + size].copy_from_slice(&self.scratch);

        if self.order == ListOrder::Forward
            && let Some(prev) = previous
        {
            let segment = &mut self.segments[prev.segment() as usize];
            let base = prev.offset() as usize;
            segment[base + NEXT_SEGMENT_WORD] = handle.segment();
            segment[base + NEXT_OFFSET_WORD] = handle.offset();
        }

        log::trace!(
            "block {:?}: {} postings, {} words (doc b={}, score b={})",
            handle,
            count,
            size,
            doc_info.bit_width,
            score_info.bit_width
        );
        Ok(handle)
    }

    /// Claim `words` words in the active segment, sealing it and starting a
    /// new one if it lacks room.
    fn reserve(&mut self, words: usize) -> Result<BlockHandle> {
        if words > self.segment_capacity {
            return Err(Error::Config(format!(
                "block of {} words exceeds segment capacity {}",
                words, self.segment_capacity
            )));
        }
        if self.segments.is_empty() || self.segment_capacity - self.offset < words {
            if self.segments.len() >= UNDEFINED_SEGMENT as usize {
                return Err(Error::Config("segment index space exhausted".into()));
            }
            if let Some(last) = self.segments.len().checked_sub(1) {
                log::debug!(
                    "sealing segment {} at {}/{} words",
                    last,
                    self.offset,
                    self.segment_capacity
                );
            }
            self.segments
                .push(vec![0u32; self.segment_capacity].into_boxed_slice());
            self.offset = 0;
        }
        let handle = BlockHandle::new((self.segments.len() - 1) as u32, self.offset as u32);
        self.offset += words;
        Ok(handle)
    }

    /// Words of the block at `handle`, bounds-checked against written data
    fn block_words(&self, handle: BlockHandle) -> Result<&[u32]> {
        let invalid = || Error::InvalidHandle {
            segment: handle.segment(),
            offset: handle.offset(),
        };
        let index = handle.segment() as usize;
        let segment = self.segments.get(index).ok_or_else(invalid)?;
        let live = if index + 1 == self.segments.len() {
            self.offset
        } else {
            segment.len()
        };
        let start = handle.offset() as usize;
        if start + BLOCK_HEADER_WORDS > live {
            return Err(invalid());
        }
        let size = segment[start + SIZE_WORD] as usize;
        if size <= BLOCK_HEADER_WORDS || size > MAX_BLOCK_WORDS || start + size > live {
            return Err(Error::Corruption(format!(
                "block {:?} has invalid size {}",
                handle, size
            )));
        }
        Ok(&segment[start..start + size])
    }

    fn parse_header(&self, handle: BlockHandle, words: &[u32]) -> Result<BlockHeader> {
        let doc_words = words[DOC_LEN_WORD] as usize;
        let score_len_at = BLOCK_HEADER_WORDS + doc_words;
        let score_words = *words.get(score_len_at).ok_or_else(|| {
            Error::Corruption(format!("block {:?} docid payload overruns block", handle))
        })? as usize;
        if score_len_at + 1 + score_words != words.len() {
            return Err(Error::Corruption(format!(
                "block {:?} payload sizes do not add up",
                handle
            )));
        }
        let count = words[COUNT_WORD] as usize;
        if count == 0 || count > BLOCK_SIZE {
            return Err(Error::Corruption(format!(
                "block {:?} has invalid count {}",
                handle, count
            )));
        }
        let next = BlockHandle::from_words(words[NEXT_SEGMENT_WORD], words[NEXT_OFFSET_WORD]);
        // Forward lists link only to later positions, reverse lists only to
        // earlier ones.
        if let Some(next) = next {
            let well_ordered = match self.order {
                ListOrder::Forward => next.to_raw() > handle.to_raw(),
                ListOrder::Reverse => next.to_raw() < handle.to_raw(),
            };
            if !well_ordered {
                return Err(Error::Corruption(format!(
                    "block {:?} links to {:?} against {:?} order",
                    handle, next, self.order
                )));
            }
        }
        Ok(BlockHeader {
            size: words.len(),
            next,
            boundary_docid: words[BOUNDARY_WORD],
            count,
            doc_words,
            score_words,
        })
    }

    pub fn block_header(&self, handle: BlockHandle) -> Result<BlockHeader> {
        self.parse_header(handle, self.block_words(handle)?)
    }

    /// Follow the list one step
    pub fn next_block(&self, handle: BlockHandle) -> Result<Option<BlockHandle>> {
        Ok(self.block_header(handle)?.next)
    }

    /// Starting at `handle`, find the first block whose boundary docid does not
    /// precede `pivot` in traversal order, i.e. the first block that may
    /// contain `pivot` or anything after it.
    pub fn seek_block(&self, handle: BlockHandle, pivot: DocId) -> Result<Option<BlockHandle>> {
        let mut current = Some(handle);
        while let Some(h) = current {
            let header = self.block_header(h)?;
            if !self.order.precedes(header.boundary_docid, pivot) {
                return Ok(Some(h));
            }
            current = header.next;
        }
        Ok(None)
    }

    /// Decompress the docids of one block in traversal order.
    /// Returns the number of valid entries in `out`.
    pub fn decompress_docids(&self, handle: BlockHandle, out: &mut [u32; BLOCK_SIZE]) -> Result<usize> {
        let words = self.block_words(handle)?;
        let header = self.parse_header(handle, words)?;
        let payload = &words[BLOCK_HEADER_WORDS..BLOCK_HEADER_WORDS + header.doc_words];
        let consumed = decode_block(payload, header.count, self.order.delta_mode(), out)?;
        if consumed != header.doc_words {
            return Err(Error::Corruption(format!(
                "block {:?} docid payload is {} words, decoder used {}",
                handle, header.doc_words, consumed
            )));
        }
        Ok(header.count)
    }

    /// Decompress the scores of one block, aligned with [`Self::decompress_docids`].
    pub fn decompress_scores(&self, handle: BlockHandle, out: &mut [u32; BLOCK_SIZE]) -> Result<usize> {
        let words = self.block_words(handle)?;
        let header = self.parse_header(handle, words)?;
        let start = BLOCK_HEADER_WORDS + header.doc_words + 1;
        let payload = &words[start..start + header.score_words];
        let consumed = decode_block(payload, header.count, DeltaMode::None, out)?;
        if consumed != header.score_words {
            return Err(Error::Corruption(format!(
                "block {:?} score payload is {} words, decoder used {}",
                handle, header.score_words, consumed
            )));
        }
        Ok(header.count)
    }

    /// Iterate the handles of a list starting at `start`
    pub fn blocks(&self, start: Option<BlockHandle>) -> BlockChain<'_> {
        BlockChain {
            pool: self,
            next: start,
        }
    }

    /// Serialize the pool.
    ///
    /// Layout: magic, version, segment capacity, segment count, fill offset of
    /// the last segment, order flag, every sealed segment in full, then the
    /// live words of the last segment.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(POOL_MAGIC)?;
        writer.write_u32::<LittleEndian>(POOL_FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(self.segment_capacity as u32)?;
        writer.write_u32::<LittleEndian>(self.segments.len() as u32)?;
        writer.write_u32::<LittleEndian>(self.offset as u32)?;
        writer.write_u8(self.order.to_flag())?;

        let last = self.segments.len().saturating_sub(1);
        for (i, segment) in self.segments.iter().enumerate() {
            let live = if i == last { &segment[..self.offset] } else { &segment[..] };
            for &word in live {
                writer.write_u32::<LittleEndian>(word)?;
            }
        }
        Ok(())
    }

    /// Deserialize a pool written by [`Self::save`]. Handles issued by the
    /// saved pool address the same blocks in the loaded one.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != POOL_MAGIC {
            return Err(Error::IncompatibleFormat(format!(
                "bad segment pool magic {:#010x}",
                magic
            )));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != POOL_FORMAT_VERSION {
            return Err(Error::IncompatibleFormat(format!(
                "segment pool version {} (expected {})",
                version, POOL_FORMAT_VERSION
            )));
        }
        let segment_capacity = reader.read_u32::<LittleEndian>()? as usize;
        let num_segments = reader.read_u32::<LittleEndian>()? as usize;
        let offset = reader.read_u32::<LittleEndian>()? as usize;
        let order = ListOrder::from_flag(reader.read_u8()?)?;

        let mut pool = Self::new(segment_capacity, order)?;
        if offset > segment_capacity || (num_segments == 0 && offset != 0) {
            return Err(Error::Corruption(format!(
                "fill offset {} invalid for {} segments of {} words",
                offset, num_segments, segment_capacity
            )));
        }

        pool.segments.reserve(num_segments.min(LOAD_RESERVE_LIMIT));
        for i in 0..num_segments {
            let live = if i + 1 == num_segments { offset } else { segment_capacity };
            let mut words = Vec::new();
            read_words(reader, live, &mut words)?;
            words.reserve_exact(segment_capacity - live);
            words.resize(segment_capacity, 0);
            pool.segments.push(words.into_boxed_slice());
        }
        pool.offset = offset;
        let num_blocks = pool.check_blocks()?;

        log::debug!(
            "loaded segment pool: {} segments of {} words, {} blocks, {:?} order",
            num_segments,
            segment_capacity,
            num_blocks,
            order
        );
        Ok(pool)
    }

    /// Parse every block header in storage order and return the block count.
    /// Sealed segments end at their first zero size word.
    fn check_blocks(&self) -> Result<usize> {
        let mut count = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            let sealed = i + 1 < self.segments.len();
            let live = if sealed { segment.len() } else { self.offset };
            let mut pos = 0;
            while pos < live {
                if sealed && (pos + BLOCK_HEADER_WORDS > live || segment[pos + SIZE_WORD] == 0) {
                    break;
                }
                if pos + BLOCK_HEADER_WORDS > live {
                    return Err(Error::Corruption(format!(
                        "segment {} ends inside a block header at word {}",
                        i, pos
                    )));
                }
                let header = self.block_header(BlockHandle::new(i as u32, pos as u32))?;
                pos += header.size;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Segments reserved up front while loading; more are added as data arrives
const LOAD_RESERVE_LIMIT: usize = 1024;

/// Words read per step while loading, so a corrupt length hits end of input
/// before the whole claimed size is allocated
const LOAD_CHUNK_WORDS: usize = 1 << 16;

fn read_words<R: Read>(reader: &mut R, count: usize, out: &mut Vec<u32>) -> Result<()> {
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(LOAD_CHUNK_WORDS);
        let start = out.len();
        out.resize(start + n, 0);
        reader.read_u32_into::<LittleEndian>(&mut out[start..])?;
        remaining -= n;
    }
    Ok(())
}

/// Walks a list of blocks through their next handles
pub struct BlockChain<'a> {
    pool: &'a SegmentPool,
    next: Option<BlockHandle>,
}

impl Iterator for BlockChain<'_> {
    type Item = Result<BlockHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.next?;
        match self.pool.next_block(handle) {
            Ok(next) => {
                self.next = next;
                Some(Ok(handle))
            }
            Err(e) => {
                self.next = None;
                Some(Err(e))
            }
        }
    }
}
