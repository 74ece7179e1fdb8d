//! Per-term postings metadata and index statistics

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::structures::{BlockHandle, ListOrder};
use crate::{DocId, Result, Score};

/// Bookkeeping for one term's postings list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostingsMeta {
    /// Documents containing the term, staged postings included
    pub df: u32,
    /// Total occurrences across all documents
    pub cf: u64,
    /// Largest docid ever added for the term
    pub max_docid: Option<DocId>,
    /// Oldest compressed block
    pub head: Option<BlockHandle>,
    /// Most recently compressed block
    pub tail: Option<BlockHandle>,
}

impl PostingsMeta {
    /// Block a traversal starts from: the oldest block for forward lists, the
    /// newest for reverse lists
    #[inline]
    pub fn list_start(&self, order: ListOrder) -> Option<BlockHandle> {
        match order {
            ListOrder::Forward => self.head,
            ListOrder::Reverse => self.tail,
        }
    }

    /// Record a freshly compressed block
    pub(crate) fn link_block(&mut self, handle: BlockHandle) {
        if self.head.is_none() {
            self.head = Some(handle);
        }
        self.tail = Some(handle);
    }

    pub(crate) fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.df)?;
        writer.write_u64::<LittleEndian>(self.cf)?;
        match self.max_docid {
            Some(docid) => {
                writer.write_u8(1)?;
                writer.write_u32::<LittleEndian>(docid)?;
            }
            None => {
                writer.write_u8(0)?;
                writer.write_u32::<LittleEndian>(0)?;
            }
        }
        writer.write_u64::<LittleEndian>(BlockHandle::encode(self.head))?;
        writer.write_u64::<LittleEndian>(BlockHandle::encode(self.tail))?;
        Ok(())
    }

    pub(crate) fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let df = reader.read_u32::<LittleEndian>()?;
        let cf = reader.read_u64::<LittleEndian>()?;
        let has_max = reader.read_u8()? != 0;
        let max = reader.read_u32::<LittleEndian>()?;
        let head = BlockHandle::decode(reader.read_u64::<LittleEndian>()?);
        let tail = BlockHandle::decode(reader.read_u64::<LittleEndian>()?);
        Ok(Self {
            df,
            cf,
            max_docid: has_max.then_some(max),
            head,
            tail,
        })
    }
}

/// One decoded posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub score: Score,
}

/// Snapshot of index size counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_terms: usize,
    /// Documents and conjunctions inserted
    pub num_entries: u64,
    /// Postings across all terms, staged ones included
    pub num_postings: u64,
    /// Postings still waiting in staging buffers
    pub staged_postings: u64,
    pub num_segments: usize,
    pub pool_words_used: usize,
    pub pool_memory_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_start_follows_order() {
        let mut meta = PostingsMeta::default();
        assert_eq!(meta.list_start(ListOrder::Forward), None);

        let first = BlockHandle::decode(7).unwrap();
        let second = BlockHandle::decode((1u64 << 32) | 3).unwrap();
        meta.link_block(first);
        meta.link_block(second);
        assert_eq!(meta.list_start(ListOrder::Forward), Some(first));
        assert_eq!(meta.list_start(ListOrder::Reverse), Some(second));
    }

    #[test]
    fn test_save_load() {
        let meta = PostingsMeta {
            df: 42,
            cf: 99,
            max_docid: Some(1234),
            head: BlockHandle::decode(16),
            tail: None,
        };
        let mut buffer = Vec::new();
        meta.save(&mut buffer).unwrap();
        PostingsMeta::default().save(&mut buffer).unwrap();

        let mut reader = &buffer[..];
        assert_eq!(PostingsMeta::load(&mut reader).unwrap(), meta);
        assert_eq!(PostingsMeta::load(&mut reader).unwrap(), PostingsMeta::default());
    }
}
