//! Per-term staging of uncompressed postings
//!
//! Postings accumulate here until a whole number of blocks can be handed to the
//! segment pool. Capacity grows in steps (tripled while small, doubled after)
//! and never beyond the configured staging limit.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::structures::BLOCK_SIZE;
use crate::{DocId, Error, Result, Score};

/// Capacity below which growth triples instead of doubling
const TRIPLE_BELOW: usize = 32;

#[derive(Debug, Default)]
pub(crate) struct StagingBuffer {
    docids: Vec<DocId>,
    scores: Vec<Score>,
}

impl StagingBuffer {
    pub fn len(&self) -> usize {
        self.docids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.docids.capacity()
    }

    /// Append a posting, growing towards `limit` when full
    #[inline]
    pub fn push(&mut self, docid: DocId, score: Score, initial: usize, limit: usize) {
        if self.docids.len() == self.docids.capacity() {
            self.grow(initial, limit);
        }
        self.docids.push(docid);
        self.scores.push(score);
    }

    fn grow(&mut self, initial: usize, limit: usize) {
        let cap = self.docids.capacity();
        let target = match cap {
            0 => initial,
            c if c < TRIPLE_BELOW => c * 3,
            c => c * 2,
        };
        let target = target.min(limit).max(self.docids.len() + 1);
        let additional = target - self.docids.len();
        self.docids.reserve_exact(additional);
        self.scores.reserve_exact(additional);
    }

    /// Hand staged postings to `sink` one block at a time and drop what was
    /// handed over. Without `include_partial` the ragged remainder stays.
    ///
    /// If `sink` fails, blocks it already accepted are still removed.
    pub fn drain_blocks<F>(&mut self, include_partial: bool, mut sink: F) -> Result<usize>
    where
        F: FnMut(&[DocId], &[Score]) -> Result<()>,
    {
        let end = if include_partial {
            self.docids.len()
        } else {
            self.docids.len() / BLOCK_SIZE * BLOCK_SIZE
        };

        let mut drained = 0;
        let mut result = Ok(());
        for (docs, scores) in self.docids[..end]
            .chunks(BLOCK_SIZE)
            .zip(self.scores[..end].chunks(BLOCK_SIZE))
        {
            if let Err(e) = sink(docs, scores) {
                result = Err(e);
                break;
            }
            drained += docs.len();
        }

        self.docids.drain(..drained);
        self.scores.drain(..drained);
        result.map(|_| drained.div_ceil(BLOCK_SIZE))
    }

    /// Return the allocation of an empty buffer
    pub fn release(&mut self) {
        if self.docids.is_empty() {
            self.docids = Vec::new();
            self.scores = Vec::new();
        }
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.docids.len() as u32)?;
        for (&docid, &score) in self.docids.iter().zip(&self.scores) {
            writer.write_u32::<LittleEndian>(docid)?;
            writer.write_u32::<LittleEndian>(score)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R, limit: usize) -> Result<Self> {
        let len = reader.read_u32::<LittleEndian>()? as usize;
        if len > limit {
            return Err(Error::Corruption(format!(
                "staging buffer of {} postings exceeds limit {}",
                len, limit
            )));
        }
        let reserve = len.min(BLOCK_SIZE);
        let mut buffer = Self {
            docids: Vec::with_capacity(reserve),
            scores: Vec::with_capacity(reserve),
        };
        for _ in 0..len {
            buffer.docids.push(reader.read_u32::<LittleEndian>()?);
            buffer.scores.push(reader.read_u32::<LittleEndian>()?);
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_escalation() {
        let mut buffer = StagingBuffer::default();
        assert_eq!(buffer.capacity(), 0);
        let mut caps = Vec::new();
        for i in 0..BLOCK_SIZE as u32 {
            buffer.push(i, 1, 4, BLOCK_SIZE);
            if caps.last() != Some(&buffer.capacity()) {
                caps.push(buffer.capacity());
            }
        }
        assert_eq!(caps.first(), Some(&4));
        assert!(caps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*caps.last().unwrap(), BLOCK_SIZE);
    }

    #[test]
    fn test_drain_full_blocks_keeps_remainder() {
        let mut buffer = StagingBuffer::default();
        for i in 0..300u32 {
            buffer.push(i, i % 3, 4, 512);
        }
        let mut seen = Vec::new();
        let blocks = buffer
            .drain_blocks(false, |docs, scores| {
                assert_eq!(docs.len(), scores.len());
                seen.push(docs.len());
                Ok(())
            })
            .unwrap();
        assert_eq!(blocks, 2);
        assert_eq!(seen, vec![BLOCK_SIZE, BLOCK_SIZE]);
        assert_eq!(buffer.len(), 300 - 2 * BLOCK_SIZE);

        let blocks = buffer.drain_blocks(true, |_, _| Ok(())).unwrap();
        assert_eq!(blocks, 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_release_after_full_drain() {
        let mut buffer = StagingBuffer::default();
        for i in 0..100u32 {
            buffer.push(i, 1, 4, BLOCK_SIZE);
        }
        buffer.release();
        assert_eq!(buffer.len(), 100);
        assert!(buffer.capacity() >= 100);

        buffer.drain_blocks(true, |_, _| Ok(())).unwrap();
        buffer.release();
        assert_eq!(buffer.capacity(), 0);

        buffer.push(500, 1, 4, BLOCK_SIZE);
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_drain_stops_on_error() {
        let mut buffer = StagingBuffer::default();
        for i in 0..(3 * BLOCK_SIZE) as u32 {
            buffer.push(i, 0, 4, 4 * BLOCK_SIZE);
        }
        let mut calls = 0;
        let result = buffer.drain_blocks(false, |_, _| {
            calls += 1;
            if calls == 2 {
                Err(Error::InvalidInput("sink full".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(buffer.len(), 2 * BLOCK_SIZE);
    }
}
