//! Cursor over one compressed postings list
//!
//! Decodes a block at a time. Seeking skips whole blocks by boundary docid
//! before galloping inside the block it lands on.

use crate::structures::{BLOCK_SIZE, BlockHandle, ListOrder, SegmentPool};
use crate::{DocId, Result};

/// Index of the first element of `block[start..]` that does not precede
/// `target` in `order`, or `block.len()` if there is none.
///
/// Probes at exponentially growing strides from `start`, then binary searches
/// the last stride. `block` must be sorted in `order`.
pub fn gallop_search(block: &[DocId], start: usize, target: DocId, order: ListOrder) -> usize {
    if start >= block.len() {
        return block.len();
    }
    if !order.precedes(block[start], target) {
        return start;
    }

    // block[lo] precedes target
    let mut lo = start;
    let mut step = 1;
    let mut hi = lo + step;
    while hi < block.len() && order.precedes(block[hi], target) {
        lo = hi;
        step *= 2;
        hi = lo + step;
    }
    let hi = hi.min(block.len());
    lo + 1 + block[lo + 1..hi].partition_point(|&doc| order.precedes(doc, target))
}

pub struct PostingCursor<'a> {
    pool: &'a SegmentPool,
    order: ListOrder,
    block: Option<BlockHandle>,
    docs: [DocId; BLOCK_SIZE],
    len: usize,
    pos: usize,
}

impl<'a> PostingCursor<'a> {
    /// Position on the first posting of the list starting at `start`
    pub fn new(pool: &'a SegmentPool, start: Option<BlockHandle>) -> Result<Self> {
        let mut cursor = Self {
            pool,
            order: pool.order(),
            block: None,
            docs: [0; BLOCK_SIZE],
            len: 0,
            pos: 0,
        };
        cursor.load(start)?;
        Ok(cursor)
    }

    fn load(&mut self, handle: Option<BlockHandle>) -> Result<()> {
        self.pos = 0;
        self.block = handle;
        self.len = match handle {
            Some(h) => self.pool.decompress_docids(h, &mut self.docs)?,
            None => 0,
        };
        Ok(())
    }

    /// Current docid, `None` once exhausted
    #[inline]
    pub fn doc(&self) -> Option<DocId> {
        (self.pos < self.len).then(|| self.docs[self.pos])
    }

    /// Handle of the block under the cursor
    pub fn block(&self) -> Option<BlockHandle> {
        self.block
    }

    /// Move to the next posting
    pub fn advance(&mut self) -> Result<Option<DocId>> {
        let Some(handle) = self.block else {
            return Ok(None);
        };
        self.pos += 1;
        if self.pos >= self.len {
            let next = self.pool.next_block(handle)?;
            self.load(next)?;
        }
        Ok(self.doc())
    }

    /// Move to the first posting that does not precede `target`. Never moves
    /// backwards.
    pub fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        let Some(handle) = self.block else {
            return Ok(None);
        };
        if self.order.precedes(self.docs[self.len - 1], target) {
            let found = match self.pool.next_block(handle)? {
                Some(next) => self.pool.seek_block(next, target)?,
                None => None,
            };
            self.load(found)?;
            if self.block.is_none() {
                return Ok(None);
            }
        }
        self.pos = gallop_search(&self.docs[..self.len], self.pos, target, self.order);
        Ok(self.doc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::MAX_BLOCK_WORDS;

    fn build_list(pool: &mut SegmentPool, docs: &[DocId]) -> Option<BlockHandle> {
        let mut head = None;
        let mut tail = None;
        for chunk in docs.chunks(BLOCK_SIZE) {
            let scores = vec![1; chunk.len()];
            let handle = pool.compress_and_append(chunk, &scores, tail).unwrap();
            head.get_or_insert(handle);
            tail = Some(handle);
        }
        match pool.order() {
            ListOrder::Forward => head,
            ListOrder::Reverse => tail,
        }
    }

    #[test]
    fn test_gallop_search_forward() {
        let block: Vec<DocId> = (0..100).map(|i| i * 3).collect();
        let order = ListOrder::Forward;
        assert_eq!(gallop_search(&block, 0, 0, order), 0);
        assert_eq!(gallop_search(&block, 0, 1, order), 1);
        assert_eq!(gallop_search(&block, 0, 150, order), 50);
        assert_eq!(gallop_search(&block, 60, 150, order), 60);
        assert_eq!(gallop_search(&block, 10, 298, order), 100);
        assert_eq!(gallop_search(&block, 10, 297, order), 99);
        assert_eq!(gallop_search(&block, 100, 5, order), 100);
    }

    #[test]
    fn test_gallop_search_reverse() {
        let block: Vec<DocId> = (0..100).rev().map(|i| i * 3).collect();
        let order = ListOrder::Reverse;
        assert_eq!(gallop_search(&block, 0, 297, order), 0);
        assert_eq!(gallop_search(&block, 0, 296, order), 1);
        assert_eq!(gallop_search(&block, 0, 0, order), 99);
        assert_eq!(gallop_search(&block, 5, 400, order), 5);
    }

    #[test]
    fn test_gallop_matches_linear_scan() {
        let block: Vec<DocId> = (0..BLOCK_SIZE as u32).map(|i| i * i + 7).collect();
        for start in [0, 1, 17, 100, 127] {
            for target in (0..20_000).step_by(37) {
                let expected = start + block[start..].iter().take_while(|&&d| d < target).count();
                assert_eq!(
                    gallop_search(&block, start, target, ListOrder::Forward),
                    expected,
                    "start {} target {}",
                    start,
                    target
                );
            }
        }
    }

    #[test]
    fn test_cursor_walks_all_blocks() {
        let mut pool = SegmentPool::new(MAX_BLOCK_WORDS * 4, ListOrder::Forward).unwrap();
        let docs: Vec<DocId> = (0..500).map(|i| i * 2 + 1).collect();
        let start = build_list(&mut pool, &docs);

        let mut cursor = PostingCursor::new(&pool, start).unwrap();
        let mut walked = Vec::new();
        while let Some(doc) = cursor.doc() {
            walked.push(doc);
            cursor.advance().unwrap();
        }
        assert_eq!(walked, docs);
        assert_eq!(cursor.advance().unwrap(), None);
    }

    #[test]
    fn test_cursor_seek_skips_blocks() {
        let mut pool = SegmentPool::new(MAX_BLOCK_WORDS * 4, ListOrder::Forward).unwrap();
        let docs: Vec<DocId> = (0..1000).map(|i| i * 10).collect();
        let start = build_list(&mut pool, &docs);

        let mut cursor = PostingCursor::new(&pool, start).unwrap();
        assert_eq!(cursor.seek(5).unwrap(), Some(10));
        assert_eq!(cursor.seek(5).unwrap(), Some(10));
        assert_eq!(cursor.seek(4001).unwrap(), Some(4010));
        assert_eq!(cursor.seek(9990).unwrap(), Some(9990));
        assert_eq!(cursor.seek(9991).unwrap(), None);
        assert_eq!(cursor.doc(), None);
    }

    #[test]
    fn test_cursor_reverse_order() {
        let mut pool = SegmentPool::new(MAX_BLOCK_WORDS * 4, ListOrder::Reverse).unwrap();
        let docs: Vec<DocId> = (1..=300).collect();
        let start = build_list(&mut pool, &docs);

        let mut cursor = PostingCursor::new(&pool, start).unwrap();
        assert_eq!(cursor.doc(), Some(300));
        assert_eq!(cursor.seek(150).unwrap(), Some(150));
        assert_eq!(cursor.advance().unwrap(), Some(149));
        assert_eq!(cursor.seek(1).unwrap(), Some(1));
        assert_eq!(cursor.advance().unwrap(), None);
    }

    #[test]
    fn test_empty_cursor() {
        let pool = SegmentPool::new(MAX_BLOCK_WORDS, ListOrder::Forward).unwrap();
        let mut cursor = PostingCursor::new(&pool, None).unwrap();
        assert_eq!(cursor.doc(), None);
        assert_eq!(cursor.advance().unwrap(), None);
        assert_eq!(cursor.seek(3).unwrap(), None);
    }
}
