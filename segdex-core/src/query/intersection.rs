//! Multi-list AND via small-versus-small intersection
//!
//! Lists are processed rarest first. The two rarest are merged with galloping
//! cursors; every further list then filters the running candidates. Results
//! come out in list traversal order and never exceed the rarest list's df.

use super::cursor::PostingCursor;
use crate::structures::{BLOCK_SIZE, BlockHandle, SegmentPool};
use crate::{DocId, Result, TERMINAL_DOCID};

/// One term's compressed list as seen by the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermPostings {
    /// First block in traversal order
    pub start: BlockHandle,
    /// Document frequency, used to order lists rarest first
    pub df: u32,
}

/// Docids present in every list, at most `hits` of them.
///
/// An empty `lists` yields no results.
pub fn intersect(pool: &SegmentPool, lists: &[TermPostings], hits: usize) -> Result<Vec<DocId>> {
    let mut lists = lists.to_vec();
    lists.sort_by_key(|list| list.df);
    let Some(rarest) = lists.first() else {
        return Ok(Vec::new());
    };
    let limit = (rarest.df as usize).min(hits);
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(limit.min(BLOCK_SIZE * 8));
    match lists.as_slice() {
        [only] => copy_list(pool, only.start, limit, &mut result)?,
        [first, second] => merge_pair(pool, first.start, second.start, limit, &mut result)?,
        [first, second, rest @ ..] => {
            // Cap only the last pass; earlier ones may still lose candidates.
            merge_pair(pool, first.start, second.start, usize::MAX, &mut result)?;
            for (i, list) in rest.iter().enumerate() {
                if result.is_empty() {
                    break;
                }
                let cap = if i + 1 == rest.len() { limit } else { usize::MAX };
                filter_by_list(pool, list.start, &mut result, cap)?;
            }
        }
        [] => {}
    }
    result.truncate(limit);
    Ok(result)
}

/// Fill `out` with up to `out.len()` matches and return how many were found.
/// When `out` is not full, [`TERMINAL_DOCID`] follows the last match.
pub fn intersect_into(pool: &SegmentPool, lists: &[TermPostings], out: &mut [DocId]) -> Result<usize> {
    let matches = intersect(pool, lists, out.len())?;
    let n = matches.len();
    out[..n].copy_from_slice(&matches);
    if n < out.len() {
        out[n] = TERMINAL_DOCID;
    }
    Ok(n)
}

fn copy_list(pool: &SegmentPool, start: BlockHandle, cap: usize, out: &mut Vec<DocId>) -> Result<()> {
    let mut docs = [0u32; BLOCK_SIZE];
    for handle in pool.blocks(Some(start)) {
        let count = pool.decompress_docids(handle?, &mut docs)?;
        let take = count.min(cap - out.len());
        out.extend_from_slice(&docs[..take]);
        if out.len() >= cap {
            break;
        }
    }
    Ok(())
}

fn merge_pair(
    pool: &SegmentPool,
    a: BlockHandle,
    b: BlockHandle,
    cap: usize,
    out: &mut Vec<DocId>,
) -> Result<()> {
    let order = pool.order();
    let mut left = PostingCursor::new(pool, Some(a))?;
    let mut right = PostingCursor::new(pool, Some(b))?;
    let mut l = left.doc();
    let mut r = right.doc();
    while let (Some(x), Some(y)) = (l, r) {
        if x == y {
            out.push(x);
            if out.len() >= cap {
                break;
            }
            l = left.advance()?;
            r = right.advance()?;
        } else if order.precedes(x, y) {
            l = left.seek(y)?;
        } else {
            r = right.seek(x)?;
        }
    }
    Ok(())
}

/// Keep only candidates present in the list at `start`
fn filter_by_list(
    pool: &SegmentPool,
    start: BlockHandle,
    candidates: &mut Vec<DocId>,
    cap: usize,
) -> Result<()> {
    let mut cursor = PostingCursor::new(pool, Some(start))?;
    let mut kept = 0;
    for i in 0..candidates.len() {
        let candidate = candidates[i];
        match cursor.seek(candidate)? {
            Some(doc) if doc == candidate => {
                candidates[kept] = candidate;
                kept += 1;
                if kept >= cap {
                    break;
                }
            }
            Some(_) => {}
            None => break,
        }
    }
    candidates.truncate(kept);
    Ok(())
}
