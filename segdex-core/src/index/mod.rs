//! Index - the in-memory inverted index
//!
//! [`InvertedIndex`] ties the pieces together:
//! - a [`TermDictionary`] issuing dense term ids
//! - one [`PostingsMeta`] and one staging buffer per term id
//! - a [`SegmentPool`] holding every compressed block
//!
//! Postings are staged per term and compressed in whole blocks once a term's
//! buffer reaches the staging limit. [`InvertedIndex::flush`] compresses the
//! ragged remainders; only compressed postings are visible to queries.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::query::{TermPostings, intersect, intersect_into};
use crate::structures::{BLOCK_SIZE, SegmentPool, TermDictionary};
use crate::{DocId, Error, Result, Score, TERMINAL_DOCID, TermId};

mod config;
mod metadata;
mod persist;
mod shared;
mod staging;

pub use config::{IndexConfig, ListOrder};
pub use metadata::{IndexStats, Posting, PostingsMeta};
pub use persist::{INDEX_FORMAT_VERSION, INDEX_MAGIC};
pub use shared::SharedIndex;

use staging::StagingBuffer;

#[cfg(test)]
mod tests;

/// One unique term of an entry being ingested
struct EntryTerm<'a> {
    text: &'a str,
    occurrences: u64,
    score: Score,
}

pub struct InvertedIndex {
    config: IndexConfig,
    dictionary: TermDictionary,
    postings: Vec<PostingsMeta>,
    staging: Vec<StagingBuffer>,
    pool: SegmentPool,
    num_entries: u64,
}

impl InvertedIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let pool = SegmentPool::new(config.segment_capacity, config.order)?;
        Ok(Self {
            config,
            dictionary: TermDictionary::new(),
            postings: Vec::new(),
            staging: Vec::new(),
            pool,
            num_entries: 0,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn order(&self) -> ListOrder {
        self.config.order
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub fn pool(&self) -> &SegmentPool {
        &self.pool
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    /// Documents and conjunctions inserted so far
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Register `text` and make room for its metadata
    pub fn insert_term(&mut self, text: &str) -> Result<TermId> {
        let id = self.dictionary.insert_term(text)?;
        let needed = id as usize + 1;
        if self.postings.len() < needed {
            self.postings.resize_with(needed, PostingsMeta::default);
            self.staging.resize_with(needed, StagingBuffer::default);
        }
        Ok(id)
    }

    pub fn term_id(&self, text: &str) -> Option<TermId> {
        self.dictionary.term_id(text)
    }

    pub fn term_meta(&self, text: &str) -> Option<&PostingsMeta> {
        let id = self.dictionary.term_id(text)?;
        self.postings.get(id as usize)
    }

    /// Add a document given as `(term, score)` pairs.
    ///
    /// Repeated terms collapse into a single posting whose score is the
    /// saturating sum of the repeats. `docid` must exceed every docid already
    /// added for each of its terms; on violation nothing is modified.
    pub fn insert_doc(&mut self, docid: DocId, terms: &[(&str, Score)]) -> Result<()> {
        let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
        let mut entry: Vec<EntryTerm<'_>> = Vec::with_capacity(terms.len());
        for &(text, score) in terms {
            match slots.entry(text) {
                Entry::Occupied(slot) => {
                    let term = &mut entry[*slot.get()];
                    term.occurrences += 1;
                    term.score = term.score.saturating_add(score);
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.len());
                    entry.push(EntryTerm {
                        text,
                        occurrences: 1,
                        score,
                    });
                }
            }
        }
        self.ingest(docid, &entry)
    }

    /// Add a conjunction: every unique term gets a posting for `conj_id`
    /// scored with the number of unique terms.
    pub fn insert_conjunction(&mut self, conj_id: DocId, terms: &[&str]) -> Result<()> {
        let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
        let mut entry: Vec<EntryTerm<'_>> = Vec::with_capacity(terms.len());
        for &text in terms {
            match slots.entry(text) {
                Entry::Occupied(slot) => entry[*slot.get()].occurrences += 1,
                Entry::Vacant(slot) => {
                    slot.insert(entry.len());
                    entry.push(EntryTerm {
                        text,
                        occurrences: 1,
                        score: 0,
                    });
                }
            }
        }
        let size = entry.len().min(Score::MAX as usize) as Score;
        for term in &mut entry {
            term.score = size;
        }
        self.ingest(conj_id, &entry)
    }

    fn ingest(&mut self, docid: DocId, entry: &[EntryTerm<'_>]) -> Result<()> {
        if docid == TERMINAL_DOCID {
            return Err(Error::InvalidDocId(docid));
        }
        for term in entry {
            if let Some(id) = self.dictionary.term_id(term.text)
                && let Some(max_docid) = self.postings[id as usize].max_docid
                && docid <= max_docid
            {
                return Err(Error::DocIdOutOfOrder {
                    term: term.text.to_string(),
                    docid,
                    max_docid,
                });
            }
        }

        let initial = self.config.initial_staging_capacity;
        let limit = self.config.staging_limit;
        for term in entry {
            let id = self.insert_term(term.text)? as usize;
            let meta = &mut self.postings[id];
            meta.df += 1;
            meta.cf += term.occurrences;
            meta.max_docid = Some(docid);

            let buffer = &mut self.staging[id];
            buffer.push(docid, term.score, initial, limit);
            if buffer.len() >= limit {
                self.drain_term(id, false)?;
            }
        }
        self.num_entries += 1;
        Ok(())
    }

    /// Compress staged postings of one term into the pool
    fn drain_term(&mut self, id: usize, include_partial: bool) -> Result<usize> {
        let pool = &mut self.pool;
        let meta = &mut self.postings[id];
        self.staging[id].drain_blocks(include_partial, |docids, scores| {
            let handle = pool.compress_and_append(docids, scores, meta.tail)?;
            meta.link_block(handle);
            Ok(())
        })
    }

    /// Compress every staged posting, partial blocks included, making all
    /// inserted entries visible to queries.
    pub fn flush(&mut self) -> Result<()> {
        let mut blocks = 0;
        let mut terms = 0;
        for id in 0..self.staging.len() {
            if !self.staging[id].is_empty() {
                blocks += self.drain_term(id, true)?;
                self.staging[id].release();
                terms += 1;
            }
        }
        log::info!(
            "flushed {} blocks for {} terms ({} segments, {} words used)",
            blocks,
            terms,
            self.pool.num_segments(),
            self.pool.words_used()
        );
        Ok(())
    }

    /// Resolve query terms to their compressed lists. Unknown terms and terms
    /// with nothing compressed yet are dropped; repeated terms count once.
    fn resolve(&self, terms: &[&str]) -> Vec<TermPostings> {
        let mut seen: Vec<TermId> = Vec::with_capacity(terms.len());
        let mut lists = Vec::with_capacity(terms.len());
        for &text in terms {
            let Some(id) = self.dictionary.term_id(text) else {
                log::trace!("dropping unknown query term {:?}", text);
                continue;
            };
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            let meta = &self.postings[id as usize];
            match meta.list_start(self.config.order) {
                Some(start) => lists.push(TermPostings { start, df: meta.df }),
                None => log::trace!("query term {:?} has no compressed postings", text),
            }
        }
        lists
    }

    /// Docids containing every known query term, in list traversal order,
    /// at most `hits` of them
    pub fn query(&self, terms: &[&str], hits: usize) -> Result<Vec<DocId>> {
        intersect(&self.pool, &self.resolve(terms), hits)
    }

    /// Like [`Self::query`] but fills `out`, writing [`TERMINAL_DOCID`] after
    /// the last match when `out` is not full. Returns the number of matches.
    pub fn query_into(&self, terms: &[&str], out: &mut [DocId]) -> Result<usize> {
        intersect_into(&self.pool, &self.resolve(terms), out)
    }

    /// Compressed postings of `term` in traversal order
    pub fn postings(&self, term: &str) -> Result<Vec<Posting>> {
        let Some(meta) = self.term_meta(term) else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        let mut docids = [0u32; BLOCK_SIZE];
        let mut scores = [0u32; BLOCK_SIZE];
        for handle in self.pool.blocks(meta.list_start(self.config.order)) {
            let handle = handle?;
            let count = self.pool.decompress_docids(handle, &mut docids)?;
            self.pool.decompress_scores(handle, &mut scores)?;
            result.extend(
                docids[..count]
                    .iter()
                    .zip(&scores[..count])
                    .map(|(&doc_id, &score)| Posting { doc_id, score }),
            );
        }
        Ok(result)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_terms: self.dictionary.len(),
            num_entries: self.num_entries,
            num_postings: self.postings.iter().map(|m| m.df as u64).sum(),
            staged_postings: self.staging.iter().map(|s| s.len() as u64).sum(),
            num_segments: self.pool.num_segments(),
            pool_words_used: self.pool.words_used(),
            pool_memory_bytes: self.pool.memory_bytes(),
        }
    }

    /// Drop all content, keeping the configuration
    pub fn clear(&mut self) -> Result<()> {
        *self = Self::new(self.config.clone())?;
        Ok(())
    }
}
