//! Thread-shareable index handle
//!
//! Writers take the lock exclusively; any number of queries run concurrently
//! under the shared lock.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{IndexStats, InvertedIndex};
use crate::{DocId, Result, Score};

#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<InvertedIndex>>,
}

impl SharedIndex {
    pub fn new(index: InvertedIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, InvertedIndex> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, InvertedIndex> {
        self.inner.write()
    }

    pub fn insert_doc(&self, docid: DocId, terms: &[(&str, Score)]) -> Result<()> {
        self.inner.write().insert_doc(docid, terms)
    }

    pub fn insert_conjunction(&self, conj_id: DocId, terms: &[&str]) -> Result<()> {
        self.inner.write().insert_conjunction(conj_id, terms)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.write().flush()
    }

    pub fn query(&self, terms: &[&str], hits: usize) -> Result<Vec<DocId>> {
        self.inner.read().query(terms, hits)
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }
}

impl From<InvertedIndex> for SharedIndex {
    fn from(index: InvertedIndex) -> Self {
        Self::new(index)
    }
}
