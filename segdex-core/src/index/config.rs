//! Index configuration

use serde::{Deserialize, Serialize};

use crate::structures::{BLOCK_SIZE, MAX_BLOCK_WORDS, MAX_POOL_SIZE};
use crate::{Error, Result};

pub use crate::structures::ListOrder;

/// Configuration for an [`InvertedIndex`](super::InvertedIndex)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Words per pool segment
    pub segment_capacity: usize,
    /// Block order of every postings list
    pub order: ListOrder,
    /// Staged postings per term that trigger compression; a multiple of
    /// `BLOCK_SIZE`
    pub staging_limit: usize,
    /// First allocation of a term's staging buffer
    pub initial_staging_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            segment_capacity: MAX_POOL_SIZE,
            order: ListOrder::Forward,
            staging_limit: BLOCK_SIZE,
            initial_staging_capacity: 4,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity < MAX_BLOCK_WORDS {
            return Err(Error::Config(format!(
                "segment_capacity must be at least {} words, got {}",
                MAX_BLOCK_WORDS, self.segment_capacity
            )));
        }
        if self.staging_limit == 0 || self.staging_limit % BLOCK_SIZE != 0 {
            return Err(Error::Config(format!(
                "staging_limit must be a positive multiple of {}, got {}",
                BLOCK_SIZE, self.staging_limit
            )));
        }
        if self.initial_staging_capacity == 0 || self.initial_staging_capacity > self.staging_limit
        {
            return Err(Error::Config(format!(
                "initial_staging_capacity must be in 1..={}, got {}",
                self.staging_limit, self.initial_staging_capacity
            )));
        }
        Ok(())
    }
}
