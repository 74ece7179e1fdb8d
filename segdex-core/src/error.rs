//! Error types for segdex

use std::io;

use crate::DocId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index corruption: {0}")]
    Corruption(String),

    #[error("Incompatible format: {0}")]
    IncompatibleFormat(String),

    #[error("Invalid block handle: segment {segment}, offset {offset}")]
    InvalidHandle { segment: u32, offset: u32 },

    #[error("Invalid document id: {0}")]
    InvalidDocId(DocId),

    #[error("Document id {docid} is not greater than {max_docid} already indexed for term {term:?}")]
    DocIdOutOfOrder {
        term: String,
        docid: DocId,
        max_docid: DocId,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
