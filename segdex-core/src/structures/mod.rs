pub mod bitpacking;
mod block_handle;
pub mod group_varint;
pub mod pfor_delta;
mod segment_pool;
mod term_dictionary;

/// Postings per compressed block
pub const BLOCK_SIZE: usize = 128;

pub use bitpacking::bits_needed;
pub use block_handle::{BlockHandle, UNDEFINED_POINTER, UNDEFINED_SEGMENT};
pub use pfor_delta::{
    BIT_WIDTHS, DeltaMode, EncodedBlockInfo, MAX_ENCODED_WORDS, RAW_BLOCK_MARKER, decode_block,
    encode_block,
};
pub use segment_pool::{
    BLOCK_HEADER_WORDS, BlockChain, BlockHeader, ListOrder, MAX_BLOCK_WORDS, MAX_POOL_SIZE,
    POOL_FORMAT_VERSION, POOL_MAGIC, SegmentPool,
};
pub use term_dictionary::TermDictionary;
