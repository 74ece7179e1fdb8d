//! Query execution over compressed postings lists

mod cursor;
mod intersection;

pub use cursor::{PostingCursor, gallop_search};
pub use intersection::{TermPostings, intersect, intersect_into};
