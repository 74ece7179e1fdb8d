mod basic;

use crate::index::{IndexConfig, InvertedIndex, ListOrder};

fn index_with(order: ListOrder) -> InvertedIndex {
    InvertedIndex::new(IndexConfig {
        order,
        ..Default::default()
    })
    .unwrap()
}
