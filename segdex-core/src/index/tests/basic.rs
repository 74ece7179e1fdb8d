use super::index_with;
use crate::index::{IndexConfig, InvertedIndex, ListOrder, Posting};
use crate::structures::BLOCK_SIZE;
use crate::{Error, TERMINAL_DOCID};

#[test]
fn test_insert_and_flush_small() {
    let mut index = index_with(ListOrder::Forward);
    index.insert_doc(1, &[("a", 1), ("b", 1)]).unwrap();
    index.insert_doc(2, &[("a", 1)]).unwrap();
    index.insert_doc(3, &[("a", 1), ("b", 1)]).unwrap();
    index.flush().unwrap();

    let a = index.term_meta("a").unwrap();
    assert_eq!(a.df, 3);
    assert_eq!(a.max_docid, Some(3));
    assert!(a.head.is_some());
    assert_eq!(index.term_meta("b").unwrap().df, 2);

    assert_eq!(index.query(&["a", "b"], 10).unwrap(), vec![1, 3]);
    assert_eq!(index.num_entries(), 3);
    assert_eq!(index.num_terms(), 2);
}

#[test]
fn test_three_document_corpus() {
    let mut index = index_with(ListOrder::Forward);
    index.insert_doc(1, &[("a", 1), ("b", 1)]).unwrap();
    index.insert_doc(2, &[("a", 1)]).unwrap();
    index.insert_doc(3, &[("b", 1)]).unwrap();
    index.flush().unwrap();

    assert_eq!(index.query(&["a"], 10).unwrap(), vec![1, 2]);
    assert_eq!(index.query(&["a", "b"], 10).unwrap(), vec![1]);
    assert_eq!(index.query(&["b"], 10).unwrap(), vec![1, 3]);
}

#[test]
fn test_flush_releases_staging_memory() {
    let mut index = index_with(ListOrder::Forward);
    for docid in 0..200 {
        index.insert_doc(docid, &[("t", 1)]).unwrap();
    }
    let id = index.term_id("t").unwrap() as usize;
    assert!(index.staging[id].capacity() > 0);

    index.flush().unwrap();
    assert_eq!(index.staging[id].capacity(), 0);

    index.insert_doc(200, &[("t", 1)]).unwrap();
    index.flush().unwrap();
    assert_eq!(index.postings("t").unwrap().len(), 201);
}

#[test]
fn test_staging_drains_full_blocks() {
    let mut index = index_with(ListOrder::Forward);
    for docid in 1..=300 {
        index.insert_doc(docid, &[("common", 1)]).unwrap();
    }

    // Two full blocks compressed, the remainder still staged
    let meta = *index.term_meta("common").unwrap();
    assert_eq!(meta.df, 300);
    let blocks = index.pool().blocks(meta.head).count();
    assert_eq!(blocks, 2);
    assert_eq!(index.stats().staged_postings, 300 - 2 * BLOCK_SIZE as u64);

    index.flush().unwrap();
    let meta = *index.term_meta("common").unwrap();
    let handles: Vec<_> = index
        .pool()
        .blocks(meta.head)
        .collect::<crate::Result<_>>()
        .unwrap();
    assert_eq!(handles.len(), 3);
    assert_eq!(handles.last().copied(), meta.tail);

    let last = index.pool().block_header(handles[2]).unwrap();
    assert!(last.is_partial());
    assert_eq!(last.count, 300 - 2 * BLOCK_SIZE);
    assert_eq!(last.boundary_docid, 300);

    let docs: Vec<u32> = index
        .postings("common")
        .unwrap()
        .iter()
        .map(|p| p.doc_id)
        .collect();
    assert_eq!(docs, (1..=300).collect::<Vec<_>>());
    assert_eq!(index.stats().staged_postings, 0);
}

#[test]
fn test_duplicate_terms_collapse() {
    let mut index = index_with(ListOrder::Forward);
    index
        .insert_doc(7, &[("x", 2), ("y", 1), ("x", 3), ("x", u32::MAX)])
        .unwrap();
    index.flush().unwrap();

    let x = index.term_meta("x").unwrap();
    assert_eq!(x.df, 1);
    assert_eq!(x.cf, 3);
    assert_eq!(
        index.postings("x").unwrap(),
        vec![Posting {
            doc_id: 7,
            score: u32::MAX
        }]
    );
    assert_eq!(index.postings("y").unwrap()[0].score, 1);
}

#[test]
fn test_out_of_order_rejected_without_mutation() {
    let mut index = index_with(ListOrder::Forward);
    index.insert_doc(10, &[("a", 1)]).unwrap();

    let err = index.insert_doc(10, &[("fresh", 1), ("a", 1)]).unwrap_err();
    assert!(matches!(
        err,
        Error::DocIdOutOfOrder {
            docid: 10,
            max_docid: 10,
            ..
        }
    ));
    assert_eq!(index.term_id("fresh"), None);
    assert_eq!(index.term_meta("a").unwrap().df, 1);
    assert_eq!(index.num_entries(), 1);

    // Other terms are unconstrained by "a"
    index.insert_doc(5, &[("b", 1)]).unwrap();
    index.insert_doc(11, &[("a", 1), ("b", 1)]).unwrap();
    assert_eq!(index.term_meta("a").unwrap().df, 2);
}

#[test]
fn test_terminal_docid_rejected() {
    let mut index = index_with(ListOrder::Forward);
    assert!(matches!(
        index.insert_doc(TERMINAL_DOCID, &[("a", 1)]),
        Err(Error::InvalidDocId(TERMINAL_DOCID))
    ));
    assert_eq!(index.num_terms(), 0);
}

#[test]
fn test_insert_term_without_postings() {
    let mut index = index_with(ListOrder::Forward);
    let id = index.insert_term("lonely").unwrap();
    assert_eq!(index.insert_term("lonely").unwrap(), id);
    let meta = index.term_meta("lonely").unwrap();
    assert_eq!(meta.df, 0);
    assert_eq!(meta.head, None);
    assert!(index.postings("lonely").unwrap().is_empty());
    assert!(index.query(&["lonely"], 10).unwrap().is_empty());
}

#[test]
fn test_conjunction_scores_by_size() {
    let mut index = index_with(ListOrder::Forward);
    index.insert_conjunction(1, &["red", "car", "red"]).unwrap();
    index.insert_conjunction(2, &["red"]).unwrap();
    index.flush().unwrap();

    assert_eq!(
        index.postings("red").unwrap(),
        vec![
            Posting {
                doc_id: 1,
                score: 2
            },
            Posting {
                doc_id: 2,
                score: 1
            },
        ]
    );
    assert_eq!(index.term_meta("red").unwrap().cf, 3);
    assert_eq!(index.query(&["car", "red"], 10).unwrap(), vec![1]);
}

#[test]
fn test_larger_staging_limit() {
    let mut index = InvertedIndex::new(IndexConfig {
        staging_limit: 4 * BLOCK_SIZE,
        ..Default::default()
    })
    .unwrap();
    for docid in 0..(4 * BLOCK_SIZE as u32 - 1) {
        index.insert_doc(docid, &[("t", 1)]).unwrap();
    }
    assert_eq!(index.term_meta("t").unwrap().head, None);

    index.insert_doc(10_000, &[("t", 1)]).unwrap();
    let meta = *index.term_meta("t").unwrap();
    assert_eq!(index.pool().blocks(meta.head).count(), 4);
    assert_eq!(index.stats().staged_postings, 0);
}

#[test]
fn test_clear_resets_everything() {
    let mut index = index_with(ListOrder::Reverse);
    index.insert_doc(1, &[("a", 1)]).unwrap();
    index.flush().unwrap();
    index.clear().unwrap();

    assert_eq!(index.num_terms(), 0);
    assert_eq!(index.stats().num_segments, 0);
    assert_eq!(index.order(), ListOrder::Reverse);
    index.insert_doc(1, &[("a", 1)]).unwrap();
}
