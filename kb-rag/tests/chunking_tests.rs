//! Property tests for fixed-size chunking.

use kb_rag::{Chunker, Document, FixedSizeChunker, RagError};
use proptest::prelude::*;

/// Chunk size and an overlap strictly smaller than it.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

/// Text mixing ASCII and multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    let ch = prop_oneof![Just('a'), Just('z'), Just(' '), Just('é'), Just('字'), Just('🦀')];
    proptest::collection::vec(ch, 0..400).prop_map(|chars| chars.into_iter().collect())
}

fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
    match len {
        0 => 0,
        l if l <= size => 1,
        l => (l - overlap).div_ceil(size - overlap),
    }
}

/// *For any* text of length L and chunk parameters S > O, chunking yields
/// `ceil((L - O) / (S - O))` chunks when L > S, one chunk when 0 < L <= S,
/// and none for empty text.
mod prop_chunk_count {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn count_matches_formula((size, overlap) in arb_params(), text in arb_text()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let len = text.chars().count();
            let chunks = chunker.chunk(&Document::new("doc.txt", text));
            prop_assert_eq!(chunks.len(), expected_count(len, size, overlap));
        }
    }
}

/// *For any* text, chunk `i` starts at `i * (S - O)`, no chunk exceeds S
/// characters, and the non-overlapping parts concatenate back to the text.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_document((size, overlap) in arb_params(), text in arb_text()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc.txt", text.clone()));

            let mut rebuilt = String::new();
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.start, i * (size - overlap));
                prop_assert!(chunk.char_len() <= size);
                prop_assert_eq!(&chunk.id, &format!("doc.txt#{i}"));

                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(chunk.text.chars().skip(skip));
            }
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn chunking_is_deterministic((size, overlap) in arb_params(), text in arb_text()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let doc = Document::new("doc.txt", text);
            prop_assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
        }
    }
}

#[test]
fn overlap_equal_to_size_is_a_configuration_error() {
    let err = FixedSizeChunker::new(500, 500).unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)));
}

#[test]
fn default_parameters_over_2500_characters() {
    let chunker = FixedSizeChunker::new(1000, 200).unwrap();
    let chunks = chunker.chunk(&Document::new("long.txt", "x".repeat(2500)));

    let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
    assert_eq!(starts, vec![0, 800, 1600]);
    assert_eq!(chunks[2].char_len(), 900);
}
