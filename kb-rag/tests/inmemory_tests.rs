//! Property tests for in-memory index query ordering.

use std::collections::HashMap;

use kb_rag::{EntryMetadata, InMemoryVectorIndex, IndexEntry, MetadataFilter, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized vector of the given dimension.
fn arb_normalized_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero vector", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate an entry with a normalized vector and one of two domains.
fn arb_entry(dim: usize) -> impl Strategy<Value = IndexEntry> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_vector(dim), prop::bool::ANY).prop_map(
        |(id, text, vector, batch)| IndexEntry {
            id: format!("{id}#0"),
            vector,
            metadata: EntryMetadata {
                source: format!("{id}.txt"),
                text,
                domain: Some(if batch { "batch" } else { "streaming" }.to_string()),
                document_id: id,
                chunk_index: 0,
                start: 0,
            },
        },
    )
}

fn dedupe(entries: &[IndexEntry]) -> Vec<IndexEntry> {
    let mut unique: HashMap<String, IndexEntry> = HashMap::new();
    for entry in entries {
        unique.entry(entry.id.clone()).or_insert_with(|| entry.clone());
    }
    unique.into_values().collect()
}

/// *For any* set of entries stored in an [`InMemoryVectorIndex`], querying
/// returns results ordered by descending cosine similarity, and the number of
/// results is at most `top_k`.
mod prop_inmemory_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_vector(DIM),
            top_k in 1usize..25,
        ) {
            let unique = dedupe(&entries);
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.create_index("test", DIM).await.unwrap();
                index.upsert("test", &unique).await.unwrap();
                index.query("test", &query, top_k, None).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn filtered_results_match_the_filter(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_vector(DIM),
        ) {
            let unique = dedupe(&entries);
            let filter = MetadataFilter::domain("batch");
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.create_index("test", DIM).await.unwrap();
                index.upsert("test", &unique).await.unwrap();
                index.query("test", &query, 50, Some(&filter)).await.unwrap()
            });

            let expected = unique.iter().filter(|e| filter.matches(&e.metadata)).count();
            prop_assert_eq!(results.len(), expected);
            prop_assert!(results.iter().all(|r| r.metadata.domain.as_deref() == Some("batch")));
        }
    }
}
