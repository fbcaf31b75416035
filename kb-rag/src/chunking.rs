//! Document chunking.
//!
//! [`FixedSizeChunker`] splits text into overlapping windows of a fixed
//! number of characters. Chunk `i` starts at character
//! `i * (chunk_size - chunk_overlap)`, so boundaries depend only on the text
//! length and the two parameters, and re-chunking an unchanged document always
//! yields the same chunks and ids.

use std::iter;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s without embeddings; vectors are
/// attached later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}#{chunk_index}`. The final chunk
/// may be shorter than `chunk_size`.
///
/// # Example
///
/// ```rust
/// use kb_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(1000, 200).unwrap();
/// let chunks = chunker.chunk(&Document::new("a.txt", "x".repeat(2500)));
/// let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
/// assert_eq!(starts, [0, 800, 1600]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Character ranges `[start, end)` of every chunk for a text of
    /// `char_len` characters.
    pub fn windows(&self, char_len: usize) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        let mut start = 0;
        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            windows.push((start, end));
            if end == char_len {
                break;
            }
            start += self.step();
        }
        windows
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(iter::once(text.len())).collect();
        let char_len = boundaries.len() - 1;

        self.windows(char_len)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Chunk {
                id: Chunk::make_id(&document.id, index),
                document_id: document.id.clone(),
                source: document.source.clone(),
                domain: document.domain.clone(),
                index,
                start,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = FixedSizeChunker::new(500, 500).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert!(FixedSizeChunker::new(500, 600).is_err());
        assert!(FixedSizeChunker::new(0, 0).is_err());
    }

    #[test]
    fn thousand_by_two_hundred_over_2500_chars() {
        let chunker = FixedSizeChunker::new(1000, 200).unwrap();
        let doc = Document::new("guide.txt", "a".repeat(2500));
        let chunks = chunker.chunk(&doc);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.start).collect::<Vec<_>>(), [0, 800, 1600]);
        assert_eq!(chunks[2].char_len(), 900);
        assert_eq!(chunks[1].id, "guide.txt#1");
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = FixedSizeChunker::new(100, 20).unwrap();
        let chunks = chunker.chunk(&Document::new("s.txt", "short"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = FixedSizeChunker::new(100, 20).unwrap();
        assert!(chunker.chunk(&Document::new("e.txt", "")).is_empty());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&Document::new("u.txt", "héllo wörld"));
        assert!(chunks.iter().all(|c| c.char_len() <= 4));
        assert_eq!(chunks[0].text, "héll");
        assert_eq!(chunks[1].text, "lo w");
    }

    #[test]
    fn chunks_carry_document_context() {
        let chunker = FixedSizeChunker::new(10, 2).unwrap();
        let doc = Document::new("k.txt", "kafka topics and partitions").with_domain("streaming");
        for (i, chunk) in chunker.chunk(&doc).iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.document_id, "k.txt");
            assert_eq!(chunk.source, "k.txt");
            assert_eq!(chunk.domain.as_deref(), Some("streaming"));
        }
    }
}
