//! Data types for documents, chunks, index entries, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A source document containing text content and metadata.
///
/// The `id` defaults to the source identifier, so ingesting the same source
/// twice produces the same chunk ids and overwrites the earlier entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable identifier for the document.
    pub id: String,
    /// Where the text came from (file name or upload name).
    pub source: String,
    /// The text content of the document.
    pub text: String,
    /// Optional domain tag, stored with every chunk and usable as a query filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Additional key-value metadata (not persisted to the index).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document whose id is its source identifier.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: source.clone(),
            source,
            text: text.into(),
            domain: None,
            metadata: HashMap::new(),
        }
    }

    /// Override the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Tag the document with a domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A window of a [`Document`]'s text, before embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier, `{document_id}#{index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Source identifier of the parent document.
    pub source: String,
    /// Domain tag of the parent document.
    pub domain: Option<String>,
    /// Position of this chunk within the document.
    pub index: usize,
    /// Offset of the first character, counted in `char`s.
    pub start: usize,
    /// The text content of the chunk.
    pub text: String,
}

impl Chunk {
    /// Build the id of chunk `index` of document `document_id`.
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{document_id}#{index}")
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Metadata stored alongside each vector in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Source identifier of the document the chunk came from.
    pub source: String,
    /// The chunk text.
    pub text: String,
    /// Domain tag, if the document had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// The ID of the parent document.
    pub document_id: String,
    /// Position of the chunk within the document.
    #[serde(deserialize_with = "deserialize_count")]
    pub chunk_index: usize,
    /// Character offset of the chunk within the document.
    #[serde(deserialize_with = "deserialize_count")]
    pub start: usize,
}

/// Remote indices store metadata numbers as floats; accept either form.
fn deserialize_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        )));
    }
    Ok(value as usize)
}

/// A vector plus metadata, keyed by chunk id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk id.
    pub id: String,
    /// The embedding of the chunk text.
    pub vector: Vec<f32>,
    /// Metadata stored with the vector.
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            vector,
            metadata: EntryMetadata {
                source: chunk.source,
                text: chunk.text,
                domain: chunk.domain,
                document_id: chunk.document_id,
                chunk_index: chunk.index,
                start: chunk.start,
            },
        }
    }
}

/// A retrieved entry paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The chunk id.
    pub id: String,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
    /// Metadata stored with the entry.
    pub metadata: EntryMetadata,
}

impl SearchResult {
    /// The retrieved chunk text.
    pub fn text(&self) -> &str {
        &self.metadata.text
    }

    /// The source identifier of the retrieved chunk.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

/// Equality filter over entry metadata. Unset fields match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    /// Required domain tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Required source identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Required parent document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl MetadataFilter {
    /// Match entries tagged with `domain`.
    pub fn domain(domain: impl Into<String>) -> Self {
        Self { domain: Some(domain.into()), ..Self::default() }
    }

    /// Match entries from `source`.
    pub fn source(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), ..Self::default() }
    }

    /// Whether no field is constrained.
    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.source.is_none() && self.document_id.is_none()
    }

    /// Whether `metadata` satisfies every constrained field.
    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        self.domain.as_ref().is_none_or(|d| metadata.domain.as_ref() == Some(d))
            && self.source.as_ref().is_none_or(|s| &metadata.source == s)
            && self.document_id.as_ref().is_none_or(|id| &metadata.document_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(domain: Option<&str>) -> EntryMetadata {
        EntryMetadata {
            source: "spark.txt".into(),
            text: "Spark is a distributed engine.".into(),
            domain: domain.map(String::from),
            document_id: "spark.txt".into(),
            chunk_index: 0,
            start: 0,
        }
    }

    #[test]
    fn document_id_defaults_to_source() {
        let doc = Document::new("notes/kafka.txt", "text").with_domain("streaming");
        assert_eq!(doc.id, "notes/kafka.txt");
        assert_eq!(doc.domain.as_deref(), Some("streaming"));
    }

    #[test]
    fn filter_matches_on_constrained_fields_only() {
        assert!(MetadataFilter::default().matches(&metadata(None)));
        assert!(MetadataFilter::domain("batch").matches(&metadata(Some("batch"))));
        assert!(!MetadataFilter::domain("batch").matches(&metadata(None)));
        assert!(MetadataFilter::source("spark.txt").matches(&metadata(None)));
        assert!(!MetadataFilter::source("kafka.txt").matches(&metadata(Some("batch"))));
    }

    #[test]
    fn metadata_accepts_float_counts() {
        let json = concat!(
            r#"{"source":"a.txt","text":"t","document_id":"a.txt","#,
            r#""chunk_index":3.0,"start":2400.0}"#
        );
        let parsed: EntryMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chunk_index, 3);
        assert_eq!(parsed.start, 2400);

        let bad = concat!(
            r#"{"source":"a.txt","text":"t","document_id":"a.txt","#,
            r#""chunk_index":1.5,"start":0}"#
        );
        assert!(serde_json::from_str::<EntryMetadata>(bad).is_err());
    }

    #[test]
    fn absent_domain_is_not_serialized() {
        let json = serde_json::to_value(metadata(None)).unwrap();
        assert!(json.get("domain").is_none());
    }
}
