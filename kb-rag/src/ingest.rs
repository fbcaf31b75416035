//! Document ingestion: chunk, embed, upsert.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::document::{Document, IndexEntry};
use crate::error::{RagError, Result, Service};
use crate::index::IndexHandle;
use crate::pipeline::RagPipeline;

/// A document that was fully written to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    /// The document id.
    pub document_id: String,
    /// The document's source identifier.
    pub source: String,
    /// Number of chunks upserted.
    pub chunk_count: usize,
}

/// A document that could not be ingested.
#[derive(Debug)]
pub struct DocumentFailure {
    /// The document id.
    pub document_id: String,
    /// The document's source identifier.
    pub source: String,
    /// Why ingestion failed.
    pub error: RagError,
}

/// Per-document result of an [`ingest`](RagPipeline::ingest) call.
///
/// Documents appear in input order in exactly one of the two lists.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents whose chunks were all written.
    pub succeeded: Vec<DocumentOutcome>,
    /// Documents that failed, with the error for each.
    pub failed: Vec<DocumentFailure>,
}

impl IngestReport {
    /// Whether every document was ingested.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total chunks written across successful documents.
    pub fn total_chunks(&self) -> usize {
        self.succeeded.iter().map(|o| o.chunk_count).sum()
    }

    /// Number of documents processed.
    pub fn document_count(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl RagPipeline {
    /// Ingest `documents` into the handle's index.
    ///
    /// Each document is chunked, its chunks embedded in one batch, and the
    /// resulting entries upserted in batches of `upsert_batch_size`. A
    /// failure affecting one document is recorded in the report and does
    /// not stop the others. Re-ingesting a document overwrites its entries
    /// because chunk ids derive from the document id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if the index does not exist; no
    /// further documents are attempted in that case.
    pub async fn ingest(
        &self,
        handle: &IndexHandle,
        documents: &[Document],
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for document in documents {
            match self.ingest_document(handle, document).await {
                Ok(chunk_count) => report.succeeded.push(DocumentOutcome {
                    document_id: document.id.clone(),
                    source: document.source.clone(),
                    chunk_count,
                }),
                Err(err @ RagError::IndexNotFound { .. }) => {
                    error!(index = handle.name(), "index missing, aborting ingestion");
                    return Err(err);
                }
                Err(err) => {
                    error!(document.id = %document.id, error = %err, "failed to ingest document");
                    report.failed.push(DocumentFailure {
                        document_id: document.id.clone(),
                        source: document.source.clone(),
                        error: err,
                    });
                }
            }
        }

        info!(
            index = handle.name(),
            documents = report.document_count(),
            failed = report.failed.len(),
            chunks = report.total_chunks(),
            "ingestion complete"
        );
        Ok(report)
    }

    /// Ingest one document and return the number of chunks written.
    ///
    /// A document with no text produces no chunks and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns the first embedding or index error. Batches upserted before
    /// the failure stay in the index.
    pub async fn ingest_document(
        &self,
        handle: &IndexHandle,
        document: &Document,
    ) -> Result<usize> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            warn!(document.id = %document.id, "document has no text, nothing to ingest");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embed_texts(&texts).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::from_chunk(chunk, vector))
            .collect();

        let client = handle.client();
        for batch in entries.chunks(self.config.upsert_batch_size) {
            self.policy
                .run(Service::VectorIndex, "upsert", || client.upsert(handle.name(), batch))
                .await?;
        }

        info!(
            document.id = %document.id,
            index = handle.name(),
            chunk_count = entries.len(),
            "ingested document"
        );
        Ok(entries.len())
    }
}
