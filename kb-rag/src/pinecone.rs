//! Pinecone vector index backend.
//!
//! Provides [`PineconeIndex`], which implements [`VectorIndex`] over
//! Pinecone's REST API with `reqwest`. This module is only available when the
//! `pinecone` feature is enabled.
//!
//! Index management (describe, create) goes to the control plane at
//! `https://api.pinecone.io`; upserts and queries go to the per-index data
//! plane host reported by the control plane. Hosts are resolved once per
//! index and forgotten again if the data plane reports the index missing.
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_rag::pinecone::PineconeIndex;
//!
//! let index = PineconeIndex::from_env()?;
//! index.create_index("de-knowledge-base", 1536).await?;
//! index.upsert("de-knowledge-base", &entries).await?;
//! let results = index.query("de-knowledge-base", &query_embedding, 5, None).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{EntryMetadata, IndexEntry, MetadataFilter, SearchResult};
use crate::error::{RagError, Result, Service};
use crate::http;
use crate::index::{IndexDescription, VectorIndex};

/// The Pinecone control plane endpoint.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// The API version sent with every request.
pub const API_VERSION: &str = "2024-07";

/// Where serverless indices are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessSpec {
    /// Cloud provider, e.g. `aws`.
    pub cloud: String,
    /// Region, e.g. `us-east-1`.
    pub region: String,
}

impl Default for ServerlessSpec {
    fn default() -> Self {
        Self { cloud: "aws".into(), region: "us-east-1".into() }
    }
}

/// A [`VectorIndex`] backed by [Pinecone](https://www.pinecone.io/).
///
/// Entry metadata is stored as Pinecone metadata, so `source`, `text` and
/// `domain` come back with every match and `domain`/`source` can be used in
/// query filters.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    control_plane_url: String,
    namespace: Option<String>,
    spec: ServerlessSpec,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeIndex {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::permanent(Service::VectorIndex, "API key must not be empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            control_plane_url: CONTROL_PLANE_URL.into(),
            namespace: None,
            spec: ServerlessSpec::default(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    /// Create a client using the `PINECONE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY").map_err(|_| {
            RagError::permanent(
                Service::VectorIndex,
                "PINECONE_API_KEY environment variable not set",
            )
        })?;
        Self::new(api_key)
    }

    /// Write to and read from a namespace instead of the default one.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set where [`create_index`](VectorIndex::create_index) provisions indices.
    pub fn with_serverless_spec(mut self, spec: ServerlessSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Use a different control plane URL.
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pin the data plane host of `index`, skipping the control plane lookup.
    pub fn with_host(mut self, index: impl Into<String>, host: impl Into<String>) -> Self {
        self.hosts.get_mut().insert(index.into(), host.into());
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Api-Key", &self.api_key).header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn fetch_index(&self, index: &str) -> Result<Option<IndexModel>> {
        let response = self
            .authorized(self.client.get(format!("{}/indexes/{index}", self.control_plane_url)))
            .send()
            .await
            .map_err(|e| http::request_error(Service::VectorIndex, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(http::status_error(Service::VectorIndex, response).await);
        }

        let model: IndexModel =
            response.json().await.map_err(|e| http::request_error(Service::VectorIndex, e))?;
        Ok(Some(model))
    }

    /// Base URL of the data plane for `index`.
    async fn data_plane_url(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host_url(host));
        }

        let model = self
            .fetch_index(index)
            .await?
            .ok_or_else(|| RagError::IndexNotFound { index: index.to_string() })?;

        debug!(index, host = %model.host, "resolved pinecone data plane host");
        let url = host_url(&model.host);
        self.hosts.write().await.insert(index.to_string(), model.host);
        Ok(url)
    }

    /// Send a data plane request, mapping 404 to [`RagError::IndexNotFound`].
    async fn data_plane_post<B: Serialize>(
        &self,
        index: &str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.data_plane_url(index).await?);
        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .await
            .map_err(|e| http::request_error(Service::VectorIndex, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            self.hosts.write().await.remove(index);
            return Err(RagError::IndexNotFound { index: index.to_string() });
        }
        if !response.status().is_success() {
            return Err(http::status_error(Service::VectorIndex, response).await);
        }
        Ok(response)
    }
}

fn host_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Translate a [`MetadataFilter`] into Pinecone's filter language.
fn filter_expression(filter: &MetadataFilter) -> Value {
    let mut clauses = Map::new();
    let fields = [
        ("domain", &filter.domain),
        ("source", &filter.source),
        ("document_id", &filter.document_id),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            clauses.insert(field.to_string(), json!({ "$eq": value }));
        }
    }
    Value::Object(clauses)
}

// ── Pinecone API request/response types ────────────────────────────

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a EntryMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<EntryMetadata>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>> {
        Ok(self.fetch_index(index).await?.map(|model| IndexDescription {
            name: model.name,
            dimensions: model.dimension,
            ready: model.status.ready,
        }))
    }

    async fn create_index(&self, index: &str, dimensions: usize) -> Result<()> {
        if self.fetch_index(index).await?.is_some() {
            debug!(index, "pinecone index already exists, skipping creation");
            return Ok(());
        }

        let body = json!({
            "name": index,
            "dimension": dimensions,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": self.spec.cloud, "region": self.spec.region } },
        });
        let response = self
            .authorized(self.client.post(format!("{}/indexes", self.control_plane_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error(Service::VectorIndex, e))?;

        // Another writer may have created it between the lookup and this call.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(http::status_error(Service::VectorIndex, response).await);
        }

        info!(
            index,
            dimensions,
            cloud = %self.spec.cloud,
            region = %self.spec.region,
            "created pinecone index"
        );
        Ok(())
    }

    async fn upsert(&self, index: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let body = UpsertRequest {
            vectors: entries
                .iter()
                .map(|e| UpsertVector { id: &e.id, values: &e.vector, metadata: &e.metadata })
                .collect(),
            namespace: self.namespace.as_deref(),
        };
        self.data_plane_post(index, "/vectors/upsert", &body).await?;

        debug!(index, count = entries.len(), "upserted entries to pinecone");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter: filter.filter(|f| !f.is_empty()).map(filter_expression),
            namespace: self.namespace.as_deref(),
        };
        let response = self.data_plane_post(index, "/query", &body).await?;
        let parsed: QueryResponse =
            response.json().await.map_err(|e| http::request_error(Service::VectorIndex, e))?;

        let mut results = Vec::with_capacity(parsed.matches.len());
        for matched in parsed.matches {
            let metadata = matched.metadata.ok_or_else(|| {
                RagError::permanent(
                    Service::VectorIndex,
                    format!("match '{}' has no entry metadata", matched.id),
                )
            })?;
            results.push(SearchResult { id: matched.id, score: matched.score, metadata });
        }
        results.truncate(top_k);
        Ok(results)
    }

    fn backend(&self) -> &str {
        "pinecone"
    }
}
