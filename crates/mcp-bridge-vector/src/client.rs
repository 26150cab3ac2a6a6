//! The adapter seam between the gateway and vector-database backends.
//!
//! Every backend exposes the same four operations through [`VectorClient`];
//! the gateway's fixed tool surface (see [`crate::tools`]) is written
//! against this trait and never against a concrete backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One stored vector with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record ID.
    pub id: String,
    /// Vector components.
    pub values: Vec<f32>,
    /// Arbitrary metadata attached to the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record ID.
    pub id: String,
    /// Similarity score.
    #[serde(default)]
    pub score: f32,
    /// Vector components, when the backend returns them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f32>,
    /// Metadata attached to the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Result of a similarity query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Hits, best first.
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
    /// Namespace the query ran in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// Result of an upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertResponse {
    /// Number of vectors written.
    #[serde(default)]
    pub upserted_count: u64,
}

/// Index statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Vector dimensionality.
    #[serde(default)]
    pub dimension: u64,
    /// Total stored vectors.
    #[serde(default)]
    pub total_vector_count: u64,
    /// Per-namespace details, passed through from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Value>,
}

/// Deletion request, as understood by the backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteRequest {
    /// Record IDs to delete.
    pub ids: Vec<String>,
    /// Namespace to delete from.
    pub namespace: Option<String>,
    /// Metadata filter selecting records to delete.
    pub filter: Option<Value>,
}

/// The four operations every vector backend supports.
#[async_trait::async_trait]
pub trait VectorClient: Send + Sync {
    /// Similarity search.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<Value>,
        namespace: Option<String>,
    ) -> Result<QueryResponse>;

    /// Write vectors, replacing records with matching IDs.
    async fn upsert(
        &self,
        vectors: Vec<VectorRecord>,
        namespace: Option<String>,
    ) -> Result<UpsertResponse>;

    /// Delete records by ID and/or filter. A request with neither deletes
    /// everything in the namespace.
    async fn delete(&self, request: DeleteRequest) -> Result<()>;

    /// Describe the index, optionally narrowed by a metadata filter.
    async fn describe_index_stats(&self, filter: Option<Value>) -> Result<IndexStats>;
}
