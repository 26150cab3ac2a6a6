//! Pinecone HTTP adapter.
//!
//! Speaks the classic Pinecone data-plane API: JSON over POST with an
//! `Api-Key` header against `/query`, `/vectors/upsert`, `/vectors/delete`,
//! and `/describe_index_stats`. The base URL is either the configured host
//! or constructed as `https://{index}-{project}.svc.{env}.pinecone.io`.

use std::time::Duration;

use mcp_bridge_core::config::PineconeConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{
    DeleteRequest, IndexStats, QueryMatch, QueryResponse, UpsertResponse, VectorClient,
    VectorRecord,
};
use crate::error::{Error, Result};

/// Timeout applied to every backend request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pinecone data-plane client.
#[derive(Debug, Clone)]
pub struct PineconeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PineconeClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the API key is missing, or
    /// when neither a host nor the `{index_name, project_id, environment}`
    /// triple is provided.
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::InvalidConfig("pinecone api_key is required".to_string()));
        }

        let base_url = if config.host.is_empty() {
            if config.index_name.is_empty()
                || config.project_id.is_empty()
                || config.environment.is_empty()
            {
                return Err(Error::InvalidConfig(
                    "pinecone requires either host or index_name, project_id, and environment"
                        .to_string(),
                ));
            }
            format!(
                "https://{}-{}.svc.{}.pinecone.io",
                config.index_name, config.project_id, config.environment
            )
        } else if config.host.starts_with("http://") || config.host.starts_with("https://") {
            config.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.host.trim_end_matches('/'))
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// The resolved base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(rename = "includeValues")]
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryReply {
    #[serde(default)]
    matches: Vec<QueryMatch>,
    #[serde(default)]
    namespace: String,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct UpsertReply {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: u64,
}

fn slice_is_empty(ids: &&[String]) -> bool {
    ids.is_empty()
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    #[serde(skip_serializing_if = "slice_is_empty")]
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(rename = "deleteAll", skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
}

#[derive(Serialize)]
struct StatsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Deserialize)]
struct StatsReply {
    #[serde(default)]
    dimension: u64,
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: Option<Value>,
}

#[async_trait::async_trait]
impl VectorClient for PineconeClient {
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<Value>,
        namespace: Option<String>,
    ) -> Result<QueryResponse> {
        let reply: QueryReply = self
            .post(
                "/query",
                &QueryBody {
                    vector: &vector,
                    top_k,
                    filter: filter.as_ref(),
                    namespace: namespace.as_deref(),
                    include_metadata: true,
                    include_values: false,
                },
            )
            .await?;
        Ok(QueryResponse {
            matches: reply.matches,
            namespace: reply.namespace,
        })
    }

    async fn upsert(
        &self,
        vectors: Vec<VectorRecord>,
        namespace: Option<String>,
    ) -> Result<UpsertResponse> {
        let reply: UpsertReply = self
            .post(
                "/vectors/upsert",
                &UpsertBody {
                    vectors: &vectors,
                    namespace: namespace.as_deref(),
                },
            )
            .await?;
        Ok(UpsertResponse {
            upserted_count: reply.upserted_count,
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<()> {
        // Without ids and without a filter the whole namespace is cleared.
        let delete_all = request.ids.is_empty() && request.filter.is_none();
        let _: Value = self
            .post(
                "/vectors/delete",
                &DeleteBody {
                    ids: &request.ids,
                    namespace: request.namespace.as_deref(),
                    filter: request.filter.as_ref(),
                    delete_all,
                },
            )
            .await?;
        Ok(())
    }

    async fn describe_index_stats(&self, filter: Option<Value>) -> Result<IndexStats> {
        let reply: StatsReply = self
            .post(
                "/describe_index_stats",
                &StatsBody {
                    filter: filter.as_ref(),
                },
            )
            .await?;
        Ok(IndexStats {
            dimension: reply.dimension,
            total_vector_count: reply.total_vector_count,
            namespaces: reply.namespaces,
        })
    }
}
