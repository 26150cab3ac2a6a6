//! Milvus adapter over the v2 REST surface.
//!
//! Kept deliberately thin: configuration is validated at construction, the
//! four seam operations map one-to-one onto `/v2/vectordb/entities/*`
//! endpoints, and search parameters are fixed to an L2 metric over a flat
//! index.

use std::time::Duration;

use mcp_bridge_core::config::MilvusConfig;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{
    DeleteRequest, IndexStats, QueryMatch, QueryResponse, UpsertResponse, VectorClient,
    VectorRecord,
};
use crate::error::{Error, Result};

/// Similarity metric used for every search.
pub const METRIC_TYPE: &str = "L2";

/// Timeout applied to every backend request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Milvus v2 REST client.
#[derive(Debug, Clone)]
pub struct MilvusClient {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    database: Option<String>,
    bearer: Option<String>,
}

impl MilvusClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the address or collection name
    /// is missing.
    pub fn new(config: &MilvusConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(Error::InvalidConfig("milvus address is required".to_string()));
        }
        if config.collection_name.is_empty() {
            return Err(Error::InvalidConfig(
                "milvus collection_name is required".to_string(),
            ));
        }

        let base_url = if config.address.starts_with("http://")
            || config.address.starts_with("https://")
        {
            config.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", config.address.trim_end_matches('/'))
        };

        // API key wins; otherwise Milvus accepts "user:password" as a token.
        let bearer = if config.api_key.is_empty() {
            if config.username.is_empty() {
                None
            } else {
                Some(format!("{}:{}", config.username, config.password))
            }
        } else {
            Some(config.api_key.clone())
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            collection: config.collection_name.clone(),
            database: if config.database_name.is_empty() {
                None
            } else {
                Some(config.database_name.clone())
            },
            bearer,
        })
    }

    /// The resolved base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, mut body: Value) -> Result<Value> {
        if let (Some(db), Some(obj)) = (&self.database, body.as_object_mut()) {
            obj.insert("dbName".to_string(), json!(db));
        }

        let mut request = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body);
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request.send().await?;
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

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    #[serde(default)]
    distance: f32,
}

#[async_trait::async_trait]
impl VectorClient for MilvusClient {
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        filter: Option<Value>,
        namespace: Option<String>,
    ) -> Result<QueryResponse> {
        let mut body = json!({
            "collectionName": self.collection,
            "data": [vector],
            "limit": top_k,
            "searchParams": {"metricType": METRIC_TYPE, "params": {}},
        });
        if let Some(filter) = &filter {
            body["filter"] = filter.clone();
        }
        if let Some(namespace) = &namespace {
            body["partitionNames"] = json!([namespace]);
        }

        let reply = self.post("/v2/vectordb/entities/search", body).await?;
        let hits: Vec<SearchHit> =
            serde_json::from_value(reply.get("data").cloned().unwrap_or(json!([])))
                .unwrap_or_default();

        Ok(QueryResponse {
            matches: hits
                .into_iter()
                .map(|hit| QueryMatch {
                    id: match hit.id {
                        Value::String(s) => s,
                        other => other.to_string(),
                    },
                    score: hit.distance,
                    values: Vec::new(),
                    metadata: None,
                })
                .collect(),
            namespace: namespace.unwrap_or_default(),
        })
    }

    async fn upsert(
        &self,
        vectors: Vec<VectorRecord>,
        namespace: Option<String>,
    ) -> Result<UpsertResponse> {
        let data: Vec<Value> = vectors
            .iter()
            .map(|record| {
                let mut entity = json!({"id": record.id, "vector": record.values});
                if let (Some(metadata), Some(obj)) = (&record.metadata, entity.as_object_mut()) {
                    obj.insert("metadata".to_string(), metadata.clone());
                }
                entity
            })
            .collect();

        let mut body = json!({"collectionName": self.collection, "data": data});
        if let Some(namespace) = &namespace {
            body["partitionName"] = json!(namespace);
        }

        let reply = self.post("/v2/vectordb/entities/upsert", body).await?;
        let count = reply
            .pointer("/data/upsertCount")
            .and_then(Value::as_u64)
            .unwrap_or(vectors.len() as u64);
        Ok(UpsertResponse {
            upserted_count: count,
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<()> {
        let filter = if request.ids.is_empty() {
            match &request.filter {
                Some(filter) => filter
                    .as_str()
                    .map_or_else(|| filter.to_string(), ToString::to_string),
                // No ids and no filter clears the collection.
                None => "id >= 0".to_string(),
            }
        } else {
            let quoted: Vec<String> = request.ids.iter().map(|id| format!("\"{id}\"")).collect();
            format!("id in [{}]", quoted.join(", "))
        };

        let mut body = json!({"collectionName": self.collection, "filter": filter});
        if let Some(namespace) = &request.namespace {
            body["partitionName"] = json!(namespace);
        }

        self.post("/v2/vectordb/entities/delete", body).await?;
        Ok(())
    }

    async fn describe_index_stats(&self, _filter: Option<Value>) -> Result<IndexStats> {
        let body = json!({"collectionName": self.collection});
        let reply = self
            .post("/v2/vectordb/collections/describe", body)
            .await?;

        Ok(IndexStats {
            dimension: reply
                .pointer("/data/fields/0/params/dim")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            total_vector_count: reply
                .pointer("/data/rowCount")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            namespaces: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> MilvusConfig {
        MilvusConfig {
            address: "127.0.0.1:19530".to_string(),
            collection_name: "memories".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn requires_address_and_collection() {
        let mut cfg = config();
        cfg.address = String::new();
        assert!(matches!(
            MilvusClient::new(&cfg).unwrap_err(),
            Error::InvalidConfig(_)
        ));

        let mut cfg = config();
        cfg.collection_name = String::new();
        assert!(matches!(
            MilvusClient::new(&cfg).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn plain_address_gains_http_scheme() {
        let client = MilvusClient::new(&config()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:19530");
    }

    #[test]
    fn api_key_wins_over_password_auth() {
        let mut cfg = config();
        cfg.username = "root".to_string();
        cfg.password = "hunter2".to_string();
        cfg.api_key = "mk-123".to_string();
        let client = MilvusClient::new(&cfg).unwrap();
        assert_eq!(client.bearer.as_deref(), Some("mk-123"));
    }
}
