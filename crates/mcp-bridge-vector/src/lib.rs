//! Vector-database upstreams for the mcp-bridge gateway.
//!
//! A vector upstream has no descriptors to discover: the gateway registers
//! a fixed surface of four tools (`query`, `upsert`, `delete`,
//! `describe_index_stats`) whose handlers coerce loosely-typed caller
//! arguments and delegate to a backend through the [`VectorClient`] seam.
//! Two backends ship here: Pinecone (classic data-plane HTTP API) and
//! Milvus (v2 REST surface).

mod client;
mod error;
mod milvus;
mod pinecone;
mod tools;

pub use client::{
    DeleteRequest, IndexStats, QueryMatch, QueryResponse, UpsertResponse, VectorClient,
    VectorRecord,
};
pub use error::{Error, Result};
pub use milvus::{MilvusClient, METRIC_TYPE};
pub use pinecone::{PineconeClient, REQUEST_TIMEOUT};
pub use tools::{
    coerce_filter, coerce_ids, coerce_top_k, coerce_vector, vector_tools, DEFAULT_TOP_K,
};
