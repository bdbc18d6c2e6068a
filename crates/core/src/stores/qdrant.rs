use crate::traits::VectorIndex;
use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Vector index kept in a Qdrant collection. The collection is recreated on build.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
    len: usize,
}

impl QdrantStore {
    pub async fn build(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<Self, SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let vector_size = embeddings.first().map(Vec::len).unwrap_or_default();
        if vector_size == 0 {
            return Err(SearchError::Request(
                "cannot build a qdrant collection without vectors".to_string(),
            ));
        }

        let mut store = Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            vector_size,
            len: 0,
        };

        store.recreate_collection().await?;
        store.upsert(chunks, embeddings).await?;
        store.len = chunks.len();

        info!(
            collection = %store.collection,
            points = store.len,
            vector_size,
            "qdrant collection built"
        );

        Ok(store)
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    async fn recreate_collection(&self) -> Result<(), SearchError> {
        let response = self.client.delete(self.collection_url()).send().await?;
        if response.status().is_server_error() {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "qdrant collection setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), SearchError> {
        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": chunk.chunk_index,
                    "vector": embedding,
                    "payload": {
                        "chunk_id": chunk.chunk_id,
                        "document_id": chunk.document_id,
                        "source_path": chunk.source_path,
                        "page": chunk.page,
                        "chunk_index": chunk.chunk_index,
                        "text": chunk.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    fn len(&self) -> usize {
        self.len
    }

    fn dimensions(&self) -> usize {
        self.vector_size
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        parse_search_hits(&parsed)
    }
}

fn backend_error(status: reqwest::StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<SearchHit>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "search response has no result array".to_string(),
        })?;

    let text_at = |hit: &Value, pointer: &str| {
        hit.pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let mut result = hits
        .iter()
        .map(|hit| {
            let chunk_index = hit
                .pointer("/payload/chunk_index")
                .and_then(Value::as_u64)
                .or_else(|| hit.pointer("/id").and_then(Value::as_u64))
                .unwrap_or_default();
            let page = hit
                .pointer("/payload/page")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32;

            SearchHit {
                chunk: Chunk {
                    chunk_id: text_at(hit, "/payload/chunk_id"),
                    document_id: text_at(hit, "/payload/document_id"),
                    source_path: text_at(hit, "/payload/source_path"),
                    page,
                    chunk_index,
                    text: text_at(hit, "/payload/text"),
                },
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
            }
        })
        .collect::<Vec<_>>();

    result.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then(left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
    });

    Ok(result)
}
