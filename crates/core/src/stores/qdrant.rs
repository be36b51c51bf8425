use crate::error::StoreError;
use crate::models::{ChunkMetadata, ChunkPoint, ScoredChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SCROLL_PAGE: usize = 1024;

/// Qdrant-backed vector index. Embeddings and payloads live server-side in a
/// durable collection, so they survive process restarts.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client,
            vector_size,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    async fn create_collection(&self) -> Result<(), StoreError> {
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
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

/// Qdrant point ids must be u64 or UUID. Chunk ids are human-readable
/// (`doc_0_3`), so the point id is a UUID carved from their SHA-256; the
/// readable id stays in the payload. Deterministic, so re-upserting the same
/// chunk id replaces the existing point.
pub(crate) fn point_uuid(chunk_id: &str) -> Uuid {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

pub(crate) fn chunk_payload(point: &ChunkPoint) -> Result<Value, StoreError> {
    let mut payload = serde_json::to_value(&point.metadata)?;
    if let Some(map) = payload.as_object_mut() {
        map.insert("text".to_string(), Value::String(point.text.clone()));
    }
    Ok(payload)
}

pub(crate) fn doc_filter(doc_id: &str) -> Value {
    json!({
        "must": [
            {"key": "doc_id", "match": {"value": doc_id}}
        ]
    })
}

pub(crate) fn parse_search_hits(parsed: &Value) -> Result<Vec<ScoredChunk>, StoreError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::with_capacity(hits.len());
    for hit in hits {
        let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
        let payload = hit
            .pointer("/payload")
            .cloned()
            .ok_or_else(|| StoreError::Request("search hit without payload".to_string()))?;
        let text = payload
            .pointer("/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata: ChunkMetadata = serde_json::from_value(payload)?;

        result.push(ScoredChunk {
            text,
            metadata,
            score,
        });
    }

    Ok(result)
}

pub(crate) fn parse_scroll_page(
    parsed: &Value,
) -> Result<(Vec<ChunkMetadata>, Option<Value>), StoreError> {
    let points = parsed
        .pointer("/result/points")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut metadata = Vec::with_capacity(points.len());
    for point in points {
        let payload = point
            .pointer("/payload")
            .cloned()
            .ok_or_else(|| StoreError::Request("scroll point without payload".to_string()))?;
        metadata.push(serde_json::from_value(payload)?);
    }

    let next_offset = parsed
        .pointer("/result/next_page_offset")
        .filter(|value| !value.is_null())
        .cloned();

    Ok((metadata, next_offset))
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if response.status().is_success() {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        self.create_collection().await
    }

    async fn upsert(&self, points: &[ChunkPoint]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = points
            .iter()
            .map(|point| {
                if point.embedding.len() != self.vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        point.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_uuid(&point.metadata.chunk_id).to_string(),
                    "vector": point.embedding,
                    "payload": chunk_payload(point)?,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn delete_by_doc(&self, doc_id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&json!({ "filter": doc_filter(doc_id) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        // Dropping and recreating the collection is the cheapest full clear
        // and resets any accumulated index state.
        let response = self.client.delete(self.collection_url()).send().await?;

        if !response.status().is_success() && !response.status().is_client_error() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        self.create_collection().await
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if query_embedding.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                query_embedding.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": query_embedding,
            "limit": k,
            "with_payload": true,
        });
        if let Some(doc_id) = doc_id {
            body["filter"] = doc_filter(doc_id);
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_search_hits(&parsed)
    }

    async fn fetch_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError> {
        let mut collected = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(cursor) = &offset {
                body["offset"] = cursor.clone();
            }

            let response = self
                .client
                .post(format!("{}/points/scroll", self.collection_url()))
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(StoreError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: response.status().to_string(),
                });
            }

            let parsed: Value = response.json().await?;
            let (page, next_offset) = parse_scroll_page(&parsed)?;
            collected.extend(page);

            match next_offset {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
        }

        Ok(collected)
    }
}
