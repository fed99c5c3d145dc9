use crate::text::text_modifier;
use crate::traits::VectorStore;
use crate::{Passage, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

/// Chroma HTTP adapter. Only vectors and a `passage_id` metadata entry are
/// stored; passage content stays in the datastore.
pub struct ChromaStore {
    endpoint: String,
    collection: String,
    client: Client,
    collection_id: OnceCell<String>,
}

impl ChromaStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            collection_id: OnceCell::new(),
        }
    }

    pub async fn ensure_collection(&self) -> Result<&str, ServiceError> {
        let id = self
            .collection_id
            .get_or_try_init(|| self.create_collection())
            .await?;
        Ok(id.as_str())
    }

    async fn create_collection(&self) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{}/api/v1/collections", self.endpoint))
            .json(&json!({ "name": self.collection, "get_or_create": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let body: Value = response.json().await?;
        body.pointer("/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| backend_error("collection response has no id".to_string()))
    }

    fn collection_url(&self, collection_id: &str, action: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.endpoint, collection_id, action
        )
    }

    async fn post(&self, action: &str, body: Value) -> Result<Value, ServiceError> {
        let collection_id = self.ensure_collection().await?;
        let response = self
            .client
            .post(self.collection_url(collection_id, action))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }
        Ok(response.json().await?)
    }
}

fn backend_error(details: String) -> ServiceError {
    ServiceError::BackendResponse {
        backend: "chroma".to_string(),
        details,
    }
}

fn upsert_body(passages: &[Passage], embeddings: &[Vec<f32>]) -> Value {
    let ids: Vec<&str> = passages.iter().map(|passage| passage.id.as_str()).collect();
    let metadatas: Vec<Value> = passages
        .iter()
        .map(|passage| json!({ "passage_id": passage.id }))
        .collect();
    let documents = vec![""; passages.len()];

    json!({
        "ids": ids,
        "embeddings": embeddings,
        "metadatas": metadatas,
        "documents": documents,
    })
}

/// Reads the first result row of a Chroma query response. Distances become
/// `1 / (1 + distance)` so larger is better. Collections written by other
/// clients may spell the metadata key as `passageId`, `Passage-Id`, etc.
fn parse_query_response(body: &Value) -> Vec<(String, f64)> {
    let id_keys = text_modifier("passage_id", &["passageId".to_string()]);
    let ids = body
        .pointer("/ids/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    ids.iter()
        .enumerate()
        .filter_map(|(position, raw_id)| {
            let metadata = body.pointer(&format!("/metadatas/0/{position}"));
            let passage_id = id_keys
                .iter()
                .find_map(|key| metadata.and_then(|entry| entry.get(key)).and_then(Value::as_str))
                .or_else(|| raw_id.as_str())?;
            let distance = body
                .pointer(&format!("/distances/0/{position}"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Some((passage_id.to_string(), 1.0 / (1.0 + distance.max(0.0))))
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn add(&self, passages: &[Passage], embeddings: &[Vec<f32>]) -> Result<(), ServiceError> {
        if passages.len() != embeddings.len() {
            return Err(ServiceError::Request(format!(
                "embedding count {} doesn't match passage count {}",
                embeddings.len(),
                passages.len()
            )));
        }
        if passages.is_empty() {
            return Ok(());
        }

        self.post("upsert", upsert_body(passages, embeddings)).await?;
        Ok(())
    }

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError> {
        let body = self
            .post(
                "query",
                json!({
                    "query_embeddings": [query_vector],
                    "n_results": top_k,
                    "include": ["metadatas", "distances"],
                }),
            )
            .await?;
        Ok(parse_query_response(&body))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post("delete", json!({ "ids": ids })).await?;
        Ok(())
    }
}
