use crate::{Passage, ServiceError};
use async_trait::async_trait;

#[async_trait]
pub trait Retrieval: Send + Sync {
    /// Adds passages to the index and persists whatever the backend needs.
    async fn ingest(&self, passages: &[Passage]) -> Result<(), ServiceError>;

    async fn retrieve_with_scores(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError>;

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>, ServiceError> {
        let scored = self.retrieve_with_scores(query, top_k).await?;
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, query: &str, context: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, passages: &[Passage], embeddings: &[Vec<f32>]) -> Result<(), ServiceError>;

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError>;

    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError>;
}
