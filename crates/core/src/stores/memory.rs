use crate::embeddings::cosine_similarity;
use crate::traits::VectorStore;
use crate::{Passage, ServiceError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Brute-force cosine store. Re-adding an id replaces its vector.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<(String, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, passages: &[Passage], embeddings: &[Vec<f32>]) -> Result<(), ServiceError> {
        if passages.len() != embeddings.len() {
            return Err(ServiceError::Request(format!(
                "embedding count {} doesn't match passage count {}",
                embeddings.len(),
                passages.len()
            )));
        }

        let mut entries = self.entries.write().await;
        for (passage, embedding) in passages.iter().zip(embeddings) {
            match entries.iter_mut().find(|(id, _)| *id == passage.id) {
                Some(existing) => existing.1 = embedding.clone(),
                None => entries.push((passage.id.clone(), embedding.clone())),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError> {
        let entries = self.entries.read().await;
        let mut scored: Vec<(String, f64)> = entries
            .iter()
            .map(|(id, vector)| (id.clone(), cosine_similarity(query_vector, vector)))
            .collect();
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError> {
        self.entries
            .write()
            .await
            .retain(|(id, _)| !ids.contains(id));
        Ok(())
    }
}
