use crate::embeddings::Embedder;
use crate::traits::{Retrieval, VectorStore};
use crate::{Passage, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

/// Dense retrieval: embeds with `E` and delegates storage to any [`VectorStore`].
pub struct VectorRetrieval<E: Embedder> {
    store: Arc<dyn VectorStore>,
    embedder: E,
}

impl<E: Embedder> VectorRetrieval<E> {
    pub fn new(store: Arc<dyn VectorStore>, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), ServiceError> {
        self.store.delete(ids).await
    }
}

#[async_trait]
impl<E: Embedder> Retrieval for VectorRetrieval<E> {
    async fn ingest(&self, passages: &[Passage]) -> Result<(), ServiceError> {
        let contents: Vec<&str> = passages.iter().map(|passage| passage.content.as_str()).collect();
        let embeddings = self.embedder.embed_documents(&contents);
        self.store.add(passages, &embeddings).await
    }

    async fn retrieve_with_scores(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError> {
        let query_vector = self.embedder.embed(query);
        self.store.query(&query_vector, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::stores::InMemoryVectorStore;

    #[tokio::test]
    async fn closest_passage_is_retrieved_first() -> Result<(), ServiceError> {
        let retrieval = VectorRetrieval::new(
            Arc::new(InMemoryVectorStore::new()),
            HashingEmbedder::default(),
        );
        retrieval
            .ingest(&[
                Passage::new("garden", "squirrels dig in the garden beds"),
                Passage::new("finance", "bond yields rose sharply"),
            ])
            .await?;

        let ids = retrieval.retrieve("squirrels garden", 1).await?;
        assert_eq!(ids, vec!["garden".to_string()]);

        retrieval.delete(&["garden".to_string()]).await?;
        let ids = retrieval.retrieve("squirrels garden", 2).await?;
        assert_eq!(ids, vec!["finance".to_string()]);
        Ok(())
    }
}
