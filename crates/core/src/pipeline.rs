use crate::datastore::Datastore;
use crate::traits::{Generator, Retrieval};
use crate::{RunOutput, ServiceError};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 5;

/// Retrieve, resolve passages through the datastore, then generate.
pub struct BasicRunPipeline {
    retrieval: Arc<dyn Retrieval>,
    datastore: Arc<dyn Datastore>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl BasicRunPipeline {
    pub fn new(
        retrieval: Arc<dyn Retrieval>,
        datastore: Arc<dyn Datastore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retrieval,
            datastore,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn run(&self, query: &str) -> Result<RunOutput, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::Request("query is empty".to_string()));
        }

        let retrieved_ids = self.retrieval.retrieve(query, self.top_k).await?;
        let passages = self.datastore.load(&retrieved_ids)?;
        let context = passages
            .iter()
            .map(|passage| passage.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(query, retrieved = retrieved_ids.len(), "generating answer");

        let answer = self.generator.generate(query, &context).await?;
        Ok(RunOutput {
            answer,
            retrieved_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Passage, StoreError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRetrieval(Vec<String>);

    #[async_trait]
    impl Retrieval for FixedRetrieval {
        async fn ingest(&self, _passages: &[Passage]) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn retrieve_with_scores(
            &self,
            _query: &str,
            top_k: usize,
        ) -> Result<Vec<(String, f64)>, ServiceError> {
            Ok(self.0.iter().take(top_k).map(|id| (id.clone(), 1.0)).collect())
        }
    }

    struct MapDatastore(Vec<Passage>);

    impl Datastore for MapDatastore {
        fn load(&self, ids: &[String]) -> Result<Vec<Passage>, StoreError> {
            ids.iter()
                .map(|id| {
                    self.0
                        .iter()
                        .find(|passage| &passage.id == id)
                        .cloned()
                        .ok_or_else(|| StoreError::MissingPassage(id.clone()))
                })
                .collect()
        }

        fn save(&self, _passages: &[Passage]) -> Result<(), StoreError> {
            Ok(())
        }

        fn exists(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        contexts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, query: &str, context: &str) -> Result<String, ServiceError> {
            self.contexts.lock().unwrap().push(context.to_string());
            Ok(format!("answer to {query}"))
        }
    }

    fn datastore() -> Arc<MapDatastore> {
        Arc::new(MapDatastore(vec![
            Passage::new("p1", "first passage"),
            Passage::new("p2", "second passage"),
        ]))
    }

    #[tokio::test]
    async fn generator_sees_retrieved_passages_in_rank_order() -> Result<(), ServiceError> {
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = BasicRunPipeline::new(
            Arc::new(FixedRetrieval(vec!["p2".to_string(), "p1".to_string()])),
            datastore(),
            generator.clone(),
        );

        let output = pipeline.run("which passage").await?;
        assert_eq!(output.answer, "answer to which passage");
        assert_eq!(output.retrieved_ids, vec!["p2".to_string(), "p1".to_string()]);
        assert_eq!(
            generator.contexts.lock().unwrap().as_slice(),
            ["second passage\n\nfirst passage".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn top_k_limits_retrieval() -> Result<(), ServiceError> {
        let pipeline = BasicRunPipeline::new(
            Arc::new(FixedRetrieval(vec!["p1".to_string(), "p2".to_string()])),
            datastore(),
            Arc::new(RecordingGenerator::default()),
        )
        .with_top_k(1);

        let output = pipeline.run("q").await?;
        assert_eq!(output.retrieved_ids, vec!["p1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_passages_surface_as_errors() {
        let pipeline = BasicRunPipeline::new(
            Arc::new(FixedRetrieval(vec!["missing".to_string()])),
            datastore(),
            Arc::new(RecordingGenerator::default()),
        );

        let result = pipeline.run("q").await;
        assert!(matches!(
            result,
            Err(ServiceError::Store(StoreError::MissingPassage(_)))
        ));
    }
}
