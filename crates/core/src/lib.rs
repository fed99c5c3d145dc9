pub mod chunking;
pub mod dataset;
pub mod datastore;
pub mod embeddings;
pub mod error;
pub mod evaluator;
pub mod file_check;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod stores;
pub mod text;
pub mod traits;

pub use chunking::{build_passages, chunk_text, make_passage_id, ChunkingConfig};
pub use dataset::{MsMarcoDataset, MsMarcoRow};
pub use datastore::{Datastore, JsonFileDatastore};
pub use embeddings::{cosine_similarity, Embedder, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EvalError, ServiceError, StoreError};
pub use evaluator::{score_example, summarize, MsMarcoEvaluator};
pub use file_check::{check_file_type, file_exists, file_type};
pub use ingest::{discover_documents, ingest_folder_passages, IngestionReport, SkippedDocument};
pub use llm::{build_prompt, GeneratorConfig, OpenAiGenerator};
pub use loader::{DocumentLoader, FileLoader};
pub use metrics::{parse_metrics, Metric, MetricInput};
pub use models::{
    EvaluationSummary, IngestionOptions, Passage, PredictionResult, QueryExample, RunOutput,
};
pub use pipeline::{BasicRunPipeline, DEFAULT_TOP_K};
pub use retrieval::{Bm25Index, Bm25Parameters, Bm25Retrieval, VectorRetrieval};
pub use stores::{ChromaStore, InMemoryVectorStore};
pub use text::{normalize_answer, normalize_whitespace, slice_stop_words, text_modifier};
pub use traits::{Generator, Retrieval, VectorStore};
