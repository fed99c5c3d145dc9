use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Passage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            filepath: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One labelled benchmark item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryExample {
    pub query_id: String,
    pub query: String,
    pub answers: Vec<String>,
    pub relevant_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutput {
    pub answer: String,
    pub retrieved_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub question: String,
    pub answer: String,
    pub retrieved_ids: Vec<String>,
    pub ground_truth_answers: Vec<String>,
    pub ground_truth_ids: Vec<String>,
    /// One column per metric name in the serialized row.
    #[serde(flatten)]
    pub scores: BTreeMap<String, f64>,
}

impl PredictionResult {
    pub fn score(&self, metric: &str) -> Option<f64> {
        self.scores.get(metric).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub each_results: Vec<PredictionResult>,
    pub use_metrics: Vec<String>,
    pub average: BTreeMap<String, f64>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationSummary {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub min_chunk_chars: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_200,
            chunk_overlap_chars: 120,
            min_chunk_chars: 40,
            allowed_extensions: vec![".txt".to_string(), ".md".to_string(), ".pdf".to_string()],
        }
    }
}
