use crate::datastore::Datastore;
use crate::dataset::MsMarcoDataset;
use crate::error::EvalError;
use crate::metrics::{parse_metrics, Metric, MetricInput};
use crate::pipeline::BasicRunPipeline;
use crate::traits::Retrieval;
use crate::{EvaluationSummary, PredictionResult, QueryExample, RunOutput};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub fn score_example(metrics: &[Metric], example: &QueryExample, output: RunOutput) -> PredictionResult {
    let input = MetricInput {
        retrieved_ids: &output.retrieved_ids,
        relevant_ids: &example.relevant_ids,
        answer: &output.answer,
        reference_answers: &example.answers,
    };
    let scores = metrics
        .iter()
        .map(|metric| (metric.name().to_string(), metric.score(&input)))
        .collect();

    PredictionResult {
        question: example.query.clone(),
        answer: output.answer,
        retrieved_ids: output.retrieved_ids,
        ground_truth_answers: example.answers.clone(),
        ground_truth_ids: example.relevant_ids.clone(),
        scores,
    }
}

pub fn summarize(metrics: &[Metric], each_results: Vec<PredictionResult>) -> EvaluationSummary {
    let mut average = BTreeMap::new();
    if !each_results.is_empty() {
        for metric in metrics {
            let total: f64 = each_results
                .iter()
                .filter_map(|row| row.score(metric.name()))
                .sum();
            average.insert(metric.name().to_string(), total / each_results.len() as f64);
        }
    }

    EvaluationSummary {
        each_results,
        use_metrics: metrics.iter().map(|metric| metric.name().to_string()).collect(),
        average,
        evaluated_at: Utc::now(),
    }
}

/// Benchmarks a [`BasicRunPipeline`] on MS MARCO rows.
pub struct MsMarcoEvaluator {
    pipeline: BasicRunPipeline,
    dataset: MsMarcoDataset,
    metrics: Vec<Metric>,
}

impl MsMarcoEvaluator {
    pub fn new<S: AsRef<str>>(
        pipeline: BasicRunPipeline,
        dataset: MsMarcoDataset,
        metric_names: &[S],
    ) -> Result<Self, EvalError> {
        Ok(Self {
            pipeline,
            dataset,
            metrics: parse_metrics(metric_names)?,
        })
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn dataset(&self) -> &MsMarcoDataset {
        &self.dataset
    }

    /// Saves the passages of the first `ingest_size` rows into `datastore` and
    /// indexes them with every retrieval. Returns the number of passages.
    pub async fn ingest(
        &self,
        retrievals: &[&dyn Retrieval],
        datastore: &dyn Datastore,
        ingest_size: usize,
    ) -> Result<usize, EvalError> {
        if ingest_size == 0 {
            return Err(EvalError::Configuration(
                "ingest_size must be positive".to_string(),
            ));
        }
        if ingest_size > self.dataset.len() {
            warn!(
                requested = ingest_size,
                available = self.dataset.len(),
                "ingest_size exceeds dataset, ingesting every row"
            );
        }

        let passages = self.dataset.corpus(ingest_size);
        datastore.save(&passages)?;
        for retrieval in retrievals {
            retrieval.ingest(&passages).await?;
        }

        info!(
            rows = ingest_size.min(self.dataset.len()),
            passages = passages.len(),
            retrievals = retrievals.len(),
            "ingested benchmark corpus"
        );
        Ok(passages.len())
    }

    /// Runs the pipeline over the first `evaluate_size` examples in order.
    /// The first failing example aborts the run.
    pub async fn evaluate(&self, evaluate_size: usize) -> Result<EvaluationSummary, EvalError> {
        if evaluate_size > self.dataset.len() {
            return Err(EvalError::Configuration(format!(
                "evaluate_size {evaluate_size} exceeds dataset size {}",
                self.dataset.len()
            )));
        }

        let mut each_results = Vec::with_capacity(evaluate_size);
        for (position, example) in self.dataset.examples(evaluate_size).iter().enumerate() {
            let output = self.pipeline.run(&example.query).await?;
            let row = score_example(&self.metrics, example, output);
            info!(position, question = %row.question, scores = ?row.scores, "evaluated example");
            each_results.push(row);
        }

        Ok(summarize(&self.metrics, each_results))
    }
}
