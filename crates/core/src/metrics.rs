//! Retrieval and answer-quality metrics.
//!
//! Retrieval metrics compare id sets; answer metrics compare SQuAD-normalized
//! strings and take the best score over all reference answers. Any metric
//! with an empty denominator scores 0.

use crate::error::EvalError;
use crate::text::{answer_tokens, normalize_answer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Recall,
    Precision,
    Hole,
    TopKAccuracy,
    ExactMatch,
    F1Score,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Recall,
        Metric::Precision,
        Metric::Hole,
        Metric::TopKAccuracy,
        Metric::ExactMatch,
        Metric::F1Score,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Recall => "Recall",
            Metric::Precision => "Precision",
            Metric::Hole => "Hole",
            Metric::TopKAccuracy => "TopK_Accuracy",
            Metric::ExactMatch => "EM",
            Metric::F1Score => "F1_score",
        }
    }

    pub fn score(self, sample: &MetricInput<'_>) -> f64 {
        match self {
            Metric::Recall => recall(sample.retrieved_ids, sample.relevant_ids),
            Metric::Precision => precision(sample.retrieved_ids, sample.relevant_ids),
            Metric::Hole => hole(sample.retrieved_ids, sample.relevant_ids),
            Metric::TopKAccuracy => topk_accuracy(sample.retrieved_ids, sample.relevant_ids),
            Metric::ExactMatch => exact_match(sample.answer, sample.reference_answers),
            Metric::F1Score => f1_score(sample.answer, sample.reference_answers),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == value)
            .ok_or_else(|| {
                EvalError::Configuration(format!(
                    "unknown metric {value:?}; expected one of {}",
                    Metric::ALL.map(Metric::name).join(", ")
                ))
            })
    }
}

/// Parses metric names, dropping repeats but keeping first-seen order.
pub fn parse_metrics<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>, EvalError> {
    let mut metrics = Vec::new();
    for name in names {
        let metric: Metric = name.as_ref().parse()?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    if metrics.is_empty() {
        return Err(EvalError::Configuration("no metrics requested".to_string()));
    }
    Ok(metrics)
}

pub struct MetricInput<'a> {
    pub retrieved_ids: &'a [String],
    pub relevant_ids: &'a [String],
    pub answer: &'a str,
    pub reference_answers: &'a [String],
}

fn id_set(ids: &[String]) -> HashSet<&str> {
    ids.iter().map(String::as_str).collect()
}

fn hit_count(retrieved: &[String], relevant: &[String]) -> usize {
    let retrieved = id_set(retrieved);
    id_set(relevant)
        .into_iter()
        .filter(|id| retrieved.contains(id))
        .count()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn recall(retrieved: &[String], relevant: &[String]) -> f64 {
    ratio(hit_count(retrieved, relevant), id_set(relevant).len())
}

pub fn precision(retrieved: &[String], relevant: &[String]) -> f64 {
    ratio(hit_count(retrieved, relevant), id_set(retrieved).len())
}

/// Share of relevant ids that were not retrieved.
pub fn hole(retrieved: &[String], relevant: &[String]) -> f64 {
    let relevant_count = id_set(relevant).len();
    ratio(relevant_count - hit_count(retrieved, relevant), relevant_count)
}

pub fn topk_accuracy(retrieved: &[String], relevant: &[String]) -> f64 {
    if hit_count(retrieved, relevant) > 0 {
        1.0
    } else {
        0.0
    }
}

pub fn exact_match(answer: &str, references: &[String]) -> f64 {
    let normalized = normalize_answer(answer);
    if references
        .iter()
        .any(|reference| normalize_answer(reference) == normalized)
    {
        1.0
    } else {
        0.0
    }
}

fn token_f1(prediction: &[String], reference: &[String]) -> f64 {
    let mut counts = HashMap::<&str, usize>::new();
    for token in reference {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut common = 0usize;
    for token in prediction {
        if let Some(count) = counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }
    let precision = ratio(common, prediction.len());
    let recall = ratio(common, reference.len());
    2.0 * precision * recall / (precision + recall)
}

pub fn f1_score(answer: &str, references: &[String]) -> f64 {
    let prediction = answer_tokens(answer);
    references
        .iter()
        .map(|reference| token_f1(&prediction, &answer_tokens(reference)))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn names_round_trip_and_unknown_names_fail() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert!(matches!(
            "MRR".parse::<Metric>(),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_metric_names_collapse() {
        let metrics = parse_metrics(&["EM", "Recall", "EM"]).unwrap();
        assert_eq!(metrics, vec![Metric::ExactMatch, Metric::Recall]);
        assert!(parse_metrics::<&str>(&[]).is_err());
    }

    #[test]
    fn retrieval_metrics_follow_set_overlap() {
        let retrieved = ids(&["a", "b", "c", "d"]);
        let relevant = ids(&["a", "x"]);
        assert_eq!(recall(&retrieved, &relevant), 0.5);
        assert_eq!(precision(&retrieved, &relevant), 0.25);
        assert_eq!(hole(&retrieved, &relevant), 0.5);
        assert_eq!(topk_accuracy(&retrieved, &relevant), 1.0);
        assert_eq!(topk_accuracy(&retrieved, &ids(&["z"])), 0.0);
    }

    #[test]
    fn recall_and_hole_partition_ground_truth() {
        let retrieved = ids(&["a", "c"]);
        for relevant in [ids(&["a"]), ids(&["a", "b", "c"]), ids(&["q", "r"])] {
            let total = recall(&retrieved, &relevant) + hole(&retrieved, &relevant);
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_ground_truth_scores_zero() {
        let retrieved = ids(&["a"]);
        assert_eq!(recall(&retrieved, &[]), 0.0);
        assert_eq!(hole(&retrieved, &[]), 0.0);
        assert_eq!(precision(&[], &ids(&["a"])), 0.0);
    }

    #[test]
    fn exact_match_normalizes_case_punctuation_and_articles() {
        let references = ids(&["The answer is Yes."]);
        assert_eq!(exact_match("answer is yes", &references), 1.0);
        assert_eq!(exact_match("answer is no", &references), 0.0);
    }

    #[test]
    fn f1_uses_token_overlap_and_best_reference() {
        let references = ids(&["human hair", "no"]);
        assert_eq!(f1_score("human hair", &references), 1.0);
        let partial = f1_score("human hair repels squirrels", &references);
        assert!((partial - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(f1_score("", &references), 0.0);
    }

    #[test]
    fn metric_dispatch_reads_the_right_fields() {
        let retrieved = ids(&["a"]);
        let relevant = ids(&["a"]);
        let answers = ids(&["yes"]);
        let input = MetricInput {
            retrieved_ids: &retrieved,
            relevant_ids: &relevant,
            answer: "Yes!",
            reference_answers: &answers,
        };
        for metric in Metric::ALL {
            let expected = if metric == Metric::Hole { 0.0 } else { 1.0 };
            assert_eq!(metric.score(&input), expected, "{metric}");
        }
    }
}
