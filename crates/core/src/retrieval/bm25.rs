//! Okapi BM25 over an in-memory inverted index persisted as JSON.
//!
//! Scores use `idf = ln(1 + (N - df + 0.5) / (df + 0.5))`, which stays
//! positive for terms present in most documents. Ties keep ingestion order.

use crate::error::{ServiceError, StoreError};
use crate::file_check::{check_file_type, file_exists};
use crate::text::index_terms;
use crate::traits::Retrieval;
use crate::Passage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25Parameters {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Parameters {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bm25Index {
    #[serde(default)]
    pub parameters: Bm25Parameters,
    ids: Vec<String>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    doc_freqs: HashMap<String, u32>,
    total_len: u64,
    #[serde(skip)]
    known_ids: HashSet<String>,
}

impl Bm25Index {
    pub fn new(parameters: Bm25Parameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known_ids.contains(id)
    }

    fn rebuild_known_ids(&mut self) {
        self.known_ids = self.ids.iter().cloned().collect();
    }

    /// Returns false when `id` is already indexed.
    pub fn add(&mut self, id: &str, text: &str) -> bool {
        if self.contains(id) {
            return false;
        }

        let terms = index_terms(text);
        let mut freqs = HashMap::<String, u32>::new();
        for term in &terms {
            *freqs.entry(term.clone()).or_insert(0) += 1;
        }
        for term in freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.known_ids.insert(id.to_string());
        self.ids.push(id.to_string());
        self.doc_lens.push(terms.len() as u32);
        self.total_len += terms.len() as u64;
        self.term_freqs.push(freqs);
        true
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.ids.len() as f64;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    pub fn score(&self, query: &str) -> Vec<f64> {
        let mut query_terms = index_terms(query);
        query_terms.sort_unstable();
        query_terms.dedup();

        let avg_len = if self.ids.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.ids.len() as f64
        };
        let Bm25Parameters { k1, b } = self.parameters;

        let idfs: Vec<(String, f64)> = query_terms
            .into_iter()
            .filter(|term| self.doc_freqs.contains_key(term))
            .map(|term| {
                let idf = self.idf(&term);
                (term, idf)
            })
            .collect();

        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &doc_len)| {
                let length_norm = if avg_len > 0.0 {
                    1.0 - b + b * doc_len as f64 / avg_len
                } else {
                    1.0
                };
                idfs.iter()
                    .map(|(term, idf)| {
                        let tf = freqs.get(term).copied().unwrap_or(0) as f64;
                        idf * tf * (k1 + 1.0) / (tf + k1 * length_norm)
                    })
                    .sum::<f64>()
            })
            .collect()
    }

    /// Top `top_k` ids with a positive score, best first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .score(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();

        ranked.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));

        ranked
            .into_iter()
            .take(top_k)
            .map(|(position, score)| (self.ids[position].clone(), score))
            .collect()
    }
}

pub struct Bm25Retrieval {
    save_path: PathBuf,
    index: RwLock<Bm25Index>,
}

impl Bm25Retrieval {
    /// Opens the index at `save_path`, loading it when the file already exists.
    pub fn new(save_path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        Self::with_parameters(save_path, Bm25Parameters::default())
    }

    pub fn with_parameters(
        save_path: impl Into<PathBuf>,
        parameters: Bm25Parameters,
    ) -> Result<Self, ServiceError> {
        let save_path = save_path.into();
        check_file_type(&save_path, &[".json".to_string()])?;

        let index = if file_exists(&save_path) {
            let index = load_index(&save_path)?;
            info!(path = %save_path.display(), documents = index.len(), "loaded bm25 index");
            index
        } else {
            Bm25Index::new(parameters)
        };

        Ok(Self {
            save_path,
            index: RwLock::new(index),
        })
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    async fn persist(&self, index: &Bm25Index) -> Result<(), ServiceError> {
        if let Some(parent) = self
            .save_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StoreError::from)?;
        }
        let payload = serde_json::to_vec(index)?;
        tokio::fs::write(&self.save_path, payload)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}

fn load_index(path: &Path) -> Result<Bm25Index, ServiceError> {
    let bytes = std::fs::read(path).map_err(StoreError::from)?;
    let mut index: Bm25Index = serde_json::from_slice(&bytes)
        .map_err(|error| ServiceError::CorruptIndex(format!("{}: {error}", path.display())))?;

    let consistent =
        index.ids.len() == index.term_freqs.len() && index.ids.len() == index.doc_lens.len();
    if !consistent {
        return Err(ServiceError::CorruptIndex(format!(
            "{}: column lengths disagree",
            path.display()
        )));
    }
    index.rebuild_known_ids();
    Ok(index)
}

#[async_trait]
impl Retrieval for Bm25Retrieval {
    async fn ingest(&self, passages: &[Passage]) -> Result<(), ServiceError> {
        let mut index = self.index.write().await;
        let mut staged = index.clone();
        let mut added = 0usize;
        for passage in passages {
            if staged.add(&passage.id, &passage.content) {
                added += 1;
            }
        }
        debug!(added, skipped = passages.len() - added, "bm25 ingest");

        // The in-memory index only changes once the file matches it.
        self.persist(&staged).await?;
        *index = staged;
        Ok(())
    }

    async fn retrieve_with_scores(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(String, f64)>, ServiceError> {
        let index = self.index.read().await;
        if index.is_empty() {
            return Err(ServiceError::NotReady(format!(
                "bm25 index at {} has no documents",
                self.save_path.display()
            )));
        }
        Ok(index.search(query, top_k))
    }
}
