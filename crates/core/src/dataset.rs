use crate::chunking::make_passage_id;
use crate::error::StoreError;
use crate::models::{Passage, QueryExample};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct RawPassages {
    #[serde(default)]
    is_selected: Vec<u8>,
    #[serde(default)]
    passage_text: Vec<String>,
    #[serde(default)]
    url: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRow {
    query_id: Value,
    query: String,
    #[serde(default)]
    answers: Vec<String>,
    passages: RawPassages,
}

#[derive(Debug, Clone)]
pub struct MsMarcoRow {
    pub example: QueryExample,
    pub passages: Vec<Passage>,
}

/// MS MARCO QA rows in the Hugging Face JSON Lines layout, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct MsMarcoDataset {
    rows: Vec<MsMarcoRow>,
}

impl MsMarcoDataset {
    pub fn from_jsonl(path: &Path) -> Result<Self, StoreError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, StoreError> {
        let mut rows = Vec::new();
        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawRow = serde_json::from_str(&line).map_err(|error| {
                StoreError::InvalidArgument(format!("line {}: {error}", index + 1))
            })?;
            rows.push(convert_row(raw, index + 1)?);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[MsMarcoRow] {
        &self.rows
    }

    /// The first `size` examples in file order.
    pub fn examples(&self, size: usize) -> Vec<QueryExample> {
        self.rows
            .iter()
            .take(size)
            .map(|row| row.example.clone())
            .collect()
    }

    /// Every candidate passage of the first `size` rows.
    pub fn corpus(&self, size: usize) -> Vec<Passage> {
        self.rows
            .iter()
            .take(size)
            .flat_map(|row| row.passages.iter().cloned())
            .collect()
    }
}

fn convert_row(raw: RawRow, line: usize) -> Result<MsMarcoRow, StoreError> {
    let RawPassages {
        is_selected,
        passage_text,
        url,
    } = raw.passages;

    if is_selected.len() != passage_text.len() {
        return Err(StoreError::InvalidArgument(format!(
            "line {line}: {} selection flags for {} passages",
            is_selected.len(),
            passage_text.len()
        )));
    }

    let query_id = match raw.query_id {
        Value::String(value) => value,
        other => other.to_string(),
    };

    let mut relevant_ids = Vec::new();
    let passages = passage_text
        .into_iter()
        .enumerate()
        .map(|(position, text)| {
            let id = make_passage_id(&query_id, position, &text);
            if is_selected[position] != 0 {
                relevant_ids.push(id.clone());
            }
            let mut passage = Passage::new(id, text).with_metadata("query_id", query_id.clone());
            if let Some(source_url) = url.get(position) {
                passage = passage.with_metadata("url", source_url.clone());
            }
            passage
        })
        .collect();

    Ok(MsMarcoRow {
        example: QueryExample {
            query_id,
            query: raw.query,
            answers: raw.answers,
            relevant_ids,
        },
        passages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"query_id": 9652, "query": "does human hair stop squirrels", "answers": ["Yes"], "passages": {"is_selected": [0, 1], "passage_text": ["Squirrels eat nuts.", "Human hair deters squirrels."], "url": ["http://a", "http://b"]}}

{"query_id": "17", "query": "what is bm25", "answers": [], "passages": {"is_selected": [0], "passage_text": ["BM25 ranks documents."], "url": []}}
"#;

    #[test]
    fn rows_keep_file_order_and_selected_ids() -> Result<(), StoreError> {
        let dataset = MsMarcoDataset::from_reader(SAMPLE.as_bytes())?;
        assert_eq!(dataset.len(), 2);

        let examples = dataset.examples(5);
        assert_eq!(examples[0].query, "does human hair stop squirrels");
        assert_eq!(examples[0].query_id, "9652");
        assert_eq!(examples[1].query_id, "17");
        assert_eq!(examples[0].relevant_ids, vec![dataset.rows()[0].passages[1].id.clone()]);
        assert!(examples[1].relevant_ids.is_empty());
        Ok(())
    }

    #[test]
    fn corpus_is_limited_by_row_count() -> Result<(), StoreError> {
        let dataset = MsMarcoDataset::from_reader(SAMPLE.as_bytes())?;
        assert_eq!(dataset.corpus(1).len(), 2);
        assert_eq!(dataset.corpus(10).len(), 3);
        assert_eq!(
            dataset.corpus(1)[1].metadata.get("url").map(String::as_str),
            Some("http://b")
        );
        Ok(())
    }

    #[test]
    fn mismatched_selection_flags_are_rejected() {
        let line = r#"{"query_id": 1, "query": "q", "passages": {"is_selected": [1, 0], "passage_text": ["only one"]}}"#;
        assert!(matches!(
            MsMarcoDataset::from_reader(line.as_bytes()),
            Err(StoreError::InvalidArgument(message)) if message.starts_with("line 1")
        ));
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let input = format!("{}\n{{not json", SAMPLE.lines().next().unwrap_or_default());
        assert!(matches!(
            MsMarcoDataset::from_reader(input.as_bytes()),
            Err(StoreError::InvalidArgument(message)) if message.starts_with("line 2")
        ));
    }
}
