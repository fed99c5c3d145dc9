use crate::error::StoreError;
use crate::models::{IngestionOptions, Passage};
use crate::text::normalize_whitespace;
use regex::Regex;
use sha2::{Digest, Sha256};

const HEADING_PATTERN: &str = r"^(#{1,6}\s+\S.*|\d+(?:\.\d+)*\s+[A-Z].{0,80})$";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_chars == 0 {
            return Err(StoreError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(StoreError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

/// Packs blank-line separated paragraphs into chunks of at most `max_chars`
/// characters. Oversized paragraphs are windowed with `overlap_chars` overlap.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, StoreError> {
    config.validate()?;

    let paragraphs = text
        .split("\n\n")
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty());

    let mut packed = Vec::new();
    let mut current = String::new();
    for paragraph in paragraphs {
        let joined_len = current.chars().count() + paragraph.chars().count() + 1;
        if !current.is_empty() && joined_len > config.max_chars {
            packed.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&paragraph);
    }
    if !current.is_empty() {
        packed.push(current);
    }

    let mut chunks = Vec::new();
    for piece in packed {
        let chars: Vec<char> = piece.chars().collect();
        if chars.len() <= config.max_chars {
            chunks.push(piece);
            continue;
        }

        let step = config.max_chars - config.overlap_chars;
        let mut start = 0;
        loop {
            let end = (start + config.max_chars).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    let mut kept: Vec<String> = chunks
        .iter()
        .filter(|chunk| chunk.chars().count() >= config.min_chars)
        .cloned()
        .collect();
    if kept.is_empty() {
        kept = chunks.into_iter().take(1).collect();
    }
    Ok(kept)
}

/// Builds passages for one source file. Ids hash the path, position, and content.
pub fn build_passages(
    source_path: &str,
    text: &str,
    options: &IngestionOptions,
) -> Result<Vec<Passage>, StoreError> {
    let heading_re = Regex::new(HEADING_PATTERN)?;
    let first_heading = text
        .lines()
        .map(str::trim)
        .find(|line| heading_re.is_match(line))
        .map(|line| line.trim_start_matches('#').trim().to_string());

    let chunks = chunk_text(text, ChunkingConfig::from(options))?;
    let passages = chunks
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let mut passage = Passage::new(make_passage_id(source_path, index, &content), content)
                .with_metadata("chunk_index", index.to_string());
            passage.filepath = Some(source_path.to_string());
            if let Some(heading) = &first_heading {
                passage = passage.with_metadata("section", heading.clone());
            }
            passage
        })
        .collect();
    Ok(passages)
}

pub fn make_passage_id(source: &str, index: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize, min_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
            min_chars,
        }
    }

    #[test]
    fn short_paragraphs_are_packed_together() {
        let chunks = chunk_text("alpha beta\n\ngamma", config(100, 10, 1)).unwrap();
        assert_eq!(chunks, vec!["alpha beta gamma".to_string()]);
    }

    #[test]
    fn long_paragraphs_are_windowed_with_overlap() {
        let text = "abcdefghij".repeat(3);
        let chunks = chunk_text(&text, config(12, 2, 1)).unwrap();
        assert_eq!(chunks[0], "abcdefghijab");
        assert_eq!(chunks[1], "abcdefghijab");
        assert_eq!(chunks[2], "abcdefghij");
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(matches!(
            chunk_text("text", config(10, 10, 1)),
            Err(StoreError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn tiny_documents_still_produce_one_chunk() {
        let chunks = chunk_text("hi", config(100, 10, 50)).unwrap();
        assert_eq!(chunks, vec!["hi".to_string()]);
    }

    #[test]
    fn passages_carry_source_and_heading() {
        let options = IngestionOptions {
            min_chunk_chars: 1,
            ..IngestionOptions::default()
        };
        let passages =
            build_passages("/docs/squirrels.md", "# Garden pests\n\nSquirrels dislike hair.", &options)
                .unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].filepath.as_deref(), Some("/docs/squirrels.md"));
        assert_eq!(passages[0].metadata.get("section").map(String::as_str), Some("Garden pests"));
        assert_eq!(passages[0].id.len(), 64);
    }
}
