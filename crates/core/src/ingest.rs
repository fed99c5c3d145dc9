use crate::chunking::build_passages;
use crate::error::StoreError;
use crate::file_check::check_file_type;
use crate::loader::{DocumentLoader, FileLoader};
use crate::models::{IngestionOptions, Passage};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path, allowed: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| check_file_type(entry.path(), allowed).is_ok())
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub passages: Vec<Passage>,
    pub skipped_files: Vec<SkippedDocument>,
}

/// Loads and chunks every supported file under `folder`. Files that fail to
/// load are reported instead of aborting the walk.
pub fn ingest_folder_passages(
    folder: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, StoreError> {
    let files = discover_documents(folder, &options.allowed_extensions);

    if files.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "no documents with extensions {:?} found in {}",
            options.allowed_extensions,
            folder.display()
        )));
    }

    let loader = FileLoader::new(options.allowed_extensions.clone());
    let ingested_at = Utc::now().to_rfc3339();
    let mut passages = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let source = path.to_string_lossy().to_string();
        let built = loader
            .load_text(&path)
            .and_then(|text| build_passages(&source, &text, options));

        match built {
            Ok(file_passages) => {
                debug!(path = %source, count = file_passages.len(), "chunked document");
                passages.extend(
                    file_passages
                        .into_iter()
                        .map(|passage| passage.with_metadata("ingested_at", ingested_at.clone())),
                );
            }
            Err(error) => skipped_files.push(SkippedDocument {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(IngestionReport {
        passages,
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn options() -> IngestionOptions {
        IngestionOptions {
            min_chunk_chars: 1,
            ..IngestionOptions::default()
        }
    }

    #[test]
    fn discovery_is_recursive_and_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("a.txt"), "alpha")?;
        fs::write(nested.join("b.md"), "beta")?;
        fs::write(nested.join("c.csv"), "gamma")?;

        let files = discover_documents(dir.path(), &options().allowed_extensions);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_documents() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(ingest_folder_passages(dir.path(), &options()).is_err());
        Ok(())
    }

    #[test]
    fn unreadable_documents_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("good.txt"), "Squirrels avoid human hair.")?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let report = ingest_folder_passages(dir.path(), &options())?;

        assert_eq!(report.passages.len(), 1);
        assert!(report.passages[0].metadata.contains_key("ingested_at"));
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("broken.pdf")
        );
        Ok(())
    }
}
