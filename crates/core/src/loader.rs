use crate::error::StoreError;
use crate::file_check::{check_file_type, file_type};
use lopdf::Document;
use std::fs;
use std::path::Path;

pub trait DocumentLoader {
    fn load_text(&self, path: &Path) -> Result<String, StoreError>;
}

/// Reads `.txt` and `.md` as UTF-8 and `.pdf` through `lopdf`, page by page.
#[derive(Debug, Clone)]
pub struct FileLoader {
    allowed: Vec<String>,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(vec![".txt".to_string(), ".md".to_string(), ".pdf".to_string()])
    }
}

impl FileLoader {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl DocumentLoader for FileLoader {
    fn load_text(&self, path: &Path) -> Result<String, StoreError> {
        let path = check_file_type(path, &self.allowed)?;
        if file_type(path) == ".pdf" {
            return load_pdf_text(path);
        }
        Ok(fs::read_to_string(path)?)
    }
}

fn load_pdf_text(path: &Path) -> Result<String, StoreError> {
    let document = Document::load(path).map_err(|error| StoreError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for page_no in document.get_pages().into_keys() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| StoreError::PdfParse(error.to_string()))?;
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    if pages.is_empty() {
        return Err(StoreError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages.join("\n\n"))
}
