use crate::error::StoreError;
use std::path::Path;

/// Lowercased extension including the leading dot, or an empty string.
pub fn file_type(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

pub fn check_file_type<'a>(path: &'a Path, allowed: &[String]) -> Result<&'a Path, StoreError> {
    let found = file_type(path);
    let accepted = allowed.iter().any(|candidate| {
        let candidate = candidate.trim_start_matches('.');
        found.trim_start_matches('.').eq_ignore_ascii_case(candidate) && !found.is_empty()
    });

    if accepted {
        Ok(path)
    } else {
        Err(StoreError::UnsupportedFileType {
            path: path.display().to_string(),
            found,
            expected: allowed.to_vec(),
        })
    }
}

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}
