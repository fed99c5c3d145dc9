use crate::error::StoreError;
use crate::file_check::{check_file_type, file_exists};
use crate::models::Passage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

pub trait Datastore: Send + Sync {
    /// Returns passages in the order of `ids`. Unknown ids are an error.
    fn load(&self, ids: &[String]) -> Result<Vec<Passage>, StoreError>;

    fn save(&self, passages: &[Passage]) -> Result<(), StoreError>;

    fn exists(&self) -> bool;
}

#[derive(Debug, Default)]
struct Snapshot {
    passages: Vec<Passage>,
    positions: HashMap<String, usize>,
}

impl Snapshot {
    fn new(passages: Vec<Passage>) -> Self {
        let positions = passages
            .iter()
            .enumerate()
            .map(|(position, passage)| (passage.id.clone(), position))
            .collect();
        Self {
            passages,
            positions,
        }
    }
}

#[derive(Debug)]
struct Cached {
    stamp: Option<FileStamp>,
    snapshot: Arc<Snapshot>,
}

/// Size and mtime of the backing file, used to notice writes from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

fn stamp(path: &Path) -> Option<FileStamp> {
    let metadata = fs::metadata(path).ok()?;
    Some(FileStamp {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// A datastore persisted as one JSON array of passages.
///
/// The parsed file is cached and only re-read when its size or mtime changes.
#[derive(Debug)]
pub struct JsonFileDatastore {
    path: PathBuf,
    cache: RwLock<Option<Cached>>,
}

impl JsonFileDatastore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        check_file_type(&path, &[".json".to_string()])?;
        Ok(Self {
            path,
            cache: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>, StoreError> {
        let current = stamp(&self.path);
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref().filter(|cached| cached.stamp == current) {
                return Ok(Arc::clone(&cached.snapshot));
            }
        }

        let snapshot = if current.is_some() {
            let bytes = fs::read(&self.path)?;
            Arc::new(Snapshot::new(serde_json::from_slice(&bytes)?))
        } else {
            Arc::new(Snapshot::default())
        };
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
            stamp: current,
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    pub fn load_all(&self) -> Result<Vec<Passage>, StoreError> {
        Ok(self.snapshot()?.passages.clone())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.snapshot()?.passages.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl Datastore for JsonFileDatastore {
    fn load(&self, ids: &[String]) -> Result<Vec<Passage>, StoreError> {
        let snapshot = self.snapshot()?;
        ids.iter()
            .map(|id| {
                snapshot
                    .positions
                    .get(id)
                    .map(|&position| snapshot.passages[position].clone())
                    .ok_or_else(|| StoreError::MissingPassage(id.clone()))
            })
            .collect()
    }

    fn save(&self, passages: &[Passage]) -> Result<(), StoreError> {
        let current = self.snapshot()?;
        let mut stored = current.passages.clone();
        let mut positions = current.positions.clone();

        for passage in passages {
            if positions.contains_key(&passage.id) {
                return Err(StoreError::DuplicatePassage(passage.id.clone()));
            }
            positions.insert(passage.id.clone(), stored.len());
            stored.push(passage.clone());
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(&stored)?)?;

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
            stamp: stamp(&self.path),
            snapshot: Arc::new(Snapshot {
                passages: stored,
                positions,
            }),
        });
        Ok(())
    }

    fn exists(&self) -> bool {
        file_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn saved_passages_load_in_requested_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonFileDatastore::new(dir.path().join("nested/passages.json"))?;
        assert!(!store.exists());

        store.save(&[Passage::new("p1", "first"), Passage::new("p2", "second")])?;
        assert!(store.exists());

        let loaded = store.load(&["p2".to_string(), "p1".to_string()])?;
        assert_eq!(loaded[0].content, "second");
        assert_eq!(loaded[1].content, "first");
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonFileDatastore::new(dir.path().join("passages.json"))?;
        store.save(&[Passage::new("p1", "first")])?;

        let result = store.save(&[Passage::new("p1", "again")]);
        assert!(matches!(result, Err(StoreError::DuplicatePassage(id)) if id == "p1"));
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[test]
    fn missing_ids_are_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonFileDatastore::new(dir.path().join("passages.json"))?;
        store.save(&[Passage::new("p1", "first")])?;

        let result = store.load(&["p9".to_string()]);
        assert!(matches!(result, Err(StoreError::MissingPassage(id)) if id == "p9"));
        Ok(())
    }

    #[test]
    fn writes_from_another_handle_are_picked_up() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("passages.json");
        let reader = JsonFileDatastore::new(&path)?;
        assert!(reader.is_empty()?);

        JsonFileDatastore::new(&path)?.save(&[Passage::new("p1", "first")])?;
        let loaded = reader.load(&["p1".to_string()])?;
        assert_eq!(loaded[0].content, "first");
        Ok(())
    }

    #[test]
    fn repeated_loads_reuse_the_parsed_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonFileDatastore::new(dir.path().join("passages.json"))?;
        let passages: Vec<Passage> = (0..2_000)
            .map(|position| Passage::new(format!("p{position}"), format!("text {position}")))
            .collect();
        store.save(&passages)?;

        let first = store.snapshot()?;
        let second = store.snapshot()?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.load(&["p1999".to_string()])?[0].content, "text 1999");
        Ok(())
    }

    #[test]
    fn non_json_paths_are_rejected() {
        assert!(matches!(
            JsonFileDatastore::new("/tmp/passages.pkl"),
            Err(StoreError::UnsupportedFileType { .. })
        ));
    }
}
