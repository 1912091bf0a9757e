use crate::error::{CatalogError, Result};
use crate::model::Procedure;
use crate::validate::validate_batch;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Physical storage behind a [`crate::CatalogStore`].
///
/// Implementations only move whole record sets; caching, locking and
/// validation of individual mutations live in the store.
pub trait CatalogBackend: Send + Sync {
    /// Read every persisted record.
    fn load(&self) -> Result<Vec<Procedure>>;

    /// Replace the persisted record set. Must be all-or-nothing.
    fn persist(&self, procedures: &[Procedure]) -> Result<()>;

    /// Human-readable location used in stats and logs.
    fn describe(&self) -> String;
}

/// JSON array of procedure records in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<Procedure>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Catalog file {} missing; treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let procedures: Vec<Procedure> = serde_json::from_slice(&bytes)?;
        validate_batch(&procedures)?;
        Ok(procedures)
    }

    fn persist(&self, procedures: &[Procedure]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(procedures)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        if let Err(err) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Records held in process memory. Counts loads so callers can observe cache behaviour.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<Procedure>>,
    loads: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Procedure>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Number of times [`CatalogBackend::load`] has been called.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Make subsequent `persist` calls fail, simulating an unavailable store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Mutate the stored records directly, bypassing any store cache.
    pub fn replace_records(&self, records: Vec<Procedure>) {
        *self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = records;
    }
}

impl CatalogBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<Procedure>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn persist(&self, procedures: &[Procedure]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Backend("memory backend is read-only".to_string()));
        }
        *self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = procedures.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_catalog() {
        let dir = tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/catalog.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn persist_creates_parent_and_round_trips() {
        let dir = tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/catalog.json"));
        let proc = Procedure::new("a", "A", vec!["alpha".to_string()]).with_step("s", &[]);
        backend.persist(std::slice::from_ref(&proc)).unwrap();
        assert_eq!(backend.load().unwrap(), vec![proc]);
        assert!(!dir.path().join("nested/catalog.json.tmp").exists());
    }

    #[test]
    fn invalid_file_contents_surface_as_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileBackend::new(&path).load(),
            Err(CatalogError::Serialization(_))
        ));

        std::fs::write(&path, r#"[{"id": "x", "name": "X", "trigger_keywords": []}]"#).unwrap();
        assert!(matches!(
            JsonFileBackend::new(&path).load(),
            Err(CatalogError::Validation { .. })
        ));
    }

    #[test]
    fn memory_backend_counts_loads_and_can_fail_writes() {
        let backend = MemoryBackend::new();
        backend.load().unwrap();
        backend.load().unwrap();
        assert_eq!(backend.loads(), 2);

        backend.set_fail_writes(true);
        assert!(backend.persist(&[]).is_err());
    }
}
