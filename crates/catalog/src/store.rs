use crate::backend::{CatalogBackend, JsonFileBackend};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::model::Procedure;
use crate::validate::{validate_batch, validate_procedure};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Immutable view of the catalog at one point in time.
///
/// Procedures are ordered by id so every consumer iterates them in the same order.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    procedures: Vec<Procedure>,
    revision: u64,
    loaded_at: Instant,
    loaded_at_unix_ms: u64,
}

impl CatalogSnapshot {
    pub fn new(procedures: Vec<Procedure>) -> Self {
        Self::with_revision(procedures, 0)
    }

    fn with_revision(mut procedures: Vec<Procedure>, revision: u64) -> Self {
        procedures.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            procedures,
            revision,
            loaded_at: Instant::now(),
            loaded_at_unix_ms: unix_ms_now(),
        }
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn get(&self, id: &str) -> Option<&Procedure> {
        self.procedures
            .binary_search_by(|p| p.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.procedures[idx])
    }

    pub fn ids(&self) -> Vec<&str> {
        self.procedures.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Monotonic counter bumped every time the store publishes a new snapshot.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn loaded_at_unix_ms(&self) -> u64 {
        self.loaded_at_unix_ms
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PutOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub ids: Vec<String>,
    pub tags: BTreeMap<String, usize>,
    pub backend: String,
    pub cache_warm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh_unix_ms: Option<u64>,
    pub revision: u64,
}

/// Catalog with a TTL read cache in front of a [`CatalogBackend`].
///
/// Reads clone an `Arc` to the last published [`CatalogSnapshot`] and never
/// block on each other. Refreshes and writes are serialized by a single
/// mutation lock; they build a new snapshot off to the side and publish it
/// with one pointer swap, so a reader never observes a half-built catalog.
/// While a refresh is in flight, readers keep getting the previous snapshot.
pub struct CatalogStore<B = JsonFileBackend> {
    backend: B,
    ttl: Duration,
    published: RwLock<Option<Arc<CatalogSnapshot>>>,
    mutation: Mutex<()>,
    revision: AtomicU64,
}

impl CatalogStore<JsonFileBackend> {
    /// Open a file-backed catalog at `path`.
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> Self {
        Self::new(JsonFileBackend::new(path.as_ref()), ttl)
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::open(&config.path, config.cache_ttl())
    }
}

impl<B: CatalogBackend> CatalogStore<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            published: RwLock::new(None),
            mutation: Mutex::new(()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current catalog snapshot, reloading from the backend at most once per TTL.
    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        if let Some(current) = self.current() {
            if current.is_fresh(self.ttl) {
                log::debug!("Catalog cache hit (revision {})", current.revision());
                return Ok(current);
            }
        }

        let guard = match self.mutation.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                if let Some(stale) = self.current() {
                    log::debug!(
                        "Catalog refresh in flight; serving revision {}",
                        stale.revision()
                    );
                    return Ok(stale);
                }
                self.lock_mutation()
            }
        };

        // Another caller may have refreshed while we waited for the lock.
        if let Some(current) = self.current() {
            if current.is_fresh(self.ttl) {
                return Ok(current);
            }
        }

        self.reload_locked(&guard)
    }

    /// Alias of [`Self::snapshot`], matching the catalog's `list` contract.
    pub fn list(&self) -> Result<Arc<CatalogSnapshot>> {
        self.snapshot()
    }

    pub fn get(&self, id: &str) -> Result<Procedure> {
        self.snapshot()?
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Insert or replace a procedure. Visible to the next read regardless of TTL.
    pub fn put(&self, procedure: Procedure) -> Result<PutOutcome> {
        validate_procedure(&procedure)?;
        let id = procedure.id.clone();
        let outcome = self.mutate(|records| {
            Ok(match records.iter_mut().find(|p| p.id == procedure.id) {
                Some(existing) => {
                    *existing = procedure;
                    PutOutcome::Updated
                }
                None => {
                    records.push(procedure);
                    PutOutcome::Created
                }
            })
        })?;
        log::info!("Stored procedure {id} ({outcome:?})");
        Ok(outcome)
    }

    /// Insert a procedure whose id is not yet taken.
    pub fn create(&self, procedure: Procedure) -> Result<()> {
        validate_procedure(&procedure)?;
        let id = procedure.id.clone();
        self.mutate(|records| {
            if records.iter().any(|p| p.id == procedure.id) {
                return Err(CatalogError::AlreadyExists(procedure.id.clone()));
            }
            records.push(procedure);
            Ok(())
        })?;
        log::info!("Created procedure {id}");
        Ok(())
    }

    /// Replace an existing procedure.
    pub fn update(&self, procedure: Procedure) -> Result<()> {
        validate_procedure(&procedure)?;
        let id = procedure.id.clone();
        self.mutate(|records| {
            let Some(existing) = records.iter_mut().find(|p| p.id == procedure.id) else {
                return Err(CatalogError::NotFound(procedure.id.clone()));
            };
            *existing = procedure;
            Ok(())
        })?;
        log::info!("Updated procedure {id}");
        Ok(())
    }

    /// Remove a procedure, returning what was stored.
    pub fn delete(&self, id: &str) -> Result<Procedure> {
        let removed = self.mutate(|records| {
            let Some(pos) = records.iter().position(|p| p.id == id) else {
                return Err(CatalogError::NotFound(id.to_string()));
            };
            Ok(records.remove(pos))
        })?;
        log::info!("Deleted procedure {id}");
        Ok(removed)
    }

    /// Bulk ingest. Every record is validated before anything is committed.
    pub fn import(&self, records: Vec<Procedure>, overwrite_existing: bool) -> Result<ImportReport> {
        validate_batch(&records)?;
        let report = self.mutate(|stored| {
            let mut report = ImportReport::default();
            for record in records {
                match stored.iter_mut().find(|p| p.id == record.id) {
                    Some(existing) if overwrite_existing => {
                        *existing = record;
                        report.updated += 1;
                    }
                    Some(_) => report.skipped += 1,
                    None => {
                        stored.push(record);
                        report.created += 1;
                    }
                }
            }
            Ok(report)
        })?;
        log::info!(
            "Imported procedures: created={}, updated={}, skipped={}",
            report.created,
            report.updated,
            report.skipped
        );
        Ok(report)
    }

    /// Read a JSON array of records from `path` and [`Self::import`] them.
    pub fn import_file(&self, path: &Path, overwrite_existing: bool) -> Result<ImportReport> {
        let bytes = std::fs::read(path)?;
        let records: Vec<Procedure> = serde_json::from_slice(&bytes)?;
        self.import(records, overwrite_existing)
    }

    /// All procedures, ordered by id.
    pub fn export(&self) -> Result<Vec<Procedure>> {
        Ok(self.snapshot()?.procedures().to_vec())
    }

    /// Write all procedures to `path` as a pretty-printed JSON array.
    pub fn export_file(&self, path: &Path) -> Result<usize> {
        let records = self.export()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(&records)?)?;
        log::info!("Exported {} procedures to {}", records.len(), path.display());
        Ok(records.len())
    }

    /// Procedures whose trigger keywords or description contain any of `keywords`.
    pub fn search_by_keywords(&self, keywords: &[String]) -> Result<Vec<Procedure>> {
        let needles: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if needles.is_empty() {
            return Ok(Vec::new());
        }
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .procedures()
            .iter()
            .filter(|proc| {
                let description = proc.description.to_lowercase();
                needles.iter().any(|needle| {
                    proc.trigger_keywords
                        .iter()
                        .any(|kw| kw.to_lowercase().contains(needle.as_str()))
                        || description.contains(needle.as_str())
                })
            })
            .cloned()
            .collect())
    }

    /// Procedures carrying any of `tags` (case-insensitive).
    pub fn search_by_tags(&self, tags: &[String]) -> Result<Vec<Procedure>> {
        let wanted: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .procedures()
            .iter()
            .filter(|proc| {
                proc.tags
                    .iter()
                    .any(|tag| wanted.contains(&tag.to_lowercase()))
            })
            .cloned()
            .collect())
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let snapshot = self.snapshot()?;
        let mut tags = BTreeMap::new();
        for proc in snapshot.procedures() {
            for tag in &proc.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        Ok(CatalogStats {
            total: snapshot.len(),
            ids: snapshot.ids().into_iter().map(str::to_string).collect(),
            tags,
            backend: self.backend.describe(),
            cache_warm: self.current().is_some(),
            last_refresh_unix_ms: self.current().map(|s| s.loaded_at_unix_ms()),
            revision: snapshot.revision(),
        })
    }

    /// Drop the published snapshot; the next read reloads from the backend.
    pub fn clear_cache(&self) {
        let _guard = self.lock_mutation();
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        log::debug!("Catalog cache cleared");
    }

    /// Reload from the backend now, ignoring the TTL.
    pub fn refresh(&self) -> Result<Arc<CatalogSnapshot>> {
        let guard = self.lock_mutation();
        self.reload_locked(&guard)
    }

    fn current(&self) -> Option<Arc<CatalogSnapshot>> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reload_locked(&self, _guard: &MutexGuard<'_, ()>) -> Result<Arc<CatalogSnapshot>> {
        match self.backend.load() {
            Ok(records) => {
                let snapshot = self.publish(records);
                log::info!(
                    "Catalog refreshed from {} ({} procedures, revision {})",
                    self.backend.describe(),
                    snapshot.len(),
                    snapshot.revision()
                );
                Ok(snapshot)
            }
            Err(err) => match self.current() {
                Some(stale) => {
                    log::warn!(
                        "Catalog refresh from {} failed, keeping revision {}: {err}",
                        self.backend.describe(),
                        stale.revision()
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Apply `op` to the authoritative record set and publish the result.
    ///
    /// Nothing is published unless both `op` and the backend write succeed.
    fn mutate<R>(&self, op: impl FnOnce(&mut Vec<Procedure>) -> Result<R>) -> Result<R> {
        let _guard = self.lock_mutation();
        let mut records = self.backend.load()?;
        let out = op(&mut records)?;
        self.backend.persist(&records)?;
        self.publish(records);
        Ok(out)
    }

    fn publish(&self, records: Vec<Procedure>) -> Arc<CatalogSnapshot> {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(CatalogSnapshot::with_revision(records, revision));
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        snapshot
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
