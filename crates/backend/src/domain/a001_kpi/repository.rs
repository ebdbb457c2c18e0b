use chrono::Utc;
use contracts::domain::a001_kpi::aggregate::{
    Kpi, KpiDocument, KpiId, KPI_DOCUMENT_FORMAT_VERSION,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::shared::error::{KpiError, KpiResult, StoreError};

/// In-place edit of one definition. An `Err` discards the edit.
pub type KpiChange<'a> = Box<dyn FnOnce(&mut Kpi) -> KpiResult<()> + 'a>;

/// Persistence of KPI definitions.
///
/// Every call is synchronous and atomic: after `put`, `modify` or `delete`
/// returns `Ok`, the change is durable; after it returns `Err`, nothing changed.
pub trait KpiStore: Send + Sync {
    fn list(&self) -> Result<Vec<Kpi>, StoreError>;
    fn get(&self, id: &KpiId) -> Result<Option<Kpi>, StoreError>;
    fn put(&self, kpi: Kpi) -> Result<(), StoreError>;
    /// Read, edit and write back one definition under the store's write lock,
    /// so concurrent edits of the same KPI apply one after the other.
    fn modify(&self, id: &KpiId, change: KpiChange<'_>) -> KpiResult<Kpi>;
    /// Returns whether the definition existed
    fn delete(&self, id: &KpiId) -> Result<bool, StoreError>;
}

// ─── In-memory ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryKpiStore {
    kpis: RwLock<HashMap<KpiId, Kpi>>,
}

impl MemoryKpiStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KpiStore for MemoryKpiStore {
    fn list(&self) -> Result<Vec<Kpi>, StoreError> {
        let kpis = self.kpis.read().map_err(|_| StoreError::Poisoned)?;
        Ok(kpis.values().cloned().collect())
    }

    fn get(&self, id: &KpiId) -> Result<Option<Kpi>, StoreError> {
        let kpis = self.kpis.read().map_err(|_| StoreError::Poisoned)?;
        Ok(kpis.get(id).cloned())
    }

    fn put(&self, kpi: Kpi) -> Result<(), StoreError> {
        let mut kpis = self.kpis.write().map_err(|_| StoreError::Poisoned)?;
        kpis.insert(kpi.id, kpi);
        Ok(())
    }

    fn modify(&self, id: &KpiId, change: KpiChange<'_>) -> KpiResult<Kpi> {
        let mut kpis = self.kpis.write().map_err(|_| StoreError::Poisoned)?;
        let mut kpi = kpis
            .get(id)
            .cloned()
            .ok_or_else(|| KpiError::NotFound(id.to_string()))?;
        change(&mut kpi)?;
        kpis.insert(kpi.id, kpi.clone());
        Ok(kpi)
    }

    fn delete(&self, id: &KpiId) -> Result<bool, StoreError> {
        let mut kpis = self.kpis.write().map_err(|_| StoreError::Poisoned)?;
        Ok(kpis.remove(id).is_some())
    }
}

// ─── JSON file ──────────────────────────────────────────────────────────────

/// Store backed by a single JSON document (`KpiDocument`).
///
/// The file is read once by [`JsonFileKpiStore::load`] and rewritten in full
/// after every mutation. The in-memory copy only changes once the write has
/// succeeded.
#[derive(Debug)]
pub struct JsonFileKpiStore {
    path: PathBuf,
    kpis: RwLock<HashMap<KpiId, Kpi>>,
}

impl JsonFileKpiStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let kpis = match fs::read(&path) {
            Ok(bytes) => {
                let document: KpiDocument = serde_json::from_slice(&bytes)?;
                if document.format_version > KPI_DOCUMENT_FORMAT_VERSION {
                    tracing::warn!(
                        "KPI store {} has format version {}, newer than {}",
                        path.display(),
                        document.format_version,
                        KPI_DOCUMENT_FORMAT_VERSION
                    );
                }
                document.kpis.into_iter().map(|k| (k.id, k)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("KPI store {} not found, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Loaded {} KPI definitions from {}", kpis.len(), path.display());
        Ok(Self {
            path,
            kpis: RwLock::new(kpis),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole set via a temp file and rename.
    fn save(&self, kpis: &HashMap<KpiId, Kpi>) -> Result<(), StoreError> {
        let mut sorted: Vec<Kpi> = kpis.values().cloned().collect();
        sorted.sort_by(|a, b| {
            a.position
                .order
                .cmp(&b.position.order)
                .then_with(|| a.id.cmp(&b.id))
        });
        let document = KpiDocument {
            format_version: KPI_DOCUMENT_FORMAT_VERSION,
            exported_at: Utc::now(),
            kpis: sorted,
        };
        let json = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<T, E: From<StoreError>>(
        &self,
        change: impl FnOnce(&mut HashMap<KpiId, Kpi>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut kpis = self.kpis.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = kpis.clone();
        let outcome = change(&mut next)?;
        self.save(&next)?;
        *kpis = next;
        Ok(outcome)
    }
}

impl KpiStore for JsonFileKpiStore {
    fn list(&self) -> Result<Vec<Kpi>, StoreError> {
        let kpis = self.kpis.read().map_err(|_| StoreError::Poisoned)?;
        Ok(kpis.values().cloned().collect())
    }

    fn get(&self, id: &KpiId) -> Result<Option<Kpi>, StoreError> {
        let kpis = self.kpis.read().map_err(|_| StoreError::Poisoned)?;
        Ok(kpis.get(id).cloned())
    }

    fn put(&self, kpi: Kpi) -> Result<(), StoreError> {
        self.mutate(|kpis| {
            kpis.insert(kpi.id, kpi);
            Ok(())
        })
    }

    fn modify(&self, id: &KpiId, change: KpiChange<'_>) -> KpiResult<Kpi> {
        self.mutate(|kpis| {
            let kpi = kpis
                .get_mut(id)
                .ok_or_else(|| KpiError::NotFound(id.to_string()))?;
            change(kpi)?;
            Ok(kpi.clone())
        })
    }

    fn delete(&self, id: &KpiId) -> Result<bool, StoreError> {
        if self.get(id)?.is_none() {
            return Ok(false);
        }
        self.mutate(|kpis| Ok(kpis.remove(id).is_some()))
    }
}
