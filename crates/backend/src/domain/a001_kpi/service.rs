use chrono::Utc;
use contracts::domain::a001_kpi::aggregate::{
    Kpi, KpiDocument, KpiDraft, KpiId, KpiImportSummary, KpiPatch, KpiQuery,
    KPI_DOCUMENT_FORMAT_VERSION,
};
use contracts::domain::common::AggregateId;

use super::repository::KpiStore;
use crate::shared::error::{KpiError, KpiResult};

pub fn parse_id(id: &str) -> KpiResult<KpiId> {
    KpiId::from_string(id).map_err(|_| KpiError::InvalidId(id.to_string()))
}

/// Create a definition from a builder draft. Invalid drafts are never stored.
pub fn create(store: &dyn KpiStore, draft: KpiDraft) -> KpiResult<Kpi> {
    let kpi = Kpi::from_draft(draft, Utc::now());
    kpi.validate()?;
    store.put(kpi.clone())?;
    tracing::info!("Created KPI {} ({})", kpi.id, kpi.name);
    Ok(kpi)
}

/// Merge the present fields of `patch` into an existing definition.
pub fn update(store: &dyn KpiStore, id: &KpiId, patch: KpiPatch) -> KpiResult<Kpi> {
    let kpi = store.modify(
        id,
        Box::new(move |kpi: &mut Kpi| -> KpiResult<()> {
            kpi.apply_patch(patch);
            kpi.validate()?;
            Ok(())
        }),
    )?;
    tracing::info!("Updated KPI {} ({}), version {}", kpi.id, kpi.name, kpi.metadata.version);
    Ok(kpi)
}

/// Flip the active flag and nothing else
pub fn toggle(store: &dyn KpiStore, id: &KpiId) -> KpiResult<Kpi> {
    let kpi = store.modify(
        id,
        Box::new(|kpi: &mut Kpi| -> KpiResult<()> {
            kpi.toggle_active();
            Ok(())
        }),
    )?;
    tracing::info!("KPI {} is now {}", kpi.id, if kpi.is_active { "active" } else { "inactive" });
    Ok(kpi)
}

pub fn delete(store: &dyn KpiStore, id: &KpiId) -> KpiResult<()> {
    if !store.delete(id)? {
        return Err(KpiError::NotFound(id.to_string()));
    }
    tracing::info!("Deleted KPI {}", id);
    Ok(())
}

pub fn get(store: &dyn KpiStore, id: &KpiId) -> KpiResult<Kpi> {
    store
        .get(id)?
        .ok_or_else(|| KpiError::NotFound(id.to_string()))
}

/// Definitions matching `query`, by display order, then by name.
pub fn list(store: &dyn KpiStore, query: &KpiQuery) -> KpiResult<Vec<Kpi>> {
    let mut kpis: Vec<Kpi> = store
        .list()?
        .into_iter()
        .filter(|kpi| kpi.matches_query(query))
        .collect();
    kpis.sort_by(|a, b| {
        a.position
            .order
            .cmp(&b.position.order)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(kpis)
}

/// Backup document with every definition
pub fn export(store: &dyn KpiStore) -> KpiResult<KpiDocument> {
    Ok(KpiDocument {
        format_version: KPI_DOCUMENT_FORMAT_VERSION,
        exported_at: Utc::now(),
        kpis: list(store, &KpiQuery::default())?,
    })
}

/// Additive merge of a backup document.
///
/// Ids already present are left untouched and reported as skipped;
/// definitions that fail validation are reported as rejected.
pub fn import(store: &dyn KpiStore, document: KpiDocument) -> KpiResult<KpiImportSummary> {
    if document.format_version > KPI_DOCUMENT_FORMAT_VERSION {
        tracing::warn!(
            "Importing KPI document with format version {} (current {})",
            document.format_version,
            KPI_DOCUMENT_FORMAT_VERSION
        );
    }

    let mut summary = KpiImportSummary::default();
    for kpi in document.kpis {
        let id = kpi.to_string_id();
        if store.get(&kpi.id)?.is_some() {
            summary.skipped.push(id);
            continue;
        }
        if let Err(e) = kpi.validate() {
            tracing::warn!("Rejected imported KPI {} ({}): {}", id, kpi.name, e);
            summary.rejected.push((id, e.to_string()));
            continue;
        }
        store.put(kpi)?;
        summary.imported += 1;
    }

    tracing::info!(
        "KPI import: {} imported, {} skipped, {} rejected",
        summary.imported,
        summary.skipped.len(),
        summary.rejected.len()
    );
    Ok(summary)
}
