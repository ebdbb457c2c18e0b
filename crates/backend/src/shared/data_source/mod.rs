pub mod json_dir;
pub mod memory;

use async_trait::async_trait;
use contracts::domain::a001_kpi::aggregate::Timeframe;
use contracts::shared::indicators::{DataSourceInfo, HistoryBucket, RecordSet};
use once_cell::sync::Lazy;

use crate::shared::error::DataSourceError;

pub use json_dir::JsonDirDataSource;
pub use memory::InMemoryDataSource;

/// Source of record snapshots for the KPI engine.
///
/// Only `fetch_records` is required. An adapter that cannot provide a
/// previous-period snapshot or a per-period history returns `Ok(None)` and
/// the engine approximates.
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Current snapshot of the named source
    async fn fetch_records(&self, source: &str) -> Result<RecordSet, DataSourceError>;

    /// Snapshot of the period preceding the current one
    async fn fetch_previous_period(
        &self,
        _source: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<RecordSet>, DataSourceError> {
        Ok(None)
    }

    /// Per-period snapshots, oldest first
    async fn fetch_history(
        &self,
        _source: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<Vec<HistoryBucket>>, DataSourceError> {
        Ok(None)
    }
}

// ─── Catalogue ──────────────────────────────────────────────────────────────

fn info(id: &str, label: &str, fields: &[&str]) -> DataSourceInfo {
    DataSourceInfo {
        id: id.to_string(),
        label: label.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

/// Known business data sources, offered to the KPI builder.
pub static SOURCE_CATALOGUE: Lazy<Vec<DataSourceInfo>> = Lazy::new(|| {
    vec![
        info(
            "properties",
            "Properties",
            &["status", "type", "price", "area", "city", "listed_on"],
        ),
        info(
            "contacts",
            "Contacts",
            &["type", "source", "status", "created_on", "owner"],
        ),
        info(
            "deals",
            "Deals",
            &["stage", "value", "owner", "probability", "closed_on"],
        ),
        info(
            "leads",
            "Leads",
            &["type", "source", "converted", "score", "created_on"],
        ),
        info(
            "marketing",
            "Marketing",
            &["channel", "campaign", "spend", "clicks", "conversions"],
        ),
        info(
            "financial",
            "Financial",
            &["category", "amount", "revenue", "cost", "booked_on"],
        ),
        info(
            "team",
            "Team",
            &["member", "role", "tasks_done", "hours", "response_time"],
        ),
    ]
});

pub fn find_source(id: &str) -> Option<&'static DataSourceInfo> {
    SOURCE_CATALOGUE.iter().find(|s| s.id == id)
}
