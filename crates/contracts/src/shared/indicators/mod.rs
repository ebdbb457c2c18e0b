use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::a001_kpi::aggregate::KpiId;
use crate::shared::kpi_filter::FieldValue;
use crate::shared::visualization::RenderInstruction;

// ---------------------------------------------------------------------------
// Data-source snapshots
// ---------------------------------------------------------------------------

/// One flat record of a data source: field name -> cell.
pub type Record = HashMap<String, FieldValue>;

/// Snapshot of candidate records returned by a data source.
pub type RecordSet = Vec<Record>;

/// Records of one historical period, oldest bucket first in a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBucket {
    pub label: String,
    pub records: RecordSet,
}

/// Catalogue entry for a known data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub id: String,
    pub label: String,
    /// Fields commonly present on the source's records
    pub fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// Computed values
// ---------------------------------------------------------------------------

/// Direction of change against the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    /// Arrow glyph used by cards
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Neutral => "→",
        }
    }
}

/// One bucket of a period series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

/// Where the series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Aggregated from real per-period records
    History,
    /// Synthesized around the current value
    Synthesized,
}

/// Result of one refresh of one KPI. Recomputed every tick, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedResult {
    pub kpi_id: KpiId,
    pub value: f64,
    pub previous_value: f64,
    pub trend: Trend,
    /// Magnitude of change in percent, one decimal, never negative
    pub trend_percent: f64,
    pub series: Vec<SeriesPoint>,
    pub series_source: SeriesSource,
    /// Whether `previous_value` came from a real previous-period snapshot
    pub previous_is_estimated: bool,
    pub computed_at: DateTime<Utc>,
    /// Set when the value could not be computed (shown as an error marker)
    #[serde(default)]
    pub error: Option<String>,
    /// Set when this result is carried over from an earlier tick
    #[serde(default)]
    pub stale: bool,
}

impl ComputedResult {
    /// Placeholder result for a KPI whose computation failed this tick.
    pub fn failed(kpi_id: KpiId, error: String, computed_at: DateTime<Utc>) -> Self {
        Self {
            kpi_id,
            value: 0.0,
            previous_value: 0.0,
            trend: Trend::Neutral,
            trend_percent: 0.0,
            series: vec![],
            series_source: SeriesSource::Synthesized,
            previous_is_estimated: true,
            computed_at,
            error: Some(error),
            stale: false,
        }
    }
}

// ---------------------------------------------------------------------------
// API request / response
// ---------------------------------------------------------------------------

/// Batch request: compute and render several KPIs in one round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeKpisRequest {
    pub kpi_ids: Vec<KpiId>,
}

/// Computed result plus the render instruction for one KPI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiView {
    pub kpi_id: KpiId,
    pub name: String,
    pub result: ComputedResult,
    pub render: RenderInstruction,
}

/// Batch response. KPIs that failed still appear, with their error marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeKpisResponse {
    pub views: Vec<KpiView>,
    /// Requested ids that are not in the store
    #[serde(default)]
    pub missing: Vec<KpiId>,
}
