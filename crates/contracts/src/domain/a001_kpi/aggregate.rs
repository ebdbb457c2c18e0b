use crate::domain::common::{AggregateId, EntityMetadata};
use crate::shared::kpi_filter::KpiFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a KPI definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KpiId(pub Uuid);

impl KpiId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl AggregateId for KpiId {
    fn as_string(&self) -> String {
        self.0.to_string()
    }
    fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(KpiId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

impl std::fmt::Display for KpiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiCategory {
    Sales,
    Marketing,
    Financial,
    Operational,
    Team,
    Property,
}

/// How a KPI is drawn. Closed set: the mapper has exactly one strategy per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationType {
    Card,
    Number,
    Trend,
    #[serde(alias = "progress-bar")]
    ProgressBar,
    Gauge,
    #[serde(alias = "line-chart")]
    LineChart,
    #[serde(alias = "bar-chart")]
    BarChart,
    #[serde(alias = "pie-chart")]
    PieChart,
    #[serde(alias = "donut-chart")]
    DonutChart,
}

impl VisualizationType {
    pub fn all() -> &'static [VisualizationType] {
        &[
            VisualizationType::Card,
            VisualizationType::Number,
            VisualizationType::Trend,
            VisualizationType::ProgressBar,
            VisualizationType::Gauge,
            VisualizationType::LineChart,
            VisualizationType::BarChart,
            VisualizationType::PieChart,
            VisualizationType::DonutChart,
        ]
    }

    /// Whether the strategy draws the period series
    pub fn is_time_series(&self) -> bool {
        matches!(self, VisualizationType::LineChart | VisualizationType::BarChart)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationType::Card => "card",
            VisualizationType::Number => "number",
            VisualizationType::Trend => "trend",
            VisualizationType::ProgressBar => "progress_bar",
            VisualizationType::Gauge => "gauge",
            VisualizationType::LineChart => "line_chart",
            VisualizationType::BarChart => "bar_chart",
            VisualizationType::PieChart => "pie_chart",
            VisualizationType::DonutChart => "donut_chart",
        }
    }
}

/// Aggregation applied to the filtered record set.
///
/// Each variant carries the inputs it needs, so a definition can never
/// reference a field the method ignores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationMethod {
    Sum {
        field: String,
    },
    Average {
        field: String,
    },
    Count,
    /// Share of the filtered set that also matches `numerator`, times 100
    Percentage {
        numerator: Vec<KpiFilter>,
    },
    Ratio {
        numerator_field: String,
        denominator_field: String,
    },
    /// Opaque expression handed to the pluggable formula evaluator
    Custom {
        formula: String,
    },
}

impl CalculationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMethod::Sum { .. } => "sum",
            CalculationMethod::Average { .. } => "average",
            CalculationMethod::Count => "count",
            CalculationMethod::Percentage { .. } => "percentage",
            CalculationMethod::Ratio { .. } => "ratio",
            CalculationMethod::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[serde(alias = "real-time", alias = "realtime")]
    RealTime,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::RealTime => "real_time",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
            Timeframe::Quarterly => "quarterly",
            Timeframe::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiUnit {
    Currency,
    Percentage,
    Number,
    Days,
    Hours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSize {
    Small,
    Medium,
    Large,
}

/// Where a KPI is shown: module, optional sub-module, display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiPosition {
    pub module: String,
    #[serde(default)]
    pub sub_module: Option<String>,
    #[serde(default)]
    pub order: i32,
}

// ============================================================================
// Validation
// ============================================================================

/// A definition that must not be persisted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KpiValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("data source must not be empty")]
    EmptyDataSource,
    #[error("placement module must not be empty")]
    EmptyModule,
    #[error("calculation method `{0}` requires a field")]
    MissingField(&'static str),
    #[error("percentage calculation requires at least one numerator filter")]
    MissingNumerator,
    #[error("custom calculation requires a non-empty formula")]
    EmptyFormula,
    #[error("target must be a finite non-negative number, got {0}")]
    InvalidTarget(f64),
    #[error("percentage target must be within [0, 100], got {0}")]
    PercentageTargetOutOfRange(f64),
    #[error("filter on `{0}` must have a field name")]
    EmptyFilterField(String),
    #[error("`between` filter on `{0}` requires exactly two values")]
    MalformedRange(String),
    #[error("refresh interval must be at least one second")]
    ZeroRefreshInterval,
}

fn validate_filters(filters: &[KpiFilter]) -> Result<(), KpiValidationError> {
    use crate::shared::kpi_filter::FilterOperator;

    for filter in filters {
        if filter.field.trim().is_empty() {
            return Err(KpiValidationError::EmptyFilterField(filter.display_text()));
        }
        if filter.operator == FilterOperator::Between && filter.value.as_range().is_none() {
            return Err(KpiValidationError::MalformedRange(filter.field.clone()));
        }
    }
    Ok(())
}

// ============================================================================
// Aggregate
// ============================================================================

/// KPI definition: one metric over one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: KpiId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: KpiCategory,
    pub position: KpiPosition,
    pub visualization: VisualizationType,
    pub data_source: String,
    pub method: CalculationMethod,
    #[serde(default)]
    pub filters: Vec<KpiFilter>,
    pub timeframe: Timeframe,
    #[serde(default)]
    pub target: Option<f64>,
    pub unit: KpiUnit,
    pub color: String,
    pub size: KpiSize,
    /// Per-KPI refresh cadence; `None` uses the configured default
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    pub is_active: bool,
    pub created_by: String,
    pub metadata: EntityMetadata,
}

impl Kpi {
    /// Build a new active definition from a draft, with a fresh id.
    pub fn from_draft(draft: KpiDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: KpiId::new_v4(),
            name: draft.name,
            description: draft.description,
            category: draft.category,
            position: draft.position,
            visualization: draft.visualization,
            data_source: draft.data_source,
            method: draft.method,
            filters: draft.filters,
            timeframe: draft.timeframe,
            target: draft.target,
            unit: draft.unit,
            color: draft.color,
            size: draft.size,
            refresh_interval_secs: draft.refresh_interval_secs,
            is_active: true,
            created_by: draft.created_by,
            metadata: EntityMetadata::at(now),
        }
    }

    pub fn to_string_id(&self) -> String {
        self.id.as_string()
    }

    pub fn validate(&self) -> Result<(), KpiValidationError> {
        if self.name.trim().is_empty() {
            return Err(KpiValidationError::EmptyName);
        }
        if self.data_source.trim().is_empty() {
            return Err(KpiValidationError::EmptyDataSource);
        }
        if self.position.module.trim().is_empty() {
            return Err(KpiValidationError::EmptyModule);
        }

        match &self.method {
            CalculationMethod::Sum { field } | CalculationMethod::Average { field } => {
                if field.trim().is_empty() {
                    return Err(KpiValidationError::MissingField(self.method.as_str()));
                }
            }
            CalculationMethod::Ratio {
                numerator_field,
                denominator_field,
            } => {
                if numerator_field.trim().is_empty() || denominator_field.trim().is_empty() {
                    return Err(KpiValidationError::MissingField("ratio"));
                }
            }
            CalculationMethod::Custom { formula } => {
                if formula.trim().is_empty() {
                    return Err(KpiValidationError::EmptyFormula);
                }
            }
            CalculationMethod::Percentage { numerator } => {
                if numerator.is_empty() {
                    return Err(KpiValidationError::MissingNumerator);
                }
                validate_filters(numerator)?
            }
            CalculationMethod::Count => {}
        }

        if let Some(target) = self.target {
            if !target.is_finite() || target < 0.0 {
                return Err(KpiValidationError::InvalidTarget(target));
            }
            if self.unit == KpiUnit::Percentage && target > 100.0 {
                return Err(KpiValidationError::PercentageTargetOutOfRange(target));
            }
        }

        if self.refresh_interval_secs == Some(0) {
            return Err(KpiValidationError::ZeroRefreshInterval);
        }

        validate_filters(&self.filters)
    }

    /// Merge the fields present in `patch` and bump `updated_at`.
    pub fn apply_patch(&mut self, patch: KpiPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(visualization) = patch.visualization {
            self.visualization = visualization;
        }
        if let Some(data_source) = patch.data_source {
            self.data_source = data_source;
        }
        if let Some(method) = patch.method {
            self.method = method;
        }
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
        if let Some(timeframe) = patch.timeframe {
            self.timeframe = timeframe;
        }
        if let Some(target) = patch.target {
            self.target = target;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(interval) = patch.refresh_interval_secs {
            self.refresh_interval_secs = interval;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        self.metadata.touch();
    }

    /// Flip the active flag. Nothing else changes.
    pub fn toggle_active(&mut self) {
        self.is_active = !self.is_active;
    }

    pub fn matches_query(&self, query: &KpiQuery) -> bool {
        if let Some(module) = &query.module {
            if &self.position.module != module {
                return false;
            }
        }
        if let Some(sub_module) = &query.sub_module {
            if self.position.sub_module.as_ref() != Some(sub_module) {
                return false;
            }
        }
        if let Some(is_active) = query.is_active {
            if self.is_active != is_active {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// DTOs
// ============================================================================

fn default_color() -> String {
    "#3b82f6".to_string()
}

fn default_timeframe() -> Timeframe {
    Timeframe::Monthly
}

fn default_unit() -> KpiUnit {
    KpiUnit::Number
}

fn default_size() -> KpiSize {
    KpiSize::Medium
}

/// Builder payload for a new KPI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: KpiCategory,
    pub position: KpiPosition,
    pub visualization: VisualizationType,
    pub data_source: String,
    pub method: CalculationMethod,
    #[serde(default)]
    pub filters: Vec<KpiFilter>,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default = "default_unit")]
    pub unit: KpiUnit,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_size")]
    pub size: KpiSize,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub created_by: String,
}

/// Distinguishes a missing key (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Partial update: only the present keys are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<KpiCategory>,
    #[serde(default)]
    pub position: Option<KpiPosition>,
    #[serde(default)]
    pub visualization: Option<VisualizationType>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub method: Option<CalculationMethod>,
    #[serde(default)]
    pub filters: Option<Vec<KpiFilter>>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    /// `null` clears the target
    #[serde(default, deserialize_with = "deserialize_some")]
    pub target: Option<Option<f64>>,
    #[serde(default)]
    pub unit: Option<KpiUnit>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<KpiSize>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub refresh_interval_secs: Option<Option<u64>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Store listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiQuery {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub sub_module: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub const KPI_DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Backup/restore document: the full set of definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDocument {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub kpis: Vec<Kpi>,
}

/// Outcome of an additive import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiImportSummary {
    pub imported: usize,
    /// Ids already present in the store; left untouched
    pub skipped: Vec<String>,
    /// Definitions that failed validation, with the reason
    pub rejected: Vec<(String, String)>,
}
