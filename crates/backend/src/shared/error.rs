use contracts::domain::a001_kpi::aggregate::KpiValidationError;
use thiserror::Error;

/// Failure of a store read or write. A failed write leaves the store unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failure of a data-source adapter
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("unknown data source `{0}`")]
    UnknownSource(String),
    #[error("data source `{source_id}` could not be read: {reason}")]
    Unreadable { source_id: String, reason: String },
}

/// Errors of the KPI engine and definition service.
#[derive(Debug, Error)]
pub enum KpiError {
    /// Malformed definition, rejected before it reaches the store
    #[error("invalid KPI definition: {0}")]
    Definition(#[from] KpiValidationError),

    /// The data source could not be resolved this tick
    #[error("data unavailable: {0}")]
    DataUnavailable(#[from] DataSourceError),

    /// Custom formula failed or produced a non-finite number
    #[error("computation failed: {0}")]
    Computation(String),

    #[error("KPI not found: {0}")]
    NotFound(String),

    #[error("invalid KPI id `{0}`")]
    InvalidId(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type KpiResult<T> = Result<T, KpiError>;
