pub mod a001_kpi;
pub mod kpi_compute;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::a001_kpi::repository::KpiStore;
use crate::shared::error::{KpiError, KpiResult};
use crate::shared::kpi::registry::{KpiEngine, ResultCache};
use crate::system::refresh::KpiRefreshScheduler;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KpiStore>,
    pub engine: KpiEngine,
    pub cache: ResultCache,
    /// Notified after every definition change so timers follow edits
    pub scheduler: Option<Arc<KpiRefreshScheduler>>,
}

impl AppState {
    pub fn new(store: Arc<dyn KpiStore>, engine: KpiEngine, cache: ResultCache) -> Self {
        Self {
            store,
            engine,
            cache,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<KpiRefreshScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub(crate) fn definitions_changed(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.sync();
        }
    }
}

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn status_for(error: &KpiError) -> StatusCode {
    match error {
        KpiError::Definition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        KpiError::NotFound(_) => StatusCode::NOT_FOUND,
        KpiError::InvalidId(_) => StatusCode::BAD_REQUEST,
        KpiError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        KpiError::Computation(_) | KpiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log the failure and turn it into an error response
pub fn api_error(action: &str, error: KpiError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Failed to {}: {}", action, error);
    } else {
        tracing::warn!("Failed to {}: {}", action, error);
    }
    (status, Json(json!({ "error": error.to_string() })))
}

/// Run a store call on the blocking pool. The file store writes to disk
/// while holding its lock, which must not stall the async workers.
pub async fn blocking<T, F>(action: &str, call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> KpiResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result.map_err(|e| api_error(action, e)),
        Err(e) => {
            tracing::error!("Failed to {}: store task aborted: {}", action, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("failed to {}", action) })),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::{DataSourceError, StoreError};
    use contracts::domain::a001_kpi::aggregate::KpiValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&KpiError::Definition(KpiValidationError::EmptyName)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&KpiError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&KpiError::DataUnavailable(DataSourceError::UnknownSource("x".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&KpiError::Store(StoreError::Poisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_blocking_maps_errors() {
        assert_eq!(blocking("count", || Ok(3)).await.ok(), Some(3));

        let (status, Json(body)) = blocking::<(), _>("find KPI", || {
            Err(KpiError::NotFound("x".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }
}
