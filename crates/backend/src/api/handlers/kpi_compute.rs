use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use contracts::shared::indicators::{ComputeKpisRequest, ComputeKpisResponse, KpiView};

use super::{api_error, ApiResult, AppState};
use crate::domain::a001_kpi::service;
use crate::shared::error::KpiError;

/// GET /api/kpi/:id/view
///
/// Computes the KPI now and returns the result with its render instruction.
pub async fn view(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<KpiView> {
    let id = service::parse_id(&id).map_err(|e| api_error("view KPI", e))?;
    let kpi = service::get(state.store.as_ref(), &id).map_err(|e| api_error("view KPI", e))?;
    let view = state
        .engine
        .view(&kpi, &state.cache, Utc::now().date_naive())
        .await;
    Ok(Json(view))
}

/// POST /api/kpi/compute
///
/// Batch-computes the requested KPIs. A failing KPI still yields a view
/// carrying its error; unknown ids are listed in `missing`.
pub async fn compute(
    State(state): State<AppState>,
    Json(req): Json<ComputeKpisRequest>,
) -> ApiResult<ComputeKpisResponse> {
    tracing::info!("KPI: computing {} KPIs", req.kpi_ids.len());

    let mut kpis = Vec::with_capacity(req.kpi_ids.len());
    let mut missing = Vec::new();
    for id in req.kpi_ids {
        match service::get(state.store.as_ref(), &id) {
            Ok(kpi) => kpis.push(kpi),
            Err(KpiError::NotFound(_)) => missing.push(id),
            Err(e) => return Err(api_error("compute KPIs", e)),
        }
    }

    let views = state
        .engine
        .compute_batch(&kpis, &state.cache, Utc::now().date_naive())
        .await;

    tracing::info!("KPI: returning {} views, {} missing", views.len(), missing.len());
    Ok(Json(ComputeKpisResponse { views, missing }))
}
