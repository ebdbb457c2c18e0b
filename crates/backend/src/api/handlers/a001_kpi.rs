use axum::{
    extract::{Path, Query, State},
    Json,
};
use contracts::domain::a001_kpi::aggregate::{
    Kpi, KpiDocument, KpiDraft, KpiImportSummary, KpiPatch, KpiQuery,
};
use contracts::shared::indicators::DataSourceInfo;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, blocking, ApiResult, AppState};
use crate::domain::a001_kpi::service;
use crate::shared::data_source::SOURCE_CATALOGUE;

/// GET /api/kpi?module=&sub_module=&is_active=
pub async fn list(State(state): State<AppState>, Query(query): Query<KpiQuery>) -> ApiResult<Vec<Kpi>> {
    service::list(state.store.as_ref(), &query)
        .map(Json)
        .map_err(|e| api_error("list KPIs", e))
}

/// POST /api/kpi
pub async fn create(State(state): State<AppState>, Json(draft): Json<KpiDraft>) -> ApiResult<Kpi> {
    let store = Arc::clone(&state.store);
    let kpi = blocking("create KPI", move || service::create(store.as_ref(), draft)).await?;
    state.definitions_changed();
    Ok(Json(kpi))
}

/// GET /api/kpi/:id
pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Kpi> {
    let id = service::parse_id(&id).map_err(|e| api_error("get KPI", e))?;
    service::get(state.store.as_ref(), &id)
        .map(Json)
        .map_err(|e| api_error("get KPI", e))
}

/// PUT /api/kpi/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<KpiPatch>,
) -> ApiResult<Kpi> {
    let id = service::parse_id(&id).map_err(|e| api_error("update KPI", e))?;
    let store = Arc::clone(&state.store);
    let kpi = blocking("update KPI", move || service::update(store.as_ref(), &id, patch)).await?;
    state.definitions_changed();
    Ok(Json(kpi))
}

/// POST /api/kpi/:id/toggle
pub async fn toggle(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Kpi> {
    let id = service::parse_id(&id).map_err(|e| api_error("toggle KPI", e))?;
    let store = Arc::clone(&state.store);
    let kpi = blocking("toggle KPI", move || service::toggle(store.as_ref(), &id)).await?;
    state.definitions_changed();
    Ok(Json(kpi))
}

/// DELETE /api/kpi/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = service::parse_id(&id).map_err(|e| api_error("delete KPI", e))?;
    let store = Arc::clone(&state.store);
    blocking("delete KPI", move || service::delete(store.as_ref(), &id)).await?;
    state.cache.remove(&id).await;
    state.definitions_changed();
    Ok(Json(json!({ "success": true })))
}

/// GET /api/kpi/export
pub async fn export(State(state): State<AppState>) -> ApiResult<KpiDocument> {
    service::export(state.store.as_ref())
        .map(Json)
        .map_err(|e| api_error("export KPIs", e))
}

/// POST /api/kpi/import
pub async fn import(
    State(state): State<AppState>,
    Json(document): Json<KpiDocument>,
) -> ApiResult<KpiImportSummary> {
    let store = Arc::clone(&state.store);
    let summary = blocking("import KPIs", move || service::import(store.as_ref(), document)).await?;
    state.definitions_changed();
    Ok(Json(summary))
}

/// GET /api/kpi/sources
pub async fn sources() -> Json<Vec<DataSourceInfo>> {
    Json(SOURCE_CATALOGUE.clone())
}
