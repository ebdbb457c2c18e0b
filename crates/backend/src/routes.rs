use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{self, AppState};
use crate::system::middleware::request_logger::request_logger;

/// All application routes
pub fn configure_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // KPI DEFINITIONS
        // ========================================
        .route(
            "/api/kpi",
            get(handlers::a001_kpi::list).post(handlers::a001_kpi::create),
        )
        .route("/api/kpi/sources", get(handlers::a001_kpi::sources))
        .route("/api/kpi/export", get(handlers::a001_kpi::export))
        .route("/api/kpi/import", post(handlers::a001_kpi::import))
        .route(
            "/api/kpi/:id",
            get(handlers::a001_kpi::get_by_id)
                .put(handlers::a001_kpi::update)
                .delete(handlers::a001_kpi::delete),
        )
        .route("/api/kpi/:id/toggle", post(handlers::a001_kpi::toggle))
        // ========================================
        // KPI COMPUTATION
        // ========================================
        .route("/api/kpi/compute", post(handlers::kpi_compute::compute))
        .route("/api/kpi/:id/view", get(handlers::kpi_compute::view))
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_kpi::repository::{JsonFileKpiStore, KpiStore, MemoryKpiStore};
    use crate::shared::data_source::InMemoryDataSource;
    use crate::shared::kpi::aggregate::UnsupportedFormulas;
    use crate::shared::kpi::registry::{KpiEngine, ResultCache};
    use crate::shared::kpi::series::SeriesGenerator;
    use crate::shared::kpi::visualization::ChartGeometry;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use contracts::shared::indicators::Record;
    use contracts::shared::kpi_filter::FieldValue;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryKpiStore>) {
        let store = Arc::new(MemoryKpiStore::new());
        (router_with(store.clone()), store)
    }

    fn router_with(store: Arc<dyn KpiStore>) -> Router {
        let deals = vec![
            Record::from([
                ("stage".to_string(), FieldValue::from("closed-won")),
                ("value".to_string(), FieldValue::from(100000)),
            ]),
            Record::from([
                ("stage".to_string(), FieldValue::from("closed-won")),
                ("value".to_string(), FieldValue::from(200000)),
            ]),
            Record::from([
                ("stage".to_string(), FieldValue::from("proposal")),
                ("value".to_string(), FieldValue::from(50000)),
            ]),
        ];
        let engine = KpiEngine::new(
            Arc::new(InMemoryDataSource::new().with_records("deals", deals)),
            Arc::new(UnsupportedFormulas),
            SeriesGenerator::default(),
            ChartGeometry::default(),
        );
        configure_routes(AppState::new(store, engine, ResultCache::new()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn won_value_draft() -> Value {
        json!({
            "name": "Closed-won value",
            "category": "sales",
            "position": { "module": "deals", "order": 1 },
            "visualization": "gauge",
            "data_source": "deals",
            "method": { "kind": "sum", "field": "value" },
            "filters": [{ "field": "stage", "operator": "equals", "value": "closed-won" }],
            "target": 400000,
            "unit": "currency"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_view() {
        let (app, store) = app();
        let (status, created) = call(&app, "POST", "/api/kpi", Some(won_value_draft())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["is_active"], json!(true));
        assert_eq!(store.list().unwrap().len(), 1);

        let id = created["id"].as_str().unwrap().to_string();
        let (status, view) = call(&app, "GET", &format!("/api/kpi/{}/view", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["result"]["value"], json!(300000.0));
        assert_eq!(view["render"]["type"], json!("gauge"));
        assert_eq!(view["render"]["progress"], json!(75.0));
        assert_eq!(view["render"]["display_value"], json!("$300,000.00"));
    }

    #[tokio::test]
    async fn test_edits_persist_through_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpis.json");
        let app = router_with(Arc::new(JsonFileKpiStore::load(&path).unwrap()));

        let (status, created) = call(&app, "POST", "/api/kpi", Some(won_value_draft())).await;
        assert_eq!(status, StatusCode::OK);
        let uri = format!("/api/kpi/{}", created["id"].as_str().unwrap());
        let (status, _) = call(&app, "PUT", &uri, Some(json!({ "name": "Won value" }))).await;
        assert_eq!(status, StatusCode::OK);

        let reloaded = JsonFileKpiStore::load(&path).unwrap().list().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].name, "Won value");
    }

    #[tokio::test]
    async fn test_invalid_definition_is_unprocessable() {
        let (app, store) = app();
        let mut draft = won_value_draft();
        draft["method"] = json!({ "kind": "custom", "formula": "" });
        let (status, body) = call(&app, "POST", "/api/kpi", Some(draft)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("formula"));
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_toggle_delete() {
        let (app, _) = app();
        let (_, created) = call(&app, "POST", "/api/kpi", Some(won_value_draft())).await;
        let id = created["id"].as_str().unwrap().to_string();
        let uri = format!("/api/kpi/{}", id);

        let (status, updated) = call(&app, "PUT", &uri, Some(json!({ "target": null }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["target"], Value::Null);
        assert_eq!(updated["name"], created["name"]);

        let (_, toggled) = call(&app, "POST", &format!("{}/toggle", uri), None).await;
        assert_eq!(toggled["is_active"], json!(false));

        let (_, inactive) = call(&app, "GET", "/api/kpi?is_active=false", None).await;
        assert_eq!(inactive.as_array().map(|a| a.len()), Some(1));

        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", "/api/kpi/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_compute_isolates_failures() {
        let (app, _) = app();
        let (_, good) = call(&app, "POST", "/api/kpi", Some(won_value_draft())).await;
        let mut broken = won_value_draft();
        broken["data_source"] = json!("leads");
        let (_, broken) = call(&app, "POST", "/api/kpi", Some(broken)).await;
        let unknown = uuid::Uuid::new_v4().to_string();

        let (status, response) = call(
            &app,
            "POST",
            "/api/kpi/compute",
            Some(json!({ "kpi_ids": [broken["id"], good["id"], unknown] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let views = response["views"].as_array().unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0]["result"]["error"].is_string());
        assert_eq!(views[1]["result"]["value"], json!(300000.0));
        assert_eq!(response["missing"], json!([unknown]));
    }

    #[tokio::test]
    async fn test_export_import_and_sources() {
        let (app, _) = app();
        call(&app, "POST", "/api/kpi", Some(won_value_draft())).await;
        let (status, document) = call(&app, "GET", "/api/kpi/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["kpis"].as_array().map(|a| a.len()), Some(1));

        let (other, _) = super::tests::app();
        let (status, summary) = call(&other, "POST", "/api/kpi/import", Some(document.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["imported"], json!(1));

        let (_, summary) = call(&other, "POST", "/api/kpi/import", Some(document)).await;
        assert_eq!(summary["skipped"].as_array().map(|a| a.len()), Some(1));

        let (_, sources) = call(&app, "GET", "/api/kpi/sources", None).await;
        assert_eq!(sources.as_array().map(|a| a.len()), Some(7));
    }
}
