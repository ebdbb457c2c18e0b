use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;

use backend::api::handlers::AppState;
use backend::domain::a001_kpi::repository::JsonFileKpiStore;
use backend::routes::configure_routes;
use backend::shared::config;
use backend::shared::data_source::JsonDirDataSource;
use backend::shared::kpi::aggregate::UnsupportedFormulas;
use backend::shared::kpi::registry::{KpiEngine, ResultCache};
use backend::shared::kpi::series::SeriesGenerator;
use backend::system;
use backend::system::refresh::KpiRefreshScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    system::tracing::initialize()?;

    let config = config::load_config()?;

    let store_path = config.store_path();
    let store = Arc::new(
        JsonFileKpiStore::load(&store_path)
            .map_err(|e| anyhow::anyhow!("KPI store {} failed to load: {e}", store_path.display()))?,
    );

    let data_dir = config.data_source_dir();
    tracing::info!("Reading data sources from {}", data_dir.display());

    let engine = KpiEngine::new(
        Arc::new(JsonDirDataSource::new(data_dir)),
        Arc::new(UnsupportedFormulas),
        SeriesGenerator::new(config.series),
        config.geometry,
    );
    let cache = ResultCache::new();

    let scheduler = Arc::new(KpiRefreshScheduler::new(
        store.clone(),
        engine.clone(),
        cache.clone(),
        config.refresh.default_interval_secs,
    ));
    {
        let scheduler = Arc::clone(&scheduler);
        let sync_every = Duration::from_secs(config.refresh.sync_interval_secs.max(1));
        tokio::spawn(async move { scheduler.run_loop(sync_every).await });
    }

    let state = AppState::new(store, engine, cache).with_scheduler(scheduler);
    let app = configure_routes(state);

    let addr = config.bind_address();
    tracing::info!("Attempting to bind server to http://{}", addr);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => {
            tracing::info!("Server successfully bound to {}", addr);
            listener
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!("Address {} is already in use", addr);
            } else {
                tracing::error!("Failed to bind to {}: {}", addr, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
