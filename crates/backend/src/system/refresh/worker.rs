use chrono::Utc;
use contracts::domain::a001_kpi::aggregate::{Kpi, KpiId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::a001_kpi::repository::KpiStore;
use crate::shared::kpi::registry::{KpiEngine, ResultCache};

struct Timer {
    interval_secs: u64,
    handle: JoinHandle<()>,
}

/// Per-KPI refresh timers.
///
/// Every active KPI gets its own interval task. A tick re-reads the
/// definition from the store, so edits apply from the next tick on, and
/// writes the outcome into the shared [`ResultCache`].
pub struct KpiRefreshScheduler {
    store: Arc<dyn KpiStore>,
    engine: KpiEngine,
    cache: ResultCache,
    default_interval_secs: u64,
    timers: Mutex<HashMap<KpiId, Timer>>,
}

impl KpiRefreshScheduler {
    pub fn new(
        store: Arc<dyn KpiStore>,
        engine: KpiEngine,
        cache: ResultCache,
        default_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            engine,
            cache,
            default_interval_secs: default_interval_secs.max(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    fn interval_for(&self, kpi: &Kpi) -> u64 {
        kpi.refresh_interval_secs
            .unwrap_or(self.default_interval_secs)
            .max(1)
    }

    /// Align the running timers with the store: start timers for new active
    /// KPIs, restart those whose cadence changed, stop the rest.
    pub fn sync(&self) {
        let kpis = match self.store.list() {
            Ok(kpis) => kpis,
            Err(e) => {
                error!("Refresh scheduler cannot read KPI store: {}", e);
                return;
            }
        };
        let Ok(mut timers) = self.timers.lock() else {
            error!("Refresh scheduler timer table poisoned");
            return;
        };

        let mut wanted = HashSet::new();
        for kpi in kpis.iter().filter(|k| k.is_active) {
            wanted.insert(kpi.id);
            let interval_secs = self.interval_for(kpi);
            let current = timers
                .get(&kpi.id)
                .filter(|t| !t.handle.is_finished())
                .map(|t| t.interval_secs);
            if current == Some(interval_secs) {
                continue;
            }
            if let Some(old) = timers.remove(&kpi.id) {
                old.handle.abort();
            }
            timers.insert(kpi.id, self.spawn_timer(kpi.id, interval_secs));
            debug!("Refresh timer for KPI {} every {}s", kpi.id, interval_secs);
        }

        let stale: Vec<KpiId> = timers
            .keys()
            .filter(|id| !wanted.contains(*id))
            .copied()
            .collect();
        for id in stale {
            if let Some(timer) = timers.remove(&id) {
                timer.handle.abort();
                debug!("Refresh timer for KPI {} stopped", id);
            }
        }
    }

    /// Start (or restart) the timer of one KPI
    pub fn start(&self, kpi: &Kpi) {
        let interval_secs = self.interval_for(kpi);
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(old) = timers.remove(&kpi.id) {
                old.handle.abort();
            }
            timers.insert(kpi.id, self.spawn_timer(kpi.id, interval_secs));
        }
    }

    /// Stop the timer of one KPI. Returns whether one was running.
    pub fn stop(&self, id: &KpiId) -> bool {
        match self.timers.lock() {
            Ok(mut timers) => match timers.remove(id) {
                Some(timer) => {
                    timer.handle.abort();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn stop_all(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (_, timer) in timers.drain() {
                timer.handle.abort();
            }
        }
    }

    /// KPIs with a live timer
    pub fn running(&self) -> Vec<KpiId> {
        let mut ids: Vec<KpiId> = match self.timers.lock() {
            Ok(timers) => timers
                .iter()
                .filter(|(_, t)| !t.handle.is_finished())
                .map(|(id, _)| *id)
                .collect(),
            Err(_) => vec![],
        };
        ids.sort();
        ids
    }

    /// Re-sync with the store every `sync_every`, forever.
    pub async fn run_loop(&self, sync_every: Duration) {
        info!(
            "KPI refresh scheduler started (default interval {}s, sync every {:?})",
            self.default_interval_secs, sync_every
        );
        let mut interval = time::interval(sync_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.sync();
        }
    }

    fn spawn_timer(&self, id: KpiId, interval_secs: u64) -> Timer {
        let store = Arc::clone(&self.store);
        let engine = self.engine.clone();
        let cache = self.cache.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let kpi = match store.get(&id) {
                    Ok(Some(kpi)) if kpi.is_active => kpi,
                    Ok(Some(_)) => {
                        debug!("KPI {} inactive, timer exits", id);
                        break;
                    }
                    Ok(None) => {
                        cache.remove(&id).await;
                        debug!("KPI {} deleted, timer exits", id);
                        break;
                    }
                    Err(e) => {
                        warn!("KPI {} not refreshed, store unavailable: {}", id, e);
                        continue;
                    }
                };
                let result = engine
                    .refresh(&kpi, &cache, Utc::now().date_naive())
                    .await;
                if let Some(err) = &result.error {
                    debug!("KPI {} refreshed with error: {}", id, err);
                }
                // deleted while this tick was computing
                if matches!(store.get(&id), Ok(None)) {
                    cache.remove(&id).await;
                    debug!("KPI {} deleted during refresh, timer exits", id);
                    break;
                }
            }
        });

        Timer {
            interval_secs,
            handle,
        }
    }
}

impl Drop for KpiRefreshScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_kpi::repository::MemoryKpiStore;
    use crate::domain::a001_kpi::service;
    use crate::shared::data_source::InMemoryDataSource;
    use crate::shared::kpi::aggregate::UnsupportedFormulas;
    use crate::shared::kpi::series::SeriesGenerator;
    use crate::shared::kpi::visualization::ChartGeometry;
    use contracts::domain::a001_kpi::aggregate::{
        CalculationMethod, KpiCategory, KpiDraft, KpiPosition, KpiSize, KpiUnit, Timeframe,
        VisualizationType,
    };
    use contracts::shared::indicators::Record;
    use contracts::shared::kpi_filter::FieldValue;

    fn draft(name: &str) -> KpiDraft {
        KpiDraft {
            name: name.into(),
            description: String::new(),
            category: KpiCategory::Operational,
            position: KpiPosition {
                module: "properties".into(),
                sub_module: None,
                order: 0,
            },
            visualization: VisualizationType::Number,
            data_source: "properties".into(),
            method: CalculationMethod::Count,
            filters: vec![],
            timeframe: Timeframe::Daily,
            target: None,
            unit: KpiUnit::Number,
            color: "#000".into(),
            size: KpiSize::Small,
            refresh_interval_secs: Some(60),
            created_by: "test".into(),
        }
    }

    fn scheduler(store: Arc<MemoryKpiStore>, cache: ResultCache) -> KpiRefreshScheduler {
        let source = InMemoryDataSource::new().with_records(
            "properties",
            vec![Record::from([("status".to_string(), FieldValue::from("active"))]); 3],
        );
        let engine = KpiEngine::new(
            Arc::new(source),
            Arc::new(UnsupportedFormulas),
            SeriesGenerator::default(),
            ChartGeometry::default(),
        );
        KpiRefreshScheduler::new(store, engine, cache, 300)
    }

    #[tokio::test]
    async fn test_sync_starts_and_first_tick_computes() {
        let store = Arc::new(MemoryKpiStore::new());
        let kpi = service::create(store.as_ref(), draft("Listings")).unwrap();
        let cache = ResultCache::new();
        let scheduler = scheduler(store.clone(), cache.clone());

        scheduler.sync();
        assert_eq!(scheduler.running(), vec![kpi.id]);

        // the first interval tick fires immediately
        for _ in 0..50 {
            if cache.get(&kpi.id).await.is_some() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.get(&kpi.id).await.map(|r| r.value), Some(3.0));
    }

    #[tokio::test]
    async fn test_sync_stops_inactive_and_deleted() {
        let store = Arc::new(MemoryKpiStore::new());
        let a = service::create(store.as_ref(), draft("A")).unwrap();
        let b = service::create(store.as_ref(), draft("B")).unwrap();
        let scheduler = scheduler(store.clone(), ResultCache::new());

        scheduler.sync();
        assert_eq!(scheduler.running().len(), 2);

        service::toggle(store.as_ref(), &a.id).unwrap();
        service::delete(store.as_ref(), &b.id).unwrap();
        scheduler.sync();
        assert!(scheduler.running().is_empty());
    }

    #[tokio::test]
    async fn test_timer_drops_result_of_deleted_kpi() {
        let store = Arc::new(MemoryKpiStore::new());
        let kpi = service::create(store.as_ref(), draft("Listings")).unwrap();
        let cache = ResultCache::new();
        let scheduler = scheduler(store.clone(), cache.clone());

        // a result written by a tick that outlived the delete
        let engine = KpiEngine::new(
            Arc::new(InMemoryDataSource::new().with_records("properties", vec![])),
            Arc::new(UnsupportedFormulas),
            SeriesGenerator::default(),
            ChartGeometry::default(),
        );
        engine.refresh(&kpi, &cache, Utc::now().date_naive()).await;
        service::delete(store.as_ref(), &kpi.id).unwrap();
        assert!(cache.get(&kpi.id).await.is_some());

        scheduler.start(&kpi);
        for _ in 0..50 {
            if cache.get(&kpi.id).await.is_none() && scheduler.running().is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.get(&kpi.id).await.is_none());
        assert!(scheduler.running().is_empty());
    }

    #[tokio::test]
    async fn test_stop_and_stop_all() {
        let store = Arc::new(MemoryKpiStore::new());
        let a = service::create(store.as_ref(), draft("A")).unwrap();
        let b = service::create(store.as_ref(), draft("B")).unwrap();
        let scheduler = scheduler(store.clone(), ResultCache::new());

        scheduler.start(&a);
        scheduler.start(&b);
        assert!(scheduler.stop(&a.id));
        assert!(!scheduler.stop(&a.id));
        assert_eq!(scheduler.running(), vec![b.id]);

        scheduler.stop_all();
        assert!(scheduler.running().is_empty());
    }
}
