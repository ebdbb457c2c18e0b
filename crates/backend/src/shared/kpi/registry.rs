use chrono::{DateTime, NaiveDate, Utc};
use contracts::domain::a001_kpi::aggregate::{Kpi, KpiId};
use contracts::shared::indicators::{
    ComputedResult, HistoryBucket, KpiView, RecordSet, SeriesSource,
};
use contracts::shared::visualization::RenderInstruction;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::aggregate::{aggregate, FormulaEvaluator};
use super::series::SeriesGenerator;
use super::trend::calculate_trend;
use super::visualization::{render, ChartGeometry};
use crate::shared::data_source::DataSourceAdapter;
use crate::shared::error::{KpiError, KpiResult};

/// Everything the pure pipeline needs for one KPI, fetched up front.
#[derive(Debug, Clone, Default)]
pub struct KpiInputs {
    pub records: RecordSet,
    pub previous: Option<RecordSet>,
    pub history: Option<Vec<HistoryBucket>>,
}

/// Aggregate → trend → series for one KPI, without any I/O.
///
/// The previous value comes from the previous-period snapshot when there is
/// one, otherwise from the penultimate series bucket (flagged as estimated).
pub fn compute_snapshot(
    kpi: &Kpi,
    inputs: &KpiInputs,
    formulas: &dyn FormulaEvaluator,
    series: &SeriesGenerator,
    as_of: NaiveDate,
    computed_at: DateTime<Utc>,
) -> KpiResult<ComputedResult> {
    let value = aggregate(&inputs.records, &kpi.filters, &kpi.method, formulas)?;

    let (points, series_source) = match inputs.history.as_deref() {
        Some(history) if !history.is_empty() => (
            series.from_history(kpi, history, formulas, as_of)?,
            SeriesSource::History,
        ),
        _ => (
            series.synthesize(kpi.id, kpi.timeframe, value, as_of),
            SeriesSource::Synthesized,
        ),
    };

    let (previous_value, previous_is_estimated) = match &inputs.previous {
        Some(previous) => (
            aggregate(previous, &kpi.filters, &kpi.method, formulas)?,
            false,
        ),
        None => {
            let estimate = points
                .len()
                .checked_sub(2)
                .map(|i| points[i].value)
                .unwrap_or(value);
            (estimate, true)
        }
    };

    let trend = calculate_trend(value, previous_value);

    Ok(ComputedResult {
        kpi_id: kpi.id,
        value,
        previous_value,
        trend: trend.trend,
        trend_percent: trend.percent,
        series: points,
        series_source,
        previous_is_estimated,
        computed_at,
        error: None,
        stale: false,
    })
}

// ─── Result cache ───────────────────────────────────────────────────────────

/// Latest result per KPI. Shared between the refresh timers and the API.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    inner: Arc<RwLock<HashMap<KpiId, ComputedResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &KpiId) -> Option<ComputedResult> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn insert(&self, result: ComputedResult) {
        self.inner.write().await.insert(result.kpi_id, result);
    }

    pub async fn remove(&self, id: &KpiId) -> Option<ComputedResult> {
        self.inner.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Computes and renders KPIs against a data source.
///
/// One KPI's failure never affects another: `refresh` always yields a
/// result, carrying the error or a stale flag instead of failing.
#[derive(Clone)]
pub struct KpiEngine {
    data_source: Arc<dyn DataSourceAdapter>,
    formulas: Arc<dyn FormulaEvaluator>,
    series: SeriesGenerator,
    geometry: ChartGeometry,
}

impl KpiEngine {
    pub fn new(
        data_source: Arc<dyn DataSourceAdapter>,
        formulas: Arc<dyn FormulaEvaluator>,
        series: SeriesGenerator,
        geometry: ChartGeometry,
    ) -> Self {
        Self {
            data_source,
            formulas,
            series,
            geometry,
        }
    }

    pub fn geometry(&self) -> &ChartGeometry {
        &self.geometry
    }

    /// Fetch the KPI's snapshots. Only the current snapshot is mandatory.
    async fn fetch_inputs(&self, kpi: &Kpi) -> KpiResult<KpiInputs> {
        let records = self.data_source.fetch_records(&kpi.data_source).await?;

        let previous = match self
            .data_source
            .fetch_previous_period(&kpi.data_source, kpi.timeframe)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::debug!("KPI {}: previous period unavailable: {}", kpi.id, e);
                None
            }
        };

        let history = match self
            .data_source
            .fetch_history(&kpi.data_source, kpi.timeframe)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::debug!("KPI {}: history unavailable: {}", kpi.id, e);
                None
            }
        };

        Ok(KpiInputs {
            records,
            previous,
            history,
        })
    }

    /// Compute one KPI, surfacing every failure to the caller.
    pub async fn compute(&self, kpi: &Kpi, as_of: NaiveDate) -> KpiResult<ComputedResult> {
        let inputs = self.fetch_inputs(kpi).await?;
        compute_snapshot(
            kpi,
            &inputs,
            self.formulas.as_ref(),
            &self.series,
            as_of,
            Utc::now(),
        )
    }

    /// Compute one KPI and update the cache, isolating failures:
    ///
    /// - data unavailable: the cached result is kept and marked stale; with
    ///   nothing cached, an error result is returned
    /// - any other failure: value 0 with the error marker
    pub async fn refresh(&self, kpi: &Kpi, cache: &ResultCache, as_of: NaiveDate) -> ComputedResult {
        match self.compute(kpi, as_of).await {
            Ok(result) => {
                tracing::debug!("KPI {} ({}) = {}", kpi.id, kpi.name, result.value);
                cache.insert(result.clone()).await;
                result
            }
            Err(KpiError::DataUnavailable(e)) => {
                tracing::warn!("KPI {} ({}) skipped: {}", kpi.id, kpi.name, e);
                match cache.get(&kpi.id).await {
                    Some(mut cached) => {
                        cached.stale = true;
                        cache.insert(cached.clone()).await;
                        cached
                    }
                    None => ComputedResult::failed(kpi.id, e.to_string(), Utc::now()),
                }
            }
            Err(e) => {
                tracing::warn!("KPI {} ({}) compute error: {}", kpi.id, kpi.name, e);
                let failed = ComputedResult::failed(kpi.id, e.to_string(), Utc::now());
                cache.insert(failed.clone()).await;
                failed
            }
        }
    }

    pub fn render(&self, kpi: &Kpi, result: &ComputedResult) -> RenderInstruction {
        render(kpi, result, &self.geometry)
    }

    /// Refresh and render one KPI.
    pub async fn view(&self, kpi: &Kpi, cache: &ResultCache, as_of: NaiveDate) -> KpiView {
        let result = self.refresh(kpi, cache, as_of).await;
        let render = self.render(kpi, &result);
        KpiView {
            kpi_id: kpi.id,
            name: kpi.name.clone(),
            result,
            render,
        }
    }

    /// Refresh and render several KPIs. Every KPI yields a view.
    pub async fn compute_batch(
        &self,
        kpis: &[Kpi],
        cache: &ResultCache,
        as_of: NaiveDate,
    ) -> Vec<KpiView> {
        let mut views = Vec::with_capacity(kpis.len());
        for kpi in kpis {
            views.push(self.view(kpi, cache, as_of).await);
        }
        views
    }
}
