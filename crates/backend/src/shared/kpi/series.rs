use chrono::{Datelike, Duration, Months, NaiveDate};
use contracts::domain::a001_kpi::aggregate::{Kpi, KpiId, Timeframe};
use contracts::shared::indicators::{HistoryBucket, SeriesPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::aggregate::{aggregate, FormulaEvaluator};
use crate::shared::error::KpiResult;

pub const DEFAULT_BUCKETS: usize = 12;
pub const DEFAULT_SEED: u64 = 42;

/// Lowest and highest multiplier of the current value in a synthesized bucket
const MIN_FACTOR: f64 = 0.5;
const MAX_FACTOR: f64 = 1.5;

/// Series settings (`[series]` in config.toml)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub buckets: usize,
    pub seed: u64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Builds the fixed-length period series drawn by time-series visuals.
///
/// Real per-period history is always preferred. Without it, buckets are
/// synthesized around the current value: positive when the value is
/// positive, the last bucket equal to the value, and identical output for
/// the same seed, KPI and value.
#[derive(Debug, Clone)]
pub struct SeriesGenerator {
    buckets: usize,
    seed: u64,
}

impl SeriesGenerator {
    pub fn new(config: SeriesConfig) -> Self {
        Self {
            buckets: config.buckets.max(2),
            seed: config.seed,
        }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Aggregate each history bucket with the KPI's own filters and method.
    ///
    /// Only the most recent buckets are kept; a short history is padded at
    /// the front with synthesized buckets anchored at its oldest value.
    pub fn from_history(
        &self,
        kpi: &Kpi,
        history: &[HistoryBucket],
        formulas: &dyn FormulaEvaluator,
        as_of: NaiveDate,
    ) -> KpiResult<Vec<SeriesPoint>> {
        let start = history.len().saturating_sub(self.buckets);
        let mut real = Vec::with_capacity(self.buckets);
        for bucket in &history[start..] {
            let value = aggregate(&bucket.records, &kpi.filters, &kpi.method, formulas)?;
            real.push(SeriesPoint {
                label: bucket.label.clone(),
                value,
            });
        }

        let missing = self.buckets - real.len();
        if missing == 0 {
            return Ok(real);
        }

        let anchor = real.first().map(|p| p.value).unwrap_or(0.0);
        let labels = period_labels(kpi.timeframe, as_of, self.buckets);
        let factors = self.factors(kpi.id, missing + 1);
        let mut series: Vec<SeriesPoint> = labels
            .into_iter()
            .take(missing)
            .zip(factors)
            .map(|(label, factor)| SeriesPoint {
                label,
                value: anchor * factor,
            })
            .collect();
        series.extend(real);
        Ok(series)
    }

    /// Synthesize buckets ending at `as_of`; the last bucket equals `current`.
    pub fn synthesize(
        &self,
        kpi_id: KpiId,
        timeframe: Timeframe,
        current: f64,
        as_of: NaiveDate,
    ) -> Vec<SeriesPoint> {
        let labels = period_labels(timeframe, as_of, self.buckets);
        let factors = self.factors(kpi_id, self.buckets);
        labels
            .into_iter()
            .zip(factors)
            .map(|(label, factor)| SeriesPoint {
                label,
                value: current * factor,
            })
            .collect()
    }

    /// Smooth multipliers in [MIN_FACTOR, MAX_FACTOR]; the last one is exactly 1.
    fn factors(&self, kpi_id: KpiId, count: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.kpi_seed(kpi_id));
        let phase: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let growth: f64 = rng.gen_range(0.0..0.3);

        let last = count.saturating_sub(1);
        (0..count)
            .map(|i| {
                if i == last {
                    return 1.0;
                }
                let t = i as f64 / last.max(1) as f64;
                let drift = 1.0 - growth * (1.0 - t);
                let wave = 0.08 * (phase + i as f64 * 0.9).sin();
                let jitter: f64 = rng.gen_range(-0.04..0.04);
                (drift + wave + jitter).clamp(MIN_FACTOR, MAX_FACTOR)
            })
            .collect()
    }

    fn kpi_seed(&self, kpi_id: KpiId) -> u64 {
        let id = kpi_id.value().as_u128();
        self.seed ^ (id as u64) ^ ((id >> 64) as u64)
    }
}

impl Default for SeriesGenerator {
    fn default() -> Self {
        Self::new(SeriesConfig::default())
    }
}

/// `count` period labels, oldest first, the last one covering `as_of`.
pub fn period_labels(timeframe: Timeframe, as_of: NaiveDate, count: usize) -> Vec<String> {
    (0..count)
        .rev()
        .map(|back| {
            let back32 = back as u32;
            match timeframe {
                Timeframe::RealTime | Timeframe::Daily => (as_of - Duration::days(back as i64))
                    .format("%Y-%m-%d")
                    .to_string(),
                Timeframe::Weekly => (as_of - Duration::weeks(back as i64))
                    .format("%G-W%V")
                    .to_string(),
                Timeframe::Monthly => as_of
                    .checked_sub_months(Months::new(back32))
                    .unwrap_or(as_of)
                    .format("%Y-%m")
                    .to_string(),
                Timeframe::Quarterly => {
                    let d = as_of
                        .checked_sub_months(Months::new(back32 * 3))
                        .unwrap_or(as_of);
                    format!("{}-Q{}", d.year(), d.month0() / 3 + 1)
                }
                Timeframe::Yearly => (as_of.year() - back as i32).to_string(),
            }
        })
        .collect()
}
