use contracts::domain::a001_kpi::aggregate::CalculationMethod;
use contracts::shared::indicators::Record;
use contracts::shared::kpi_filter::KpiFilter;

use super::filter::{apply_filters, matches_all};
use crate::shared::error::{KpiError, KpiResult};

// ---------------------------------------------------------------------------
// Custom formula seam
// ---------------------------------------------------------------------------

/// Evaluator for `CalculationMethod::Custom`.
///
/// Receives the full, unfiltered record set together with the KPI filters;
/// the formula syntax is entirely the evaluator's business.
pub trait FormulaEvaluator: Send + Sync {
    fn evaluate(
        &self,
        formula: &str,
        records: &[Record],
        filters: &[KpiFilter],
    ) -> Result<f64, String>;
}

impl<F> FormulaEvaluator for F
where
    F: Fn(&str, &[Record], &[KpiFilter]) -> Result<f64, String> + Send + Sync,
{
    fn evaluate(
        &self,
        formula: &str,
        records: &[Record],
        filters: &[KpiFilter],
    ) -> Result<f64, String> {
        self(formula, records, filters)
    }
}

/// Default evaluator: every custom formula fails with a computation error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedFormulas;

impl FormulaEvaluator for UnsupportedFormulas {
    fn evaluate(&self, formula: &str, _: &[Record], _: &[KpiFilter]) -> Result<f64, String> {
        Err(format!("no formula evaluator configured for `{}`", formula))
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Apply `filters` to `records` and reduce the matching set with `method`.
pub fn aggregate(
    records: &[Record],
    filters: &[KpiFilter],
    method: &CalculationMethod,
    formulas: &dyn FormulaEvaluator,
) -> KpiResult<f64> {
    let value = match method {
        CalculationMethod::Custom { formula } => formulas
            .evaluate(formula, records, filters)
            .map_err(KpiError::Computation)?,
        _ => {
            let filtered = apply_filters(records, filters);
            aggregate_filtered(&filtered, method)
        }
    };

    if !value.is_finite() {
        return Err(KpiError::Computation(format!(
            "{} produced a non-finite value",
            method.as_str()
        )));
    }
    Ok(value)
}

fn aggregate_filtered(filtered: &[&Record], method: &CalculationMethod) -> f64 {
    match method {
        CalculationMethod::Count => filtered.len() as f64,
        CalculationMethod::Sum { field } => sum_field(filtered, field),
        CalculationMethod::Average { field } => {
            if filtered.is_empty() {
                0.0
            } else {
                sum_field(filtered, field) / filtered.len() as f64
            }
        }
        CalculationMethod::Percentage { numerator } => {
            if filtered.is_empty() {
                return 0.0;
            }
            let hits = filtered
                .iter()
                .filter(|record| matches_all(record, numerator))
                .count();
            hits as f64 / filtered.len() as f64 * 100.0
        }
        CalculationMethod::Ratio {
            numerator_field,
            denominator_field,
        } => {
            let denominator = sum_field(filtered, denominator_field);
            if denominator == 0.0 {
                0.0
            } else {
                sum_field(filtered, numerator_field) / denominator
            }
        }
        // handled by the caller
        CalculationMethod::Custom { .. } => 0.0,
    }
}

/// Non-numeric and missing cells contribute 0.
fn sum_field(records: &[&Record], field: &str) -> f64 {
    records
        .iter()
        .filter_map(|record| record.get(field).and_then(|cell| cell.as_number()))
        .sum()
}
