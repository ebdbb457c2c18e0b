use contracts::shared::indicators::Record;
use contracts::shared::kpi_filter::{FieldValue, FilterOperator, KpiFilter};
use std::cmp::Ordering;

/// Records that satisfy every filter (AND). Order is preserved.
pub fn apply_filters<'a>(records: &'a [Record], filters: &[KpiFilter]) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| matches_all(record, filters))
        .collect()
}

pub fn matches_all(record: &Record, filters: &[KpiFilter]) -> bool {
    filters.iter().all(|filter| matches(record, filter))
}

/// Evaluate one predicate against one record.
///
/// A missing field, a null cell or a cell that cannot be coerced to the
/// comparison value's type never matches, whatever the operator.
pub fn matches(record: &Record, filter: &KpiFilter) -> bool {
    let cell = match record.get(&filter.field) {
        Some(cell) if !cell.is_null() => cell,
        _ => return false,
    };

    let outcome = match filter.operator {
        FilterOperator::Equals => filter
            .value
            .as_scalar()
            .and_then(|expected| compare(cell, expected))
            .map(|ord| ord == Ordering::Equal),
        FilterOperator::NotEquals => filter
            .value
            .as_scalar()
            .and_then(|expected| compare(cell, expected))
            .map(|ord| ord != Ordering::Equal),
        FilterOperator::GreaterThan => filter
            .value
            .as_scalar()
            .and_then(|expected| compare_ordered(cell, expected))
            .map(|ord| ord == Ordering::Greater),
        FilterOperator::LessThan => filter
            .value
            .as_scalar()
            .and_then(|expected| compare_ordered(cell, expected))
            .map(|ord| ord == Ordering::Less),
        FilterOperator::Contains => filter.value.as_scalar().map(|pattern| {
            cell.to_string()
                .to_lowercase()
                .contains(&pattern.to_string().to_lowercase())
        }),
        FilterOperator::Between => filter.value.as_range().and_then(|(from, to)| {
            let lower = compare(cell, from)?;
            let upper = compare(cell, to)?;
            Some(lower != Ordering::Less && upper != Ordering::Greater)
        }),
    };

    match outcome {
        Some(matched) => matched,
        None => {
            tracing::trace!(
                "filter {} excluded record: cell `{}` not comparable",
                filter.display_text(),
                cell
            );
            false
        }
    }
}

/// Compare a record cell with a comparison value, coercing the cell to the
/// comparison value's type. `None` means the types cannot be reconciled.
fn compare(cell: &FieldValue, expected: &FieldValue) -> Option<Ordering> {
    match expected {
        FieldValue::Number(n) => cell.as_number()?.partial_cmp(n),
        FieldValue::Date(d) => Some(cell.as_date()?.cmp(d)),
        FieldValue::Bool(b) => Some(cell.as_bool()?.cmp(b)),
        FieldValue::Text(t) => Some(cell.to_string().as_str().cmp(t.as_str())),
        FieldValue::Null => None,
    }
}

/// Like [`compare`], but only for numeric and date comparison values.
fn compare_ordered(cell: &FieldValue, expected: &FieldValue) -> Option<Ordering> {
    match expected {
        FieldValue::Number(_) | FieldValue::Date(_) => compare(cell, expected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::shared::kpi_filter::FilterValue;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn deals() -> Vec<Record> {
        vec![
            record(&[
                ("stage", "closed-won".into()),
                ("value", 100000.into()),
                ("owner", "Ana Souza".into()),
            ]),
            record(&[
                ("stage", "closed-won".into()),
                ("value", 200000.into()),
                ("owner", "Li Wei".into()),
            ]),
            record(&[
                ("stage", "proposal".into()),
                ("value", 50000.into()),
                ("owner", "ana ribeiro".into()),
            ]),
        ]
    }

    #[test]
    fn test_equals_and_not_equals() {
        let records = deals();
        let won = apply_filters(&records, &[KpiFilter::equals("stage", "closed-won")]);
        assert_eq!(won.len(), 2);

        let open = apply_filters(&records, &[KpiFilter::not_equals("stage", "closed-won")]);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0]["stage"], FieldValue::from("proposal"));
    }

    #[test]
    fn test_filters_are_anded() {
        let records = deals();
        let filters = vec![
            KpiFilter::equals("stage", "closed-won"),
            KpiFilter::greater_than("value", 150000),
        ];
        assert_eq!(apply_filters(&records, &filters).len(), 1);
        assert_eq!(apply_filters(&records, &[]).len(), 3);
    }

    #[test]
    fn test_numeric_coercion() {
        let records = vec![record(&[("value", "250".into())])];
        assert_eq!(apply_filters(&records, &[KpiFilter::equals("value", 250)]).len(), 1);
        assert_eq!(apply_filters(&records, &[KpiFilter::less_than("value", 300)]).len(), 1);
    }

    #[test]
    fn test_ordering_on_non_numeric_fails() {
        let records = deals();
        assert!(apply_filters(&records, &[KpiFilter::greater_than("stage", 10)]).is_empty());
        // text comparison values are not ordered comparisons
        assert!(apply_filters(&records, &[KpiFilter::greater_than("value", "a")]).is_empty());
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let records = deals();
        let anas = apply_filters(&records, &[KpiFilter::contains("owner", "ANA")]);
        assert_eq!(anas.len(), 2);
    }

    #[test]
    fn test_between_inclusive() {
        let records = deals();
        let mid = apply_filters(&records, &[KpiFilter::between("value", 50000, 100000)]);
        assert_eq!(mid.len(), 2);
    }

    #[test]
    fn test_between_dates() {
        let d = |m, day| FieldValue::Date(NaiveDate::from_ymd_opt(2026, m, day).unwrap());
        let records = vec![
            record(&[("closed_on", d(1, 31))]),
            record(&[("closed_on", "2026-02-15".into())]),
            record(&[("closed_on", d(3, 1))]),
        ];
        let feb = apply_filters(
            &records,
            &[KpiFilter::between("closed_on", d(2, 1), d(2, 28))],
        );
        assert_eq!(feb.len(), 1);
    }

    #[test]
    fn test_malformed_between_excludes() {
        let records = deals();
        let filter = KpiFilter::new(
            "value",
            FilterOperator::Between,
            FilterValue::List(vec![FieldValue::Number(0.0)]),
        );
        assert!(apply_filters(&records, &[filter]).is_empty());

        let scalar = KpiFilter::new(
            "value",
            FilterOperator::Between,
            FilterValue::Scalar(FieldValue::Number(0.0)),
        );
        assert!(apply_filters(&records, &[scalar]).is_empty());
    }

    #[test]
    fn test_missing_field_excluded_for_every_operator() {
        let records = vec![record(&[("other", 1.into())]), record(&[("status", FieldValue::Null)])];
        for filter in [
            KpiFilter::equals("status", "active"),
            KpiFilter::not_equals("status", "active"),
            KpiFilter::greater_than("status", 0),
            KpiFilter::less_than("status", 0),
            KpiFilter::contains("status", ""),
            KpiFilter::between("status", 0, 1),
        ] {
            assert!(apply_filters(&records, &[filter]).is_empty());
        }
    }

    #[test]
    fn test_type_mismatch_excludes_on_not_equals() {
        let records = vec![record(&[("value", "n/a".into())])];
        assert!(apply_filters(&records, &[KpiFilter::not_equals("value", 5)]).is_empty());
    }

    #[test]
    fn test_bool_fields() {
        let records = vec![
            record(&[("converted", true.into())]),
            record(&[("converted", "false".into())]),
        ];
        assert_eq!(apply_filters(&records, &[KpiFilter::equals("converted", true)]).len(), 1);
    }
}
