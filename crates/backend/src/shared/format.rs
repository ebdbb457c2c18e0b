use contracts::domain::a001_kpi::aggregate::KpiUnit;

/// Formats a number with comma thousands separators and a fixed number of decimals
///
/// # Examples
/// ```
/// use backend::shared::format::format_thousands;
/// assert_eq!(format_thousands(1234567.0, 0), "1,234,567");
/// assert_eq!(format_thousands(-1234.5, 2), "-1,234.50");
/// assert_eq!(format_thousands(0.0, 0), "0");
/// ```
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    // "-0" and "-0.00" read as zero
    let is_zero = grouped.chars().all(|c| matches!(c, '0' | '.' | ','));
    if value.is_sign_negative() && !is_zero {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Human-readable value for a KPI unit
pub fn format_kpi_value(value: f64, unit: KpiUnit) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }

    match unit {
        KpiUnit::Currency => {
            let amount = format_thousands(value, 2);
            match amount.strip_prefix('-') {
                Some(magnitude) => format!("-${}", magnitude),
                None => format!("${}", amount),
            }
        }
        KpiUnit::Percentage => format!("{}%", format_thousands(value, 1)),
        KpiUnit::Days => with_suffix(value, "day", "days"),
        KpiUnit::Hours => with_suffix(value, "hour", "hours"),
        KpiUnit::Number => {
            if value.fract() == 0.0 {
                format_thousands(value, 0)
            } else {
                format_thousands(value, 2)
            }
        }
    }
}

fn with_suffix(value: f64, singular: &str, plural: &str) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    let number = if rounded.fract() == 0.0 {
        format_thousands(rounded, 0)
    } else {
        format_thousands(rounded, 1)
    };
    let suffix = if rounded == 1.0 { singular } else { plural };
    format!("{} {}", number, suffix)
}
