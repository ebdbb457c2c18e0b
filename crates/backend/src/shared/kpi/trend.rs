use contracts::shared::indicators::Trend;

/// Direction and magnitude of change against the previous period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendResult {
    pub trend: Trend,
    /// |Δ / previous| × 100, one decimal; 0 when previous is 0
    pub percent: f64,
}

pub fn calculate_trend(current: f64, previous: f64) -> TrendResult {
    if !current.is_finite() || !previous.is_finite() {
        return TrendResult {
            trend: Trend::Neutral,
            percent: 0.0,
        };
    }

    let trend = if current > previous {
        Trend::Up
    } else if current < previous {
        Trend::Down
    } else {
        Trend::Neutral
    };

    let percent = if previous == 0.0 {
        0.0
    } else {
        round_one_decimal(((current - previous) / previous).abs() * 100.0)
    };

    TrendResult { trend, percent }
}

fn round_one_decimal(x: f64) -> f64 {
    let rounded = (x * 10.0).round() / 10.0;
    if rounded.is_finite() {
        rounded
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_twenty_percent() {
        let r = calculate_trend(120.0, 100.0);
        assert_eq!(r.trend, Trend::Up);
        assert_eq!(r.percent, 20.0);
    }

    #[test]
    fn test_down_is_unsigned_magnitude() {
        let r = calculate_trend(75.0, 100.0);
        assert_eq!(r.trend, Trend::Down);
        assert_eq!(r.percent, 25.0);

        // negative baseline still yields a non-negative magnitude
        let r = calculate_trend(-50.0, -100.0);
        assert_eq!(r.trend, Trend::Up);
        assert_eq!(r.percent, 50.0);
    }

    #[test]
    fn test_zero_previous() {
        for current in [0.0, 10.0, -3.0, 1e12] {
            let r = calculate_trend(current, 0.0);
            assert_eq!(r.percent, 0.0);
        }
        assert_eq!(calculate_trend(10.0, 0.0).trend, Trend::Up);
        assert_eq!(calculate_trend(0.0, 0.0).trend, Trend::Neutral);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(calculate_trend(101.0, 3.0).percent, 3266.7);
        assert_eq!(calculate_trend(100.04, 100.0).percent, 0.0);
        assert_eq!(calculate_trend(100.06, 100.0).percent, 0.1);
    }

    #[test]
    fn test_non_finite_inputs() {
        let r = calculate_trend(f64::NAN, 10.0);
        assert_eq!(r.trend, Trend::Neutral);
        assert_eq!(r.percent, 0.0);
    }
}
