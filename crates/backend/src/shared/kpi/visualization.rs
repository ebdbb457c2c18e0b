use contracts::domain::a001_kpi::aggregate::{Kpi, VisualizationType};
use contracts::shared::indicators::{ComputedResult, SeriesPoint};
use contracts::shared::visualization::{ArcSegment, BadgeTone, ChartBar, ChartPoint, RenderInstruction};
use serde::Deserialize;
use std::f64::consts::PI;

use crate::shared::format::format_kpi_value;

/// Drawing constants for the geometric strategies (`[geometry]` in config.toml)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub plot_height: f64,
    pub gauge_radius: f64,
    /// Minimum bar height so that small bars stay visible
    pub bar_floor: f64,
    pub bar_count: usize,
    pub donut_inner_ratio: f64,
}

impl Default for ChartGeometry {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 120.0,
            plot_height: 100.0,
            gauge_radius: 80.0,
            bar_floor: 4.0,
            bar_count: 6,
            donut_inner_ratio: 0.6,
        }
    }
}

/// Map a computed result onto the KPI's visual encoding.
pub fn render(kpi: &Kpi, result: &ComputedResult, geometry: &ChartGeometry) -> RenderInstruction {
    let value = finite_or_zero(result.value);
    let display_value = format_kpi_value(value, kpi.unit);

    match kpi.visualization {
        VisualizationType::Card => RenderInstruction::Card {
            display_value,
            value,
            trend: result.trend,
            arrow: result.trend.arrow().to_string(),
            trend_percent: finite_or_zero(result.trend_percent),
        },
        VisualizationType::Number => RenderInstruction::Number {
            display_value,
            value,
            target_caption: kpi
                .target
                .map(|target| format!("of {}", format_kpi_value(target, kpi.unit))),
        },
        VisualizationType::Trend => {
            let previous_value = finite_or_zero(result.previous_value);
            RenderInstruction::Trend {
                display_value,
                value,
                previous_display_value: format_kpi_value(previous_value, kpi.unit),
                previous_value,
                trend: result.trend,
                trend_percent: finite_or_zero(result.trend_percent),
                badge: BadgeTone::from(result.trend),
            }
        }
        VisualizationType::ProgressBar => {
            let progress = progress(value, kpi.target);
            RenderInstruction::ProgressBar {
                display_value,
                value,
                target: kpi.target,
                progress,
                bar_width_percent: progress,
            }
        }
        VisualizationType::Gauge => {
            let progress = progress(value, kpi.target);
            let angle = gauge_angle(progress);
            let half_circumference = PI * geometry.gauge_radius;
            RenderInstruction::Gauge {
                display_value,
                value,
                progress,
                angle,
                radius: geometry.gauge_radius,
                half_circumference,
                arc_length: angle / 180.0 * half_circumference,
            }
        }
        VisualizationType::LineChart => RenderInstruction::LineChart {
            display_value,
            width: geometry.width,
            height: geometry.height,
            points: line_points(&result.series, geometry),
        },
        VisualizationType::BarChart => RenderInstruction::BarChart {
            display_value,
            width: geometry.width,
            height: geometry.height,
            bars: bars(&result.series, geometry),
        },
        VisualizationType::PieChart => RenderInstruction::PieChart {
            display_value,
            segments: arc_segments(value, kpi.target),
        },
        VisualizationType::DonutChart => RenderInstruction::DonutChart {
            display_value,
            segments: arc_segments(value, kpi.target),
            inner_radius_ratio: geometry.donut_inner_ratio,
        },
    }
}

/// Share of the target reached, in percent, clamped to 0..=100.
/// Without a positive target the progress is 0.
pub fn progress(value: f64, target: Option<f64>) -> f64 {
    match target {
        Some(target) if target > 0.0 && target.is_finite() && value.is_finite() => {
            (value * 100.0 / target).clamp(0.0, 100.0)
        }
        _ => 0.0,
    }
}

/// Half-circle needle angle: 0° at the left end, 180° at the right end.
pub fn gauge_angle(progress: f64) -> f64 {
    progress.clamp(0.0, 100.0) * 180.0 / 100.0
}

pub fn line_points(series: &[SeriesPoint], geometry: &ChartGeometry) -> Vec<ChartPoint> {
    if series.is_empty() {
        return vec![];
    }

    let values: Vec<f64> = series.iter().map(|p| finite_or_zero(p.value)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let step = if series.len() > 1 {
        geometry.width / (series.len() - 1) as f64
    } else {
        0.0
    };

    series
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (point, value))| {
            let x = if series.len() > 1 {
                i as f64 * step
            } else {
                geometry.width / 2.0
            };
            let y = if span > 0.0 {
                geometry.height - (value - min) / span * geometry.plot_height
            } else {
                geometry.height - geometry.plot_height / 2.0
            };
            ChartPoint {
                label: point.label.clone(),
                value,
                x,
                y,
            }
        })
        .collect()
}

/// The first `bar_count` buckets, scaled against the tallest of them.
pub fn bars(series: &[SeriesPoint], geometry: &ChartGeometry) -> Vec<ChartBar> {
    let shown = &series[..series.len().min(geometry.bar_count)];
    let max = shown
        .iter()
        .map(|p| finite_or_zero(p.value))
        .fold(0.0_f64, f64::max);

    shown
        .iter()
        .map(|point| {
            let value = finite_or_zero(point.value);
            let scaled = if max > 0.0 {
                value / max * geometry.plot_height
            } else {
                0.0
            };
            ChartBar {
                label: point.label.clone(),
                value,
                height: scaled.max(geometry.bar_floor),
            }
        })
        .collect()
}

/// "current" and "remaining" arcs. The sweeps always add up to exactly 360°.
pub fn arc_segments(value: f64, target: Option<f64>) -> Vec<ArcSegment> {
    let current = finite_or_zero(value).max(0.0);
    let target = target.filter(|t| t.is_finite()).unwrap_or(0.0);
    let remaining = (target.max(current * 1.5) - current).max(0.0);
    let total = current + remaining;

    let current_sweep = if total > 0.0 {
        current / total * 360.0
    } else {
        0.0
    };

    vec![
        ArcSegment {
            label: "current".to_string(),
            value: current,
            start_angle: 0.0,
            sweep: current_sweep,
        },
        ArcSegment {
            label: "remaining".to_string(),
            value: remaining,
            start_angle: current_sweep,
            sweep: 360.0 - current_sweep,
        },
    ]
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
