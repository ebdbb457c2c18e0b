use serde::{Deserialize, Serialize};

use crate::shared::indicators::Trend;

/// Badge colour keyed by trend sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Success,
    Danger,
    Neutral,
}

impl From<Trend> for BadgeTone {
    fn from(trend: Trend) -> Self {
        match trend {
            Trend::Up => BadgeTone::Success,
            Trend::Down => BadgeTone::Danger,
            Trend::Neutral => BadgeTone::Neutral,
        }
    }
}

/// Vertex of a line chart, in plot coordinates (y grows downwards).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

/// Column of a bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
    pub height: f64,
}

/// Arc of a pie/donut chart, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    pub label: String,
    pub value: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

/// What to draw for one KPI. One variant per visualization type; every
/// number is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderInstruction {
    Card {
        display_value: String,
        value: f64,
        trend: Trend,
        arrow: String,
        trend_percent: f64,
    },
    Number {
        display_value: String,
        value: f64,
        /// "of <target>" caption when a target is set
        target_caption: Option<String>,
    },
    Trend {
        display_value: String,
        value: f64,
        previous_display_value: String,
        previous_value: f64,
        trend: Trend,
        trend_percent: f64,
        badge: BadgeTone,
    },
    ProgressBar {
        display_value: String,
        value: f64,
        target: Option<f64>,
        /// 0..=100
        progress: f64,
        /// Bar width in percent of the track
        bar_width_percent: f64,
    },
    Gauge {
        display_value: String,
        value: f64,
        progress: f64,
        /// 0° = left, 180° = right
        angle: f64,
        radius: f64,
        half_circumference: f64,
        arc_length: f64,
    },
    LineChart {
        display_value: String,
        width: f64,
        height: f64,
        points: Vec<ChartPoint>,
    },
    BarChart {
        display_value: String,
        width: f64,
        height: f64,
        bars: Vec<ChartBar>,
    },
    PieChart {
        display_value: String,
        segments: Vec<ArcSegment>,
    },
    DonutChart {
        display_value: String,
        segments: Vec<ArcSegment>,
        inner_radius_ratio: f64,
    },
}

impl RenderInstruction {
    pub fn display_value(&self) -> &str {
        match self {
            RenderInstruction::Card { display_value, .. }
            | RenderInstruction::Number { display_value, .. }
            | RenderInstruction::Trend { display_value, .. }
            | RenderInstruction::ProgressBar { display_value, .. }
            | RenderInstruction::Gauge { display_value, .. }
            | RenderInstruction::LineChart { display_value, .. }
            | RenderInstruction::BarChart { display_value, .. }
            | RenderInstruction::PieChart { display_value, .. }
            | RenderInstruction::DonutChart { display_value, .. } => display_value,
        }
    }
}
