pub mod indicators;
pub mod kpi_filter;
pub mod visualization;
