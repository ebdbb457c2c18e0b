pub mod config;
pub mod data_source;
pub mod error;
pub mod format;
pub mod kpi;
