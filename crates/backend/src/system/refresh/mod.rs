//! Periodic KPI recomputation.

pub mod worker;

pub use worker::KpiRefreshScheduler;
