pub mod a001_kpi;
pub mod common;
