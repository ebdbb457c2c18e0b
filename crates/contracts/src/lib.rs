//! Shared types for the KPI engine: definitions, filters, computed results
//! and render instructions. Everything here is plain serde data so that the
//! backend, the export document and any UI speak the same shapes.

pub mod domain;
pub mod shared;
