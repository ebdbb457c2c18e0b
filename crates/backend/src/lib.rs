//! KPI engine backend: filter evaluation, aggregation, trend and series
//! computation, visualization mapping, the definition store, data-source
//! adapters, the refresh scheduler and the HTTP surface.

pub mod api;
pub mod domain;
pub mod routes;
pub mod shared;
pub mod system;
