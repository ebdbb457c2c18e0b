pub mod middleware;
pub mod refresh;
pub mod tracing;
