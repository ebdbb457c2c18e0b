//! Pure computation pipeline:
//! filter -> aggregate -> trend + series -> visualization.

pub mod aggregate;
pub mod filter;
pub mod registry;
pub mod series;
pub mod trend;
pub mod visualization;
