//! av-core: stable foundation for annealviz.
//!
//! Contains:
//! - ids (run and instance identifiers)
//! - metric (the instrumented metric columns and statistics)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod metric;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use metric::*;
pub use numeric::*;
