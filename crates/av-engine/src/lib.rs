//! Aggregation and linked-view engine for annealing run instrumentation.
//!
//! This crate turns loaded runs into per-iteration envelopes, keeps a view's
//! derived state consistent through a dependency graph, and composes chart
//! specifications for both the interactive view and the static summary.

pub mod aggregate;
pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod graph;
pub mod query;
pub mod session;
pub mod summary;
pub mod view_state;

// Re-export key types for convenience
pub use aggregate::{
    AggregationEngine, Envelope, MetricEnvelope, MetricPreset, MetricSet, MetricStats, aggregate,
};
pub use cache::EnvelopeCache;
pub use chart::{ChartComposer, ChartSpec, ComposeOptions, Layout, Trace};
pub use config::VizConfig;
pub use error::{EngineError, EngineResult};
pub use graph::{Artifact, DependencyGraph};
pub use query::{
    InstanceSummary, RunRange, RunSeries, Series, extract_run_series, run_range,
    summarize_instance,
};
pub use session::{Advisory, Composition, RecomputeStats, Session, SessionOptions};
pub use summary::{PanelChart, compose_summary, export_summary};
pub use view_state::{
    Field, RelayoutEvent, SelectionOrigin, ViewState, ViewportPolicy, ViewportRange,
};
