//! One user's interactive view.
//!
//! A [`Session`] owns the view inputs, the dependency graph over derived
//! artifacts and a memo slot per artifact. [`Session::compose`] walks the
//! graph in topological order and recomputes an artifact only when the
//! revision of one of its dependencies differs from the one recorded at its
//! last computation. Failures never escape: they become [`Advisory`] values
//! next to an empty or partial chart.

use std::fmt;
use std::sync::Arc;

use av_core::{InstanceId, Metric, RunId};
use av_results::{LoadWarning, MergedInstance, ResultsError, RunSource, RunStore};
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{AggregationEngine, Envelope, MetricSet};
use crate::cache::{DEFAULT_CACHE_CAPACITY, EnvelopeCache};
use crate::chart::{ChartComposer, ChartSpec, ComposeOptions, Layout, Trace};
use crate::graph::{Artifact, DependencyGraph, Slot};
use crate::query::{RunRange, RunSeries, extract_run_series, run_range};
use crate::view_state::{RelayoutEvent, Revision, ViewState, ViewportPolicy, ViewportRange};

/// Counters of work done by a session, split into rebuilds and reuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeStats {
    pub loads: usize,
    pub cache_hits: usize,
    pub aggregations: usize,
    pub series_extractions: usize,
    pub trace_builds: usize,
    pub layout_builds: usize,
    pub compositions: usize,
    /// Artifacts whose memo was still valid when visited.
    pub reuses: usize,
}

impl fmt::Display for RecomputeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loads={} cache_hits={} aggregations={} series={} traces={} layouts={} compositions={} reuses={}",
            self.loads,
            self.cache_hits,
            self.aggregations,
            self.series_extractions,
            self.trace_builds,
            self.layout_builds,
            self.compositions,
            self.reuses
        )
    }
}

/// A non-fatal condition reported alongside a composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
    /// No instance has been selected yet.
    NoInstance,
    NotFound {
        instance: InstanceId,
    },
    /// The source itself failed, e.g. an unreadable directory.
    LoadFailed {
        instance: InstanceId,
        message: String,
    },
    /// A run file was skipped or dropped while loading.
    Skipped(LoadWarning),
    /// Metrics of the aggregation set that no record carries.
    SchemaMismatch {
        instance: InstanceId,
        metrics: Vec<Metric>,
    },
    /// The selected run does not exist or has no records.
    EmptySelection {
        instance: InstanceId,
        run: Option<RunId>,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::NoInstance => f.write_str("no instance selected"),
            Advisory::NotFound { instance } => {
                write!(f, "no run files found for instance {}", instance)
            }
            Advisory::LoadFailed { instance, message } => {
                write!(f, "failed to load instance {}: {}", instance, message)
            }
            Advisory::Skipped(warning) => write!(f, "{}", warning),
            Advisory::SchemaMismatch { instance, metrics } => {
                let names: Vec<&str> = metrics.iter().map(|m| m.column()).collect();
                write!(
                    f,
                    "instance {} has no data for: {}",
                    instance,
                    names.join(", ")
                )
            }
            Advisory::EmptySelection {
                instance,
                run: Some(run),
            } => write!(f, "run {} of instance {} has no records", run, instance),
            Advisory::EmptySelection { instance, run: None } => {
                write!(f, "instance {} has no run to show", instance)
            }
        }
    }
}

/// Result of [`Session::compose`].
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub chart: ChartSpec,
    pub run_range: RunRange,
    pub selected_run: Option<RunId>,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub cache_capacity: usize,
    pub metric_set: MetricSet,
    pub show_bands: bool,
    pub viewport_policy: ViewportPolicy,
    pub compose: ComposeOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            metric_set: MetricSet::default(),
            show_bands: true,
            viewport_policy: ViewportPolicy::default(),
            compose: ComposeOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Memo<T> {
    /// Dependency revisions, in [`DependencyGraph::dependencies`] order.
    stamp: Vec<Revision>,
    changed_at: Revision,
    value: T,
}

#[derive(Debug, Clone, Default)]
struct DatasetOutcome {
    merged: Option<Arc<MergedInstance>>,
    advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Default)]
struct Memos {
    dataset: Option<Memo<DatasetOutcome>>,
    run_range: Option<Memo<Option<RunRange>>>,
    envelope: Option<Memo<Option<Arc<Envelope>>>>,
    run_series: Option<Memo<Option<Arc<RunSeries>>>>,
    traces: Option<Memo<Arc<Vec<Trace>>>>,
    layout: Option<Memo<Arc<Layout>>>,
    chart: Option<Memo<ChartSpec>>,
}

fn header<T>(memo: &Option<Memo<T>>) -> Option<(&[Revision], Revision)> {
    memo.as_ref().map(|m| (m.stamp.as_slice(), m.changed_at))
}

fn value<T: Clone + Default>(memo: &Option<Memo<T>>) -> T {
    memo.as_ref().map(|m| m.value.clone()).unwrap_or_default()
}

impl Memos {
    fn header(&self, artifact: Artifact) -> Option<(&[Revision], Revision)> {
        match artifact {
            Artifact::Dataset => header(&self.dataset),
            Artifact::RunRange => header(&self.run_range),
            Artifact::Envelope => header(&self.envelope),
            Artifact::RunSeries => header(&self.run_series),
            Artifact::Traces => header(&self.traces),
            Artifact::Layout => header(&self.layout),
            Artifact::Chart => header(&self.chart),
        }
    }
}

/// Interactive view over the runs of one store.
pub struct Session<S> {
    store: RunStore<S>,
    cache: EnvelopeCache,
    engine: AggregationEngine,
    composer: ChartComposer,
    viewport_policy: ViewportPolicy,
    graph: DependencyGraph,
    state: ViewState,
    memos: Memos,
    stats: RecomputeStats,
}

impl<S: RunSource> Session<S> {
    pub fn new(store: RunStore<S>, options: SessionOptions) -> Self {
        Self {
            store,
            cache: EnvelopeCache::new(options.cache_capacity),
            engine: AggregationEngine::new(options.metric_set),
            composer: ChartComposer::new(options.compose),
            viewport_policy: options.viewport_policy,
            graph: DependencyGraph::standard(),
            state: ViewState::new(options.show_bands),
            memos: Memos::default(),
            stats: RecomputeStats::default(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn stats(&self) -> RecomputeStats {
        self.stats
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cache(&self) -> &EnvelopeCache {
        &self.cache
    }

    pub fn store(&self) -> &RunStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RunStore<S> {
        &mut self.store
    }

    /// Selects an instance. Returns whether the selection changed.
    pub fn set_instance(&mut self, instance: impl Into<InstanceId>) -> bool {
        let changed = self.state.set_instance(instance.into());
        if changed && self.viewport_policy == ViewportPolicy::ResetOnInstanceChange {
            self.state.set_viewport(None);
        }
        changed
    }

    /// Picks a run. The pick survives refreshes until the instance changes.
    /// Returns whether the selected run changed.
    pub fn select_run(&mut self, run: RunId) -> bool {
        self.state.choose_run(run)
    }

    pub fn set_show_bands(&mut self, show: bool) -> bool {
        self.state.set_show_bands(show)
    }

    pub fn set_viewport(&mut self, viewport: Option<ViewportRange>) -> bool {
        self.state.set_viewport(viewport)
    }

    /// Merges a pan/zoom event into the stored viewport.
    pub fn relayout(&mut self, event: &RelayoutEvent) -> bool {
        let next = event.apply_to(self.state.viewport().copied());
        self.state.set_viewport(next)
    }

    /// Drops the current instance from the cache so the next composition
    /// reloads it from the source.
    pub fn refresh(&mut self) {
        if let Some(instance) = self.state.instance() {
            self.cache.evict(instance);
            debug!(instance = %instance, "refresh requested");
        }
        self.memos.dataset = None;
    }

    /// Brings every artifact up to date and returns the chart.
    pub fn compose(&mut self) -> Composition {
        self.resolve();

        let dataset = value(&self.memos.dataset);
        let mut advisories = dataset.advisories;

        if let Some(merged) = &dataset.merged {
            if let Some(envelope) = value(&self.memos.envelope)
                && !envelope.missing().is_empty()
            {
                advisories.push(Advisory::SchemaMismatch {
                    instance: merged.instance.clone(),
                    metrics: envelope.missing().to_vec(),
                });
            }
            let series = value(&self.memos.run_series);
            if series.is_none_or(|s| s.is_empty()) {
                advisories.push(Advisory::EmptySelection {
                    instance: merged.instance.clone(),
                    run: self.state.selected_run(),
                });
            }
        }

        Composition {
            chart: value(&self.memos.chart),
            run_range: value(&self.memos.run_range).unwrap_or_else(RunRange::fallback),
            selected_run: self.state.selected_run(),
            advisories,
        }
    }

    /// Envelope of the current instance, computing it if needed.
    pub fn envelope(&mut self) -> Option<Arc<Envelope>> {
        self.resolve();
        value(&self.memos.envelope)
    }

    /// Loaded runs of the current instance, loading them if needed.
    pub fn dataset(&mut self) -> Option<Arc<MergedInstance>> {
        self.resolve();
        value(&self.memos.dataset).merged
    }

    fn revision_of(&self, slot: Slot) -> Revision {
        match slot {
            Slot::Input(field) => self.state.revision(field),
            Slot::Derived(artifact) => self
                .memos
                .header(artifact)
                .map_or(0, |(_, changed_at)| changed_at),
        }
    }

    fn stamp(&self, artifact: Artifact) -> Vec<Revision> {
        self.graph
            .dependencies(artifact)
            .iter()
            .map(|slot| self.revision_of(*slot))
            .collect()
    }

    fn resolve(&mut self) {
        for index in 0..self.graph.order().len() {
            let artifact = self.graph.order()[index];
            let stamp = self.stamp(artifact);
            if self
                .memos
                .header(artifact)
                .is_some_and(|(recorded, _)| recorded == stamp.as_slice())
            {
                self.stats.reuses += 1;
                continue;
            }
            debug!(?artifact, "recomputing");
            let now = self.state.tick();
            self.recompute(artifact, stamp, now);
        }
    }

    fn recompute(&mut self, artifact: Artifact, stamp: Vec<Revision>, now: Revision) {
        match artifact {
            Artifact::Dataset => {
                let value = self.load_dataset();
                self.memos.dataset = Some(Memo {
                    stamp,
                    changed_at: now,
                    value,
                });
            }
            Artifact::RunRange => {
                let value = value(&self.memos.dataset)
                    .merged
                    .and_then(|merged| run_range(&merged));
                self.state
                    .derive_run(value.as_ref().and_then(RunRange::lowest));
                self.memos.run_range = Some(Memo {
                    stamp,
                    changed_at: now,
                    value,
                });
            }
            Artifact::Envelope => {
                let value = value(&self.memos.dataset)
                    .merged
                    .map(|merged| self.envelope_for(&merged));
                self.memos.envelope = Some(Memo {
                    stamp,
                    changed_at: now,
                    value,
                });
            }
            Artifact::RunSeries => {
                let merged = value(&self.memos.dataset).merged;
                let value = match (merged, self.state.selected_run()) {
                    (Some(merged), Some(run)) => merged.run(run).map(|dataset| {
                        self.stats.series_extractions += 1;
                        Arc::new(extract_run_series(&merged.instance, dataset))
                    }),
                    _ => None,
                };
                self.memos.run_series = Some(Memo {
                    stamp,
                    changed_at: now,
                    value,
                });
            }
            Artifact::Traces => {
                let series = value(&self.memos.run_series);
                let envelope = value(&self.memos.envelope);
                let traces = self.composer.compose_traces(
                    series.as_deref(),
                    envelope.as_deref(),
                    self.state.show_bands(),
                );
                self.stats.trace_builds += 1;
                self.memos.traces = Some(Memo {
                    stamp,
                    changed_at: now,
                    value: Arc::new(traces),
                });
            }
            Artifact::Layout => {
                let series = value(&self.memos.run_series);
                let layout = self
                    .composer
                    .compose_layout(series.as_deref(), self.state.viewport());
                self.stats.layout_builds += 1;
                self.memos.layout = Some(Memo {
                    stamp,
                    changed_at: now,
                    value: Arc::new(layout),
                });
            }
            Artifact::Chart => {
                let traces = value(&self.memos.traces);
                let chart = if traces.is_empty() {
                    ChartSpec::empty()
                } else {
                    ChartSpec::new(traces, value(&self.memos.layout))
                };
                self.stats.compositions += 1;
                self.memos.chart = Some(Memo {
                    stamp,
                    changed_at: now,
                    value: chart,
                });
            }
        }
    }

    fn load_dataset(&mut self) -> DatasetOutcome {
        let Some(instance) = self.state.instance().cloned() else {
            return DatasetOutcome {
                merged: None,
                advisories: vec![Advisory::NoInstance],
            };
        };

        let merged = match self.cache.dataset(&instance) {
            Some(merged) => {
                debug!(instance = %instance, "dataset cache hit");
                self.stats.cache_hits += 1;
                merged
            }
            None => {
                self.stats.loads += 1;
                match self.store.load(&instance) {
                    Ok(merged) => {
                        let merged = Arc::new(merged);
                        self.cache.insert_dataset(Arc::clone(&merged));
                        merged
                    }
                    Err(ResultsError::NotFound { instance }) => {
                        warn!(instance = %instance, "no run files found");
                        return DatasetOutcome {
                            merged: None,
                            advisories: vec![Advisory::NotFound { instance }],
                        };
                    }
                    Err(err) => {
                        warn!(instance = %instance, error = %err, "instance load failed");
                        return DatasetOutcome {
                            merged: None,
                            advisories: vec![Advisory::LoadFailed {
                                instance,
                                message: err.to_string(),
                            }],
                        };
                    }
                }
            }
        };

        let advisories = merged
            .warnings
            .iter()
            .cloned()
            .map(Advisory::Skipped)
            .collect();
        DatasetOutcome {
            merged: Some(merged),
            advisories,
        }
    }

    fn envelope_for(&mut self, merged: &MergedInstance) -> Arc<Envelope> {
        let metric_set = self.engine.metric_set();
        if let Some(envelope) = self.cache.envelope(&merged.instance, metric_set) {
            debug!(instance = %merged.instance, "envelope cache hit");
            return envelope;
        }
        let envelope = Arc::new(self.engine.aggregate(merged));
        self.stats.aggregations += 1;
        self.cache.insert_envelope(Arc::clone(&envelope));
        envelope
    }

    /// Artifacts the next composition would recompute.
    pub fn stale(&self) -> Vec<Artifact> {
        self.graph
            .order()
            .iter()
            .copied()
            .filter(|a| {
                self.memos
                    .header(*a)
                    .is_none_or(|(recorded, _)| recorded != self.stamp(*a).as_slice())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_state::Field;
    use av_results::{MemorySource, Row, Table};
    use serde_json::json;

    fn rows(costs: &[f64]) -> Table {
        costs
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let value = json!({
                    "iteration": i,
                    "candidate_cost": c,
                    "incumbent_cost": c,
                    "best_cost": c,
                });
                match value {
                    serde_json::Value::Object(map) => map,
                    _ => Row::new(),
                }
            })
            .collect()
    }

    fn session() -> Session<MemorySource> {
        let source = MemorySource::new("annealing")
            .with_file("annealing_X_0.jsonl", rows(&[100.0, 90.0]))
            .with_file("annealing_X_1.jsonl", rows(&[80.0, 80.0]))
            .with_file("annealing_Z_3.jsonl", rows(&[7.0]));
        Session::new(RunStore::new(source), SessionOptions::default())
    }

    #[test]
    fn first_composition_selects_lowest_run() {
        let mut s = session();
        s.set_instance("X");
        let out = s.compose();
        assert_eq!(out.selected_run, Some(RunId::new(0)));
        assert_eq!(out.run_range.available.len(), 2);
        assert_eq!(
            out.chart.layout.title.as_deref(),
            Some("Metrics for X, run 0")
        );
    }

    #[test]
    fn settled_session_reuses_everything() {
        let mut s = session();
        s.set_instance("X");
        s.compose();
        assert!(s.stale().is_empty());
        let before = s.stats();
        s.compose();
        let after = s.stats();
        assert_eq!(after.reuses - before.reuses, Artifact::ALL.len());
        assert_eq!(after.compositions, before.compositions);
    }

    #[test]
    fn band_toggle_marks_traces_stale() {
        let mut s = session();
        s.set_instance("X");
        s.compose();
        s.set_show_bands(false);
        assert_eq!(s.stale(), vec![Artifact::Traces, Artifact::Chart]);
    }

    #[test]
    fn no_instance_is_advised() {
        let mut s = session();
        let out = s.compose();
        assert!(out.chart.is_empty());
        assert!(out.run_range.is_fallback());
        assert_eq!(out.advisories, vec![Advisory::NoInstance]);
        assert_eq!(s.state().revision(Field::Instance), 0);
    }

    #[test]
    fn switching_instance_resets_selection_and_viewport() {
        let mut s = session();
        s.set_instance("X");
        s.select_run(RunId::new(1));
        s.set_viewport(Some(ViewportRange::new(0.0, 1.0, 0.0, 1.0).unwrap()));
        s.compose();
        assert_eq!(s.state().selected_run(), Some(RunId::new(1)));

        s.set_instance("Z");
        let out = s.compose();
        assert_eq!(out.selected_run, Some(RunId::new(3)));
        assert!(s.state().viewport().is_none());
        assert_eq!(out.chart.layout.x_axis.range, None);
    }

    #[test]
    fn preserve_policy_keeps_viewport() {
        let options = SessionOptions {
            viewport_policy: ViewportPolicy::Preserve,
            ..SessionOptions::default()
        };
        let mut s = Session::new(session().store.clone(), options);
        s.set_instance("X");
        s.set_viewport(Some(ViewportRange::new(0.0, 1.0, 0.0, 1.0).unwrap()));
        s.set_instance("Z");
        let out = s.compose();
        assert_eq!(out.chart.layout.x_axis.range, Some([0.0, 1.0]));
    }

    #[test]
    fn advisory_messages() {
        let adv = Advisory::SchemaMismatch {
            instance: InstanceId::from("X"),
            metrics: vec![Metric::Temperature, Metric::CandidateSeen],
        };
        assert_eq!(
            adv.to_string(),
            "instance X has no data for: temperature, candidate_seen"
        );
        let adv = Advisory::EmptySelection {
            instance: InstanceId::from("X"),
            run: Some(RunId::new(4)),
        };
        assert_eq!(adv.to_string(), "run 4 of instance X has no records");
    }
}
