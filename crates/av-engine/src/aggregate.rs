//! Cross-run, per-iteration statistics.
//!
//! Records of all runs are grouped by iteration; for each metric of the
//! selected [`MetricSet`] the min, max, mean and contributing count are computed
//! over exactly the records that carry that metric at that iteration. Runs of
//! different lengths are never padded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use av_core::{InstanceId, Metric, Statistic};
use av_results::MergedInstance;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Metrics an envelope is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut metrics: Vec<Metric> = metrics.into_iter().collect();
        metrics.sort();
        metrics.dedup();
        Self { metrics }
    }

    /// Every tracked metric: costs, counters, time and temperature.
    pub fn tracked() -> Self {
        Self::new([
            Metric::CandidateCost,
            Metric::CurrentCost,
            Metric::IncumbentCost,
            Metric::BestCost,
            Metric::Evaluations,
            Metric::InfeasibleCount,
            Metric::Time,
            Metric::Temperature,
        ])
    }

    /// Cost metrics only, as used for interactive bands.
    pub fn costs() -> Self {
        Self::new(Metric::ALL.into_iter().filter(|m| m.is_cost()))
    }

    /// Metrics of the static multi-panel summary.
    pub fn summary() -> Self {
        Self::new([
            Metric::CurrentCost,
            Metric::BestCost,
            Metric::Evaluations,
            Metric::InfeasibleCount,
            Metric::Time,
            Metric::Temperature,
        ])
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.metrics.binary_search(&metric).is_ok()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::tracked()
    }
}

/// Named metric set configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPreset {
    #[default]
    Tracked,
    Costs,
    Summary,
}

impl MetricPreset {
    pub fn metric_set(self) -> MetricSet {
        match self {
            MetricPreset::Tracked => MetricSet::tracked(),
            MetricPreset::Costs => MetricSet::costs(),
            MetricPreset::Summary => MetricSet::summary(),
        }
    }
}

impl fmt::Display for MetricPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricPreset::Tracked => "tracked",
            MetricPreset::Costs => "costs",
            MetricPreset::Summary => "summary",
        })
    }
}

impl FromStr for MetricPreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracked" => Ok(MetricPreset::Tracked),
            "costs" => Ok(MetricPreset::Costs),
            "summary" => Ok(MetricPreset::Summary),
            other => Err(EngineError::Config(format!(
                "unknown metric set '{}' (expected tracked, costs or summary)",
                other
            ))),
        }
    }
}

/// Statistics of one metric at one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of records that contributed.
    pub count: usize,
}

impl MetricStats {
    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Mean => self.mean,
        }
    }
}

/// Column-oriented statistics of one metric, sorted by iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricEnvelope {
    pub iterations: Vec<u64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
    pub count: Vec<usize>,
}

impl MetricEnvelope {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn column(&self, statistic: Statistic) -> &[f64] {
        match statistic {
            Statistic::Min => &self.min,
            Statistic::Max => &self.max,
            Statistic::Mean => &self.mean,
        }
    }

    /// Iterations as chart x values.
    pub fn x_values(&self) -> Vec<f64> {
        self.iterations.iter().map(|&i| i as f64).collect()
    }

    pub fn at(&self, iteration: u64) -> Option<MetricStats> {
        let idx = self.iterations.binary_search(&iteration).ok()?;
        Some(MetricStats {
            min: self.min[idx],
            max: self.max[idx],
            mean: self.mean[idx],
            count: self.count[idx],
        })
    }

    fn push(&mut self, iteration: u64, stats: MetricStats) {
        self.iterations.push(iteration);
        self.min.push(stats.min);
        self.max.push(stats.max);
        self.mean.push(stats.mean);
        self.count.push(stats.count);
    }
}

/// Per-iteration aggregate of all runs of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    instance: InstanceId,
    metric_set: MetricSet,
    run_count: usize,
    metrics: BTreeMap<Metric, MetricEnvelope>,
    missing: Vec<Metric>,
}

impl Envelope {
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn metric_set(&self) -> &MetricSet {
        &self.metric_set
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricEnvelope> {
        self.metrics.get(&metric)
    }

    /// Metrics that were aggregated, in canonical order.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.metrics.keys().copied()
    }

    /// Requested metrics absent from every record.
    pub fn missing(&self) -> &[Metric] {
        &self.missing
    }

    pub fn at(&self, iteration: u64, metric: Metric) -> Option<MetricStats> {
        self.metrics.get(&metric)?.at(iteration)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(MetricEnvelope::is_empty)
    }
}

#[derive(Clone, Copy)]
struct Accumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    fn push(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn finish(self) -> MetricStats {
        // Rounding in the sum can push the mean a few ulps outside the observed range.
        let mean = (self.sum / self.count as f64).clamp(self.min, self.max);
        MetricStats {
            min: self.min,
            max: self.max,
            mean,
            count: self.count,
        }
    }
}

/// Computes an [`Envelope`] over all runs of `merged`.
///
/// Runs are visited in id order and records in stored order, so repeated
/// calls on the same input are bit-identical.
pub fn aggregate(merged: &MergedInstance, metric_set: &MetricSet) -> Envelope {
    let mut accumulators: BTreeMap<Metric, BTreeMap<u64, Accumulator>> = metric_set
        .metrics()
        .iter()
        .map(|metric| (*metric, BTreeMap::new()))
        .collect();

    for record in merged.records() {
        for (metric, by_iteration) in accumulators.iter_mut() {
            if let Some(value) = record.metric(*metric) {
                by_iteration
                    .entry(record.iteration)
                    .and_modify(|acc| acc.push(value))
                    .or_insert_with(|| Accumulator::new(value));
            }
        }
    }

    let mut metrics = BTreeMap::new();
    let mut missing = Vec::new();
    for (metric, by_iteration) in accumulators {
        if by_iteration.is_empty() {
            missing.push(metric);
            continue;
        }
        let mut envelope = MetricEnvelope::default();
        for (iteration, acc) in by_iteration {
            envelope.push(iteration, acc.finish());
        }
        metrics.insert(metric, envelope);
    }

    debug!(
        instance = %merged.instance,
        runs = merged.runs.len(),
        records = merged.total_records(),
        metrics = metrics.len(),
        missing = missing.len(),
        "envelope aggregated"
    );

    Envelope {
        instance: merged.instance.clone(),
        metric_set: metric_set.clone(),
        run_count: merged.runs.len(),
        metrics,
        missing,
    }
}

/// Aggregation bound to one metric set configuration.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    metric_set: MetricSet,
}

impl AggregationEngine {
    pub fn new(metric_set: MetricSet) -> Self {
        Self { metric_set }
    }

    pub fn metric_set(&self) -> &MetricSet {
        &self.metric_set
    }

    pub fn aggregate(&self, merged: &MergedInstance) -> Envelope {
        aggregate(merged, &self.metric_set)
    }
}
