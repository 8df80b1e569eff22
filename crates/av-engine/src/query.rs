//! Query helpers for extracting data from loaded instances.

use std::collections::BTreeMap;

use av_core::{InstanceId, Metric, RunId};
use av_results::{MergedInstance, RunDataset};
use serde::Serialize;

/// Number of runs the run selector offers when an instance has none.
const FALLBACK_RUN_COUNT: u32 = 10;

/// X-y points of one metric of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn max_y(&self) -> Option<f64> {
        self.y.iter().copied().reduce(f64::max)
    }
}

/// Extract the iteration series of one metric; iterations where the metric
/// is absent are skipped.
pub fn extract_metric_series(dataset: &RunDataset, metric: Metric) -> Series {
    let mut series = Series::default();
    for record in &dataset.records {
        if let Some(v) = record.metric(metric) {
            series.x.push(record.iteration as f64);
            series.y.push(v);
        }
    }
    series
}

/// All metric series of the selected run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSeries {
    pub instance: InstanceId,
    pub run: RunId,
    pub record_count: usize,
    series: BTreeMap<Metric, Series>,
}

impl RunSeries {
    pub fn get(&self, metric: Metric) -> Option<&Series> {
        self.series.get(&metric)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.series.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// The background cost line: candidate cost, else current cost.
    pub fn primary_cost(&self) -> Option<(Metric, &Series)> {
        [Metric::CandidateCost, Metric::CurrentCost]
            .into_iter()
            .find_map(|m| self.get(m).map(|s| (m, s)))
    }

    /// Largest y value across the given metrics, ignoring absent ones.
    pub fn max_of(&self, metrics: &[Metric]) -> Option<f64> {
        metrics
            .iter()
            .filter_map(|m| self.get(*m).and_then(Series::max_y))
            .reduce(f64::max)
    }
}

/// Extract every present metric of `dataset`.
pub fn extract_run_series(instance: &InstanceId, dataset: &RunDataset) -> RunSeries {
    let series = Metric::ALL
        .into_iter()
        .map(|m| (m, extract_metric_series(dataset, m)))
        .filter(|(_, s)| !s.is_empty())
        .collect();
    RunSeries {
        instance: instance.clone(),
        run: dataset.run,
        record_count: dataset.len(),
        series,
    }
}

/// Bounds and marks for a run-selection control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRange {
    pub min: u32,
    pub max: u32,
    pub marks: BTreeMap<u32, String>,
    /// Runs that actually exist; empty for the fallback range.
    pub available: Vec<RunId>,
}

impl RunRange {
    /// Range offered when no runs are loaded: 0 to 9.
    pub fn fallback() -> Self {
        Self {
            min: 0,
            max: FALLBACK_RUN_COUNT - 1,
            marks: (0..FALLBACK_RUN_COUNT).map(|i| (i, i.to_string())).collect(),
            available: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.available.is_empty()
    }

    pub fn lowest(&self) -> Option<RunId> {
        self.available.first().copied()
    }

    pub fn contains(&self, run: RunId) -> bool {
        self.available.binary_search(&run).is_ok()
    }
}

/// Run range of a loaded instance, or `None` if it holds no runs.
pub fn run_range(merged: &MergedInstance) -> Option<RunRange> {
    let available: Vec<RunId> = merged.run_ids().collect();
    let min = available.first()?.get();
    let max = available.last()?.get();
    Some(RunRange {
        min,
        max,
        marks: available.iter().map(|r| (r.get(), r.to_string())).collect(),
        available,
    })
}

/// Summary of a loaded instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    pub instance: InstanceId,
    pub run_count: usize,
    pub record_count: usize,
    pub longest_run: Option<u64>,
    pub metrics: Vec<Metric>,
}

pub fn summarize_instance(merged: &MergedInstance) -> InstanceSummary {
    InstanceSummary {
        instance: merged.instance.clone(),
        run_count: merged.runs.len(),
        record_count: merged.total_records(),
        longest_run: merged
            .runs
            .values()
            .filter_map(RunDataset::last_iteration)
            .max(),
        metrics: merged.present_metrics().into_iter().collect(),
    }
}
