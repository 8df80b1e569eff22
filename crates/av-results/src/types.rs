//! Run data types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use av_core::{InstanceId, Metric, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table::Row;

/// One row emitted at one iteration of one run.
///
/// Every metric is optional because a column may be missing from a file or a
/// cell may be null (temperature is written as NaN before annealing starts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub run: RunId,
    pub iteration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incumbent_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infeasible_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_seen: Option<u64>,
}

/// Why a row could not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    MissingIteration,
    InvalidIteration,
}

impl InstrumentRecord {
    /// Record with only the iteration set.
    pub fn empty(run: RunId, iteration: u64) -> Self {
        Self {
            run,
            iteration,
            current_cost: None,
            candidate_cost: None,
            incumbent_cost: None,
            best_cost: None,
            evaluations: None,
            infeasible_count: None,
            time: None,
            temperature: None,
            candidate_seen: None,
        }
    }

    /// Builds a record from a table row, tagging it with `run`.
    ///
    /// Cells that are null, non-numeric or non-finite are treated as absent;
    /// count columns additionally require a non-negative integral value.
    pub fn from_row(run: RunId, row: &Row) -> Result<Self, RowError> {
        let iteration = match row.get("iteration") {
            None | Some(Value::Null) => return Err(RowError::MissingIteration),
            Some(value) => as_count(value).ok_or(RowError::InvalidIteration)?,
        };

        let mut record = Self::empty(run, iteration);
        for metric in Metric::ALL {
            let Some(value) = lookup(row, metric) else {
                continue;
            };
            if metric.is_count() {
                record.set_count(metric, as_count(value));
            } else {
                record.set_real(metric, as_real(value));
            }
        }
        Ok(record)
    }

    /// Value of `metric` as a float, if present.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::CandidateCost => self.candidate_cost,
            Metric::CurrentCost => self.current_cost,
            Metric::IncumbentCost => self.incumbent_cost,
            Metric::BestCost => self.best_cost,
            Metric::Evaluations => self.evaluations.map(|v| v as f64),
            Metric::InfeasibleCount => self.infeasible_count.map(|v| v as f64),
            Metric::Time => self.time,
            Metric::Temperature => self.temperature,
            Metric::CandidateSeen => self.candidate_seen.map(|v| v as f64),
        }
    }

    fn set_real(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::CandidateCost => self.candidate_cost = value,
            Metric::CurrentCost => self.current_cost = value,
            Metric::IncumbentCost => self.incumbent_cost = value,
            Metric::BestCost => self.best_cost = value,
            Metric::Time => self.time = value,
            Metric::Temperature => self.temperature = value,
            Metric::Evaluations | Metric::InfeasibleCount | Metric::CandidateSeen => {
                self.set_count(metric, value.and_then(real_to_count))
            }
        }
    }

    fn set_count(&mut self, metric: Metric, value: Option<u64>) {
        match metric {
            Metric::Evaluations => self.evaluations = value,
            Metric::InfeasibleCount => self.infeasible_count = value,
            Metric::CandidateSeen => self.candidate_seen = value,
            _ => self.set_real(metric, value.map(|v| v as f64)),
        }
    }
}

fn lookup<'a>(row: &'a Row, metric: Metric) -> Option<&'a Value> {
    row.get(metric.column()).or_else(|| {
        metric
            .aliases()
            .iter()
            .find_map(|alias| row.get(*alias))
    })
}

fn as_real(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| as_real(value).and_then(real_to_count))
}

fn real_to_count(v: f64) -> Option<u64> {
    (v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
}

/// Ordered records of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDataset {
    pub run: RunId,
    /// File the run was loaded from.
    pub source: String,
    pub records: Vec<InstrumentRecord>,
}

impl RunDataset {
    pub fn new(run: RunId, source: impl Into<String>, records: Vec<InstrumentRecord>) -> Self {
        Self {
            run,
            source: source.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_metric(&self, metric: Metric) -> bool {
        self.records.iter().any(|r| r.metric(metric).is_some())
    }

    pub fn last_iteration(&self) -> Option<u64> {
        self.records.last().map(|r| r.iteration)
    }
}

/// Non-fatal problem found while loading an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    MalformedRunId { file: String },
    UnreadableTable { file: String, message: String },
    MissingIteration { file: String, row: usize },
    DuplicateRun { file: String, run: RunId },
}

impl LoadWarning {
    pub fn file(&self) -> &str {
        match self {
            LoadWarning::MalformedRunId { file }
            | LoadWarning::UnreadableTable { file, .. }
            | LoadWarning::MissingIteration { file, .. }
            | LoadWarning::DuplicateRun { file, .. } => file,
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MalformedRunId { file } => {
                write!(f, "skipped {}: no numeric run token", file)
            }
            LoadWarning::UnreadableTable { file, message } => {
                write!(f, "skipped {}: {}", file, message)
            }
            LoadWarning::MissingIteration { file, row } => {
                write!(f, "skipped {}: row {} has no valid iteration", file, row)
            }
            LoadWarning::DuplicateRun { file, run } => {
                write!(f, "skipped {}: run {} already loaded", file, run)
            }
        }
    }
}

/// All runs of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedInstance {
    pub instance: InstanceId,
    pub runs: BTreeMap<RunId, RunDataset>,
    pub warnings: Vec<LoadWarning>,
}

impl MergedInstance {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            runs: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Builds an instance from runs; a later run with an already seen id is
    /// dropped with a warning.
    pub fn from_runs(instance: InstanceId, runs: impl IntoIterator<Item = RunDataset>) -> Self {
        let mut merged = Self::new(instance);
        for run in runs {
            merged.insert(run);
        }
        merged
    }

    /// Inserts a run unless its id is taken. Returns whether it was inserted.
    pub fn insert(&mut self, run: RunDataset) -> bool {
        if self.runs.contains_key(&run.run) {
            self.warnings.push(LoadWarning::DuplicateRun {
                file: run.source,
                run: run.run,
            });
            return false;
        }
        self.runs.insert(run.run, run);
        true
    }

    pub fn run(&self, run: RunId) -> Option<&RunDataset> {
        self.runs.get(&run)
    }

    pub fn run_ids(&self) -> impl Iterator<Item = RunId> + '_ {
        self.runs.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.runs.values().map(RunDataset::len).sum()
    }

    /// All records, runs in id order.
    pub fn records(&self) -> impl Iterator<Item = &InstrumentRecord> + '_ {
        self.runs.values().flat_map(|run| run.records.iter())
    }

    pub fn has_metric(&self, metric: Metric) -> bool {
        self.runs.values().any(|run| run.has_metric(metric))
    }

    pub fn present_metrics(&self) -> BTreeSet<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.has_metric(*m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn row_with_all_columns() {
        let r = row(json!({
            "iteration": 3,
            "candidate_cost": 120.0,
            "candidate_seen": 7,
            "incumbent_cost": 110,
            "best_cost": 100,
            "evaluations": 42,
            "infeasible_count": 2,
            "time": 0.001,
            "temperature": 55.5
        }));
        let rec = InstrumentRecord::from_row(RunId::new(1), &r).unwrap();
        assert_eq!(rec.iteration, 3);
        assert_eq!(rec.run, RunId::new(1));
        assert_eq!(rec.metric(Metric::CandidateCost), Some(120.0));
        assert_eq!(rec.metric(Metric::IncumbentCost), Some(110.0));
        assert_eq!(rec.evaluations, Some(42));
        assert_eq!(rec.candidate_seen, Some(7));
        assert_eq!(rec.metric(Metric::CurrentCost), None);
    }

    #[test]
    fn null_and_alias_cells() {
        let r = row(json!({
            "iteration": 0.0,
            "temperature": null,
            "infeasible": 4,
            "evaluations": 1.5
        }));
        let rec = InstrumentRecord::from_row(RunId::new(0), &r).unwrap();
        assert_eq!(rec.iteration, 0);
        assert_eq!(rec.temperature, None);
        assert_eq!(rec.infeasible_count, Some(4));
        // Fractional counts are schema mismatches, not truncated.
        assert_eq!(rec.evaluations, None);
    }

    #[test]
    fn iteration_is_required() {
        let r = row(json!({"best_cost": 1.0}));
        assert_eq!(
            InstrumentRecord::from_row(RunId::new(0), &r),
            Err(RowError::MissingIteration)
        );
        let r = row(json!({"iteration": -1}));
        assert_eq!(
            InstrumentRecord::from_row(RunId::new(0), &r),
            Err(RowError::InvalidIteration)
        );
    }

    #[test]
    fn duplicate_runs_keep_first() {
        let a = RunDataset::new(RunId::new(0), "a_0.jsonl", vec![]);
        let b = RunDataset::new(RunId::new(0), "b_0.jsonl", vec![]);
        let merged = MergedInstance::from_runs(InstanceId::from("X"), [a, b]);
        assert_eq!(merged.runs.len(), 1);
        assert_eq!(merged.run(RunId::new(0)).unwrap().source, "a_0.jsonl");
        assert_eq!(merged.warnings.len(), 1);
        assert_eq!(merged.warnings[0].file(), "b_0.jsonl");
    }

    #[test]
    fn present_metrics_reflect_columns() {
        let mut rec = InstrumentRecord::empty(RunId::new(0), 0);
        rec.best_cost = Some(1.0);
        let merged = MergedInstance::from_runs(
            InstanceId::from("X"),
            [RunDataset::new(RunId::new(0), "x_0.jsonl", vec![rec])],
        );
        let present = merged.present_metrics();
        assert!(present.contains(&Metric::BestCost));
        assert!(!present.contains(&Metric::CandidateSeen));
    }
}
