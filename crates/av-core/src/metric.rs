//! Instrumented metric columns.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One per-iteration column emitted by the annealing instrumentation.
///
/// Declaration order is the canonical ordering used for envelopes and band layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CandidateCost,
    CurrentCost,
    IncumbentCost,
    BestCost,
    Evaluations,
    InfeasibleCount,
    Time,
    Temperature,
    CandidateSeen,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::CandidateCost,
        Metric::CurrentCost,
        Metric::IncumbentCost,
        Metric::BestCost,
        Metric::Evaluations,
        Metric::InfeasibleCount,
        Metric::Time,
        Metric::Temperature,
        Metric::CandidateSeen,
    ];

    /// Column name in the instrumentation tables.
    pub const fn column(self) -> &'static str {
        match self {
            Metric::CandidateCost => "candidate_cost",
            Metric::CurrentCost => "current_cost",
            Metric::IncumbentCost => "incumbent_cost",
            Metric::BestCost => "best_cost",
            Metric::Evaluations => "evaluations",
            Metric::InfeasibleCount => "infeasible_count",
            Metric::Time => "time",
            Metric::Temperature => "temperature",
            Metric::CandidateSeen => "candidate_seen",
        }
    }

    /// Alternate column names written by older instrumentation.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Metric::InfeasibleCount => &["infeasible"],
            _ => &[],
        }
    }

    /// Human-readable legend label.
    pub const fn label(self) -> &'static str {
        match self {
            Metric::CandidateCost => "Candidate Cost",
            Metric::CurrentCost => "Current Cost",
            Metric::IncumbentCost => "Incumbent Cost",
            Metric::BestCost => "Best Cost",
            Metric::Evaluations => "Evaluations",
            Metric::InfeasibleCount => "Infeasible Count",
            Metric::Time => "Time",
            Metric::Temperature => "Temperature",
            Metric::CandidateSeen => "Seen",
        }
    }

    pub const fn is_cost(self) -> bool {
        matches!(
            self,
            Metric::CandidateCost | Metric::CurrentCost | Metric::IncumbentCost | Metric::BestCost
        )
    }

    /// Integer-valued counters.
    pub const fn is_count(self) -> bool {
        matches!(
            self,
            Metric::Evaluations | Metric::InfeasibleCount | Metric::CandidateSeen
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == s || m.aliases().contains(&s))
            .ok_or_else(|| CoreError::UnknownMetric {
                name: s.to_string(),
            })
    }
}

/// Summary statistic of a metric at one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Min,
    Max,
    Mean,
}

impl Statistic {
    pub const fn suffix(self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Mean => "mean",
        }
    }
}
