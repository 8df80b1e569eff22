//! Static multi-panel summary of all runs of an instance.

use av_core::{InstanceId, Metric, Statistic};
use av_results::{RunSource, RunStore};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{Envelope, MetricSet, aggregate};
use crate::chart::{AxisRef, Trace, TraceStyle, VALUE_HOVER, band_traces};
use crate::error::EngineResult;

/// Seconds to microseconds.
const TIME_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub y_title: String,
    pub traces: Vec<Trace>,
}

/// Vertically stacked panels sharing the iteration axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelChart {
    pub title: String,
    pub x_title: String,
    pub hover_mode: String,
    pub panels: Vec<Panel>,
}

impl PanelChart {
    pub fn trace_count(&self) -> usize {
        self.panels.iter().map(|p| p.traces.len()).sum()
    }
}

struct Layer {
    metric: Metric,
    color: &'static str,
    band_fill: Option<&'static str>,
}

const fn layer(metric: Metric, color: &'static str, band_fill: Option<&'static str>) -> Layer {
    Layer {
        metric,
        color,
        band_fill,
    }
}

struct PanelDef {
    title: &'static str,
    y_title: &'static str,
    scale: f64,
    layers: &'static [Layer],
}

const PANELS: [PanelDef; 4] = [
    PanelDef {
        title: "Current and Best cost",
        y_title: "Cost",
        scale: 1.0,
        layers: &[
            layer(Metric::CurrentCost, "blue", Some("rgba(0,0,255,0.2)")),
            layer(Metric::BestCost, "green", Some("rgba(0,255,0,0.2)")),
        ],
    },
    PanelDef {
        title: "Evaluations and Infeasible counts",
        y_title: "Count",
        scale: 1.0,
        layers: &[
            layer(Metric::Evaluations, "blue", Some("rgba(0,0,255,0.2)")),
            layer(Metric::InfeasibleCount, "red", Some("rgba(255,0,0,0.2)")),
        ],
    },
    PanelDef {
        title: "Time",
        y_title: "Time (μs)",
        scale: TIME_SCALE,
        layers: &[layer(Metric::Time, "purple", Some("rgba(128,0,128,0.2)"))],
    },
    PanelDef {
        title: "Temperature",
        y_title: "Temperature",
        scale: 1.0,
        layers: &[layer(Metric::Temperature, "orange", None)],
    },
];

fn scaled(values: &[f64], scale: f64) -> Vec<f64> {
    values.iter().map(|v| v * scale).collect()
}

/// Builds the four summary panels from an envelope. Metrics the envelope
/// lacks leave their panel without those layers.
pub fn compose_summary(envelope: &Envelope) -> PanelChart {
    let panels = PANELS
        .iter()
        .map(|def| {
            let mut traces = Vec::new();
            for layer in def.layers {
                let Some(stats) = envelope.get(layer.metric).filter(|s| !s.is_empty()) else {
                    continue;
                };
                let x = stats.x_values();
                traces.push(Trace {
                    name: layer.metric.label().to_string(),
                    x: x.clone(),
                    y: scaled(stats.column(Statistic::Mean), def.scale),
                    axis: AxisRef::Primary,
                    legend_group: layer.metric.column().to_string(),
                    show_legend: true,
                    style: TraceStyle::line(layer.color, 1.0),
                    hover_template: VALUE_HOVER.to_string(),
                });
                if let Some(fill) = layer.band_fill {
                    traces.extend(band_traces(
                        layer.metric,
                        x,
                        scaled(stats.column(Statistic::Min), def.scale),
                        scaled(stats.column(Statistic::Max), def.scale),
                        fill.to_string(),
                    ));
                }
            }
            Panel {
                title: def.title.to_string(),
                y_title: def.y_title.to_string(),
                traces,
            }
        })
        .collect();

    PanelChart {
        title: format!("Metrics for {}", envelope.instance()),
        x_title: "Iteration".to_string(),
        hover_mode: "x unified".to_string(),
        panels,
    }
}

/// Loads `instance` and builds its summary with the summary metric set.
///
/// Unlike a session, this fails when the instance has no run files.
pub fn export_summary<S: RunSource>(
    store: &RunStore<S>,
    instance: &InstanceId,
) -> EngineResult<PanelChart> {
    let merged = store.load(instance)?;
    let envelope = aggregate(&merged, &MetricSet::summary());
    let chart = compose_summary(&envelope);
    info!(
        instance = %instance,
        runs = envelope.run_count(),
        traces = chart.trace_count(),
        "summary composed"
    );
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_core::RunId;
    use av_results::{InstrumentRecord, MergedInstance, RunDataset};

    fn merged() -> MergedInstance {
        let runs = (0..2).map(|r| {
            let run = RunId::new(r);
            let records = (0..3)
                .map(|i| {
                    let mut rec = InstrumentRecord::empty(run, i);
                    rec.current_cost = Some(100.0 - i as f64 - r as f64);
                    rec.best_cost = Some(90.0 - i as f64);
                    rec.evaluations = Some(i * 10);
                    rec.time = Some(0.000_002 * (r + 1) as f64);
                    rec.temperature = Some(50.0 / (i + 1) as f64);
                    rec
                })
                .collect();
            RunDataset::new(run, format!("annealing_S_{}.jsonl", r), records)
        });
        MergedInstance::from_runs(InstanceId::from("S"), runs)
    }

    #[test]
    fn four_panels_in_fixed_order() {
        let env = aggregate(&merged(), &MetricSet::summary());
        let chart = compose_summary(&env);
        let titles: Vec<&str> = chart.panels.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Current and Best cost",
                "Evaluations and Infeasible counts",
                "Time",
                "Temperature"
            ]
        );
        assert_eq!(chart.title, "Metrics for S");
    }

    #[test]
    fn cost_panel_has_mean_and_band_per_metric() {
        let env = aggregate(&merged(), &MetricSet::summary());
        let chart = compose_summary(&env);
        let names: Vec<&str> = chart.panels[0]
            .traces
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Current Cost",
                "Current Cost (Min)",
                "Current Cost (Max)",
                "Best Cost",
                "Best Cost (Min)",
                "Best Cost (Max)"
            ]
        );
        // Mean of 100 and 99 at iteration 0.
        assert_eq!(chart.panels[0].traces[0].y[0], 99.5);
    }

    #[test]
    fn time_is_scaled_to_microseconds() {
        let env = aggregate(&merged(), &MetricSet::summary());
        let chart = compose_summary(&env);
        let time = &chart.panels[2].traces;
        assert!((time[0].y[0] - 3.0).abs() < 1e-9);
        assert!((time[1].y[0] - 2.0).abs() < 1e-9);
        assert!((time[2].y[0] - 4.0).abs() < 1e-9);
        assert_eq!(chart.panels[2].y_title, "Time (μs)");
    }

    #[test]
    fn temperature_has_no_band_and_missing_metric_is_skipped() {
        let env = aggregate(&merged(), &MetricSet::summary());
        let chart = compose_summary(&env);
        assert_eq!(chart.panels[3].traces.len(), 1);
        // No infeasible counts recorded: only the evaluations layers remain.
        assert_eq!(chart.panels[1].traces.len(), 3);
        assert_eq!(chart.trace_count(), 6 + 3 + 3 + 1);
    }
}
