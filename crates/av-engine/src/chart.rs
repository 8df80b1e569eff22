//! Chart composition.
//!
//! A [`ChartSpec`] is an inert, serializable description of a multi-trace,
//! dual-axis chart. Traces and layout are composed separately so that a
//! viewport change can reuse the trace list untouched.

use std::sync::Arc;

use av_core::{Metric, RunId};
use serde::Serialize;

use crate::aggregate::Envelope;
use crate::query::{RunSeries, Series};
use crate::view_state::ViewportRange;

/// Line colours, indexed by role.
pub const PALETTE: [&str; 5] = [
    "rgba(242, 128, 137, 1)",
    "rgba(101, 182, 191, 1)",
    "rgba(21, 63, 43, 1)",
    "rgba(155, 191, 101, 1)",
    "rgba(242, 173, 113, 1)",
];

const BAND_FILL_ALPHA: f64 = 0.5;
pub(crate) const VALUE_HOVER: &str = "%{y:,.0f}<extra></extra>";

/// Which y axis a trace is drawn against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisRef {
    #[serde(rename = "y")]
    Primary,
    #[serde(rename = "y2")]
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    #[default]
    None,
    /// Fill down to the previous trace.
    #[serde(rename = "tonexty")]
    ToNextY,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStyle {
    pub color: Option<String>,
    pub opacity: f64,
    /// `Some(0.0)` hides the line itself.
    pub line_width: Option<f64>,
    pub fill: Fill,
    pub fill_color: Option<String>,
}

impl TraceStyle {
    pub(crate) fn line(color: &str, opacity: f64) -> Self {
        Self {
            color: Some(color.to_string()),
            opacity,
            line_width: None,
            fill: Fill::None,
            fill_color: None,
        }
    }

    fn invisible() -> Self {
        Self {
            color: None,
            opacity: 1.0,
            line_width: Some(0.0),
            fill: Fill::None,
            fill_color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub axis: AxisRef,
    pub legend_group: String,
    pub show_legend: bool,
    pub style: TraceStyle,
    pub hover_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Axis {
    pub title: Option<String>,
    /// Explicit range; `None` auto-fits to the trace data.
    pub range: Option<[f64; 2]>,
    pub show_grid: bool,
    pub side: Side,
    pub overlaying: Option<AxisRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Option<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub y_axis2: Option<Axis>,
    pub hover_mode: String,
    pub legend_orientation: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            title: None,
            x_axis: Axis {
                title: Some("Iteration".to_string()),
                show_grid: true,
                ..Default::default()
            },
            y_axis: Axis {
                title: Some("Cost".to_string()),
                show_grid: true,
                ..Default::default()
            },
            y_axis2: None,
            hover_mode: "x unified".to_string(),
            legend_orientation: "h".to_string(),
        }
    }
}

/// A fully composed chart. Never mutated; each composition yields a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub traces: Arc<Vec<Trace>>,
    pub layout: Arc<Layout>,
}

impl ChartSpec {
    pub fn new(traces: Arc<Vec<Trace>>, layout: Arc<Layout>) -> Self {
        Self { traces, layout }
    }

    /// Chart with no traces.
    pub fn empty() -> Self {
        Self::new(Arc::new(Vec::new()), Arc::new(Layout::default()))
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn trace(&self, name: &str) -> Option<&Trace> {
        self.traces.iter().find(|t| t.name == name)
    }

    /// Traces that belong to envelope bands.
    pub fn band_traces(&self) -> impl Iterator<Item = &Trace> + '_ {
        self.traces
            .iter()
            .filter(|t| t.name.ends_with("(Min)") || t.name.ends_with("(Max)"))
    }
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parameters of the interactive chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    /// Cost metrics a band is drawn for when the envelope has them.
    pub band_metrics: Vec<Metric>,
    /// Lower bound of the right axis' upper limit, so short runs do not collapse it.
    pub secondary_axis_floor: f64,
    pub primary_opacity: f64,
    pub secondary_opacity: f64,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            band_metrics: vec![
                Metric::CandidateCost,
                Metric::CurrentCost,
                Metric::IncumbentCost,
                Metric::BestCost,
            ],
            secondary_axis_floor: 300.0,
            primary_opacity: 0.2,
            secondary_opacity: 0.3,
        }
    }
}

/// Metrics drawn against the right axis, in layer order.
const SECONDARY_METRICS: [Metric; 2] = [Metric::CandidateSeen, Metric::Evaluations];

fn metric_color(metric: Metric) -> &'static str {
    match metric {
        Metric::IncumbentCost => PALETTE[0],
        Metric::CandidateSeen => PALETTE[1],
        Metric::BestCost | Metric::Evaluations => PALETTE[2],
        Metric::CandidateCost | Metric::CurrentCost => PALETTE[3],
        _ => PALETTE[4],
    }
}

/// Replaces the alpha channel of an `rgba(...)` colour.
fn with_alpha(color: &str, alpha: f64) -> String {
    match color.rsplit_once(',') {
        Some((head, _)) if color.starts_with("rgba(") => format!("{}, {})", head, alpha),
        _ => color.to_string(),
    }
}

fn series_trace(metric: Metric, series: &Series, axis: AxisRef, opacity: f64) -> Trace {
    Trace {
        name: metric.label().to_string(),
        x: series.x.clone(),
        y: series.y.clone(),
        axis,
        legend_group: metric.column().to_string(),
        show_legend: true,
        style: TraceStyle::line(metric_color(metric), opacity),
        hover_template: VALUE_HOVER.to_string(),
    }
}

/// Lower and upper trace of a filled min/max band.
pub(crate) fn band_traces(
    metric: Metric,
    x: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    fill_color: String,
) -> [Trace; 2] {
    let lower = Trace {
        name: format!("{} (Min)", metric.label()),
        x: x.clone(),
        y: lower,
        axis: AxisRef::Primary,
        legend_group: metric.column().to_string(),
        show_legend: false,
        style: TraceStyle::invisible(),
        hover_template: VALUE_HOVER.to_string(),
    };
    let upper = Trace {
        name: format!("{} (Max)", metric.label()),
        x,
        y: upper,
        axis: AxisRef::Primary,
        legend_group: metric.column().to_string(),
        show_legend: false,
        style: TraceStyle {
            fill: Fill::ToNextY,
            fill_color: Some(fill_color),
            ..TraceStyle::invisible()
        },
        hover_template: VALUE_HOVER.to_string(),
    };
    [lower, upper]
}

/// Builds interactive chart specifications.
#[derive(Debug, Clone, Default)]
pub struct ChartComposer {
    options: ComposeOptions,
}

impl ChartComposer {
    pub fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Full composition of one run against the envelope of all runs.
    pub fn compose(
        &self,
        series: Option<&RunSeries>,
        envelope: Option<&Envelope>,
        show_bands: bool,
        viewport: Option<&ViewportRange>,
    ) -> ChartSpec {
        let traces = self.compose_traces(series, envelope, show_bands);
        if traces.is_empty() {
            return ChartSpec::empty();
        }
        ChartSpec::new(
            Arc::new(traces),
            Arc::new(self.compose_layout(series, viewport)),
        )
    }

    /// Trace layers, bottom to top. Empty when the run has no records.
    pub fn compose_traces(
        &self,
        series: Option<&RunSeries>,
        envelope: Option<&Envelope>,
        show_bands: bool,
    ) -> Vec<Trace> {
        let Some(series) = series.filter(|s| !s.is_empty()) else {
            return Vec::new();
        };
        let mut traces = Vec::new();

        if let Some((metric, primary)) = series.primary_cost() {
            traces.push(series_trace(
                metric,
                primary,
                AxisRef::Primary,
                self.options.primary_opacity,
            ));
        }

        if show_bands && let Some(envelope) = envelope {
            for &metric in &self.options.band_metrics {
                let Some(stats) = envelope.get(metric).filter(|e| !e.is_empty()) else {
                    continue;
                };
                traces.extend(band_traces(
                    metric,
                    stats.x_values(),
                    stats.min.clone(),
                    stats.max.clone(),
                    with_alpha(metric_color(metric), BAND_FILL_ALPHA),
                ));
            }
        }

        for metric in [Metric::IncumbentCost, Metric::BestCost] {
            if let Some(s) = series.get(metric) {
                traces.push(series_trace(metric, s, AxisRef::Primary, 1.0));
            }
        }

        for metric in SECONDARY_METRICS {
            if let Some(s) = series.get(metric) {
                traces.push(series_trace(
                    metric,
                    s,
                    AxisRef::Secondary,
                    self.options.secondary_opacity,
                ));
            }
        }

        traces
    }

    /// Axes and titles. The viewport, when set, overrides auto-fit on the
    /// x axis and the left y axis.
    pub fn compose_layout(
        &self,
        series: Option<&RunSeries>,
        viewport: Option<&ViewportRange>,
    ) -> Layout {
        let Some(series) = series.filter(|s| !s.is_empty()) else {
            return Layout::default();
        };
        let mut layout = Layout {
            title: Some(chart_title(series.instance.as_str(), series.run)),
            ..Layout::default()
        };

        // The right axis is always present, floored even without counters.
        let top = series
            .max_of(&SECONDARY_METRICS)
            .unwrap_or(0.0)
            .max(self.options.secondary_axis_floor);
        layout.y_axis2 = Some(Axis {
            title: None,
            range: Some([0.0, top]),
            show_grid: false,
            side: Side::Right,
            overlaying: Some(AxisRef::Primary),
        });

        if let Some(viewport) = viewport {
            layout.x_axis.range = viewport.x.map(|r| r.as_array());
            layout.y_axis.range = viewport.y.map(|r| r.as_array());
        }
        layout
    }
}

pub fn chart_title(instance: &str, run: RunId) -> String {
    format!("Metrics for {}, run {}", instance, run)
}
