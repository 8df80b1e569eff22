use av_core::{AxisRange, InstanceId, Metric, RunId};
use av_engine::{
    Advisory, Artifact, RelayoutEvent, SelectionOrigin, Session, SessionOptions, ViewportRange,
};
use av_results::{LoadWarning, MemorySource, Row, RunStore, Table};
use serde_json::{Value, json};

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object row, got {}", other),
    }
}

/// Rows with the three tracked cost columns set to `costs`.
fn cost_rows(costs: &[f64]) -> Table {
    costs
        .iter()
        .enumerate()
        .map(|(i, c)| {
            row(json!({
                "iteration": i,
                "candidate_cost": c,
                "incumbent_cost": c,
                "best_cost": c,
                "evaluations": 10 * (i + 1),
                "candidate_seen": i,
            }))
        })
        .collect()
}

fn source() -> MemorySource {
    MemorySource::new("annealing")
        .with_file("annealing_X_0.jsonl", cost_rows(&[100.0, 90.0]))
        .with_file("annealing_X_1.jsonl", cost_rows(&[80.0, 80.0]))
        .with_file("annealing_W_0.jsonl", cost_rows(&[5.0, 4.0, 3.0]))
}

fn session() -> Session<MemorySource> {
    Session::new(RunStore::new(source()), SessionOptions::default())
}

fn band_snapshot(session: &mut Session<MemorySource>) -> Vec<(String, Vec<f64>)> {
    session
        .compose()
        .chart
        .band_traces()
        .map(|t| (t.name.clone(), t.y.clone()))
        .collect()
}

#[test]
fn two_run_envelope_through_session() {
    let mut s = session();
    s.set_instance("X");
    let envelope = s.envelope().expect("envelope for X");

    let at0 = envelope.at(0, Metric::CandidateCost).expect("iteration 0");
    assert_eq!((at0.min, at0.max, at0.mean), (80.0, 100.0, 90.0));
    let at1 = envelope.at(1, Metric::CandidateCost).expect("iteration 1");
    assert_eq!((at1.min, at1.max, at1.mean), (80.0, 90.0, 85.0));
}

#[test]
fn run_switch_reuses_envelope() {
    let mut s = session();
    s.set_instance("X");
    let before = band_snapshot(&mut s);
    assert_eq!(s.compose().selected_run, Some(RunId::new(0)));

    assert!(s.select_run(RunId::new(1)));
    let out = s.compose();
    let after: Vec<(String, Vec<f64>)> = out
        .chart
        .band_traces()
        .map(|t| (t.name.clone(), t.y.clone()))
        .collect();

    assert_eq!(s.stats().aggregations, 1);
    assert_eq!(s.stats().loads, 1);
    assert!(!before.is_empty());
    assert_eq!(before, after);
    assert_eq!(
        out.chart.layout.title.as_deref(),
        Some("Metrics for X, run 1")
    );
}

#[test]
fn unknown_instance_yields_empty_chart() {
    let mut s = session();
    s.set_instance("Y");
    let out = s.compose();

    assert!(out.chart.is_empty());
    assert_eq!(out.chart.traces.len(), 0);
    assert!(out.run_range.is_fallback());
    assert_eq!((out.run_range.min, out.run_range.max), (0, 9));
    assert_eq!(
        out.advisories,
        vec![Advisory::NotFound {
            instance: InstanceId::from("Y")
        }]
    );
    assert_eq!(s.stats().aggregations, 0);
}

#[test]
fn viewport_survives_band_toggle() {
    let mut s = session();
    s.set_instance("X");
    s.compose();
    s.set_viewport(Some(
        ViewportRange::new(10.0, 50.0, 0.0, 1000.0).expect("valid viewport"),
    ));
    let zoomed = s.compose();
    assert_eq!(zoomed.chart.layout.x_axis.range, Some([10.0, 50.0]));

    s.set_show_bands(false);
    let out = s.compose();
    assert_eq!(out.chart.layout.x_axis.range, Some([10.0, 50.0]));
    assert_eq!(out.chart.layout.y_axis.range, Some([0.0, 1000.0]));
    assert_eq!(out.chart.band_traces().count(), 0);
    // The layout is shared, not rebuilt.
    assert!(std::sync::Arc::ptr_eq(
        &zoomed.chart.layout,
        &out.chart.layout
    ));
}

#[test]
fn band_and_viewport_changes_never_reaggregate() {
    let mut s = session();
    s.set_instance("X");
    s.compose();
    let base = s.stats();

    s.set_show_bands(false);
    s.compose();
    s.set_show_bands(true);
    s.compose();
    s.relayout(&RelayoutEvent {
        x: Some(AxisRange::new(0.0, 1.0, "x").expect("range")),
        ..RelayoutEvent::default()
    });
    let zoomed = s.compose();
    s.relayout(&RelayoutEvent {
        autorange: true,
        ..RelayoutEvent::default()
    });
    let reset = s.compose();

    let stats = s.stats();
    assert_eq!(stats.aggregations, base.aggregations);
    assert_eq!(stats.loads, base.loads);
    assert_eq!(stats.series_extractions, base.series_extractions);
    assert_eq!(stats.trace_builds, base.trace_builds + 2);
    assert_eq!(stats.layout_builds, base.layout_builds + 2);
    assert!(std::sync::Arc::ptr_eq(&zoomed.chart.traces, &reset.chart.traces));
    assert_eq!(reset.chart.layout.x_axis.range, None);
}

#[test]
fn instance_change_aggregates_exactly_once() {
    let mut s = session();
    s.set_instance("X");
    s.compose();
    assert_eq!(s.stats().aggregations, 1);

    s.set_instance("W");
    s.compose();
    s.compose();
    assert_eq!(s.stats().aggregations, 2);
    assert_eq!(s.stats().loads, 2);

    // Returning to a cached instance is a hit, not a reload.
    s.set_instance("X");
    s.compose();
    let stats = s.stats();
    assert_eq!(stats.aggregations, 2);
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.cache_hits, 1);
}

#[test]
fn evicted_instance_is_reloaded() {
    let options = SessionOptions {
        cache_capacity: 1,
        ..SessionOptions::default()
    };
    let mut s = Session::new(RunStore::new(source()), options);
    s.set_instance("X");
    s.compose();
    s.set_instance("W");
    s.compose();
    s.set_instance("X");
    s.compose();
    assert_eq!(s.stats().loads, 3);
    assert_eq!(s.stats().aggregations, 3);
    assert_eq!(s.cache().len(), 1);
}

#[test]
fn missing_seen_column_drops_secondary_trace() {
    let rows: Table = [(0, 7.0), (1, 6.0)]
        .into_iter()
        .map(|(i, c)| row(json!({"iteration": i, "candidate_cost": c, "best_cost": c})))
        .collect();
    let source = MemorySource::new("annealing").with_file("annealing_M_0.jsonl", rows);
    let mut s = Session::new(RunStore::new(source), SessionOptions::default());
    s.set_instance("M");
    let out = s.compose();

    assert!(!out.chart.is_empty());
    assert!(out.chart.trace("Seen").is_none());
    let y2 = out.chart.layout.y_axis2.as_ref().expect("right axis");
    assert_eq!(y2.range, Some([0.0, 300.0]));
    let mismatch = out
        .advisories
        .iter()
        .find_map(|a| match a {
            Advisory::SchemaMismatch { metrics, .. } => Some(metrics.clone()),
            _ => None,
        })
        .expect("schema advisory");
    assert!(mismatch.contains(&Metric::IncumbentCost));
    assert!(mismatch.contains(&Metric::Temperature));
}

#[test]
fn malformed_run_file_is_skipped_with_advisory() {
    let source = source().with_file("annealing_X_final.jsonl", cost_rows(&[1.0]));
    let mut s = Session::new(RunStore::new(source), SessionOptions::default());
    s.set_instance("X");
    let out = s.compose();

    assert_eq!(out.run_range.available, vec![RunId::new(0), RunId::new(1)]);
    assert!(out.advisories.contains(&Advisory::Skipped(LoadWarning::MalformedRunId {
        file: "annealing_X_final.jsonl".to_string()
    })));
    assert!(!out.chart.is_empty());
}

#[test]
fn stale_run_selection_yields_empty_chart() {
    let mut s = session();
    s.set_instance("X");
    s.select_run(RunId::new(7));
    let out = s.compose();

    assert_eq!(out.selected_run, Some(RunId::new(7)));
    assert!(out.chart.is_empty());
    assert!(out.advisories.contains(&Advisory::EmptySelection {
        instance: InstanceId::from("X"),
        run: Some(RunId::new(7)),
    }));
    // Aggregation does not depend on the selected run.
    assert_eq!(s.stats().aggregations, 1);
}

#[test]
fn refresh_picks_up_new_runs() {
    let mut s = session();
    s.set_instance("X");
    s.select_run(RunId::new(1));
    assert_eq!(s.compose().run_range.available.len(), 2);

    s.store_mut()
        .source_mut()
        .insert("annealing_X_2.jsonl", cost_rows(&[70.0, 60.0]));
    // Without a refresh the cached dataset is used.
    assert_eq!(s.compose().run_range.available.len(), 2);

    s.refresh();
    let out = s.compose();
    assert_eq!(out.run_range.available.len(), 3);
    assert_eq!(out.run_range.max, 2);
    assert_eq!(out.selected_run, Some(RunId::new(1)));
    assert_eq!(s.stats().loads, 2);
    assert_eq!(s.stats().aggregations, 2);
    let at1 = s.envelope().expect("envelope").at(1, Metric::BestCost).expect("stats");
    assert_eq!(at1.min, 60.0);
}

#[test]
fn refresh_rederives_automatic_selection() {
    let mut s = session();
    s.set_instance("X");
    assert_eq!(s.compose().selected_run, Some(RunId::new(0)));
    assert_eq!(s.state().selection_origin(), SelectionOrigin::Auto);

    s.store_mut().source_mut().remove("annealing_X_0.jsonl");
    s.refresh();
    let out = s.compose();
    assert_eq!(out.run_range.available, vec![RunId::new(1)]);
    assert_eq!(out.selected_run, Some(RunId::new(1)));
    assert!(!out.chart.is_empty());
    assert!(
        !out.advisories
            .iter()
            .any(|a| matches!(a, Advisory::EmptySelection { .. }))
    );
}

#[test]
fn repeated_pick_after_instance_change_is_kept() {
    let source = source().with_file("annealing_W_1.jsonl", cost_rows(&[6.0, 2.0]));
    let mut s = Session::new(RunStore::new(source), SessionOptions::default());
    s.set_instance("X");
    s.select_run(RunId::new(1));
    assert_eq!(s.compose().selected_run, Some(RunId::new(1)));

    s.set_instance("W");
    // Same run as before, so the value does not change, but it is a pick.
    assert!(!s.select_run(RunId::new(1)));
    let out = s.compose();
    assert_eq!(out.selected_run, Some(RunId::new(1)));
    assert_eq!(
        out.chart.layout.title.as_deref(),
        Some("Metrics for W, run 1")
    );
}

#[test]
fn settled_session_has_nothing_stale() {
    let mut s = session();
    s.set_instance("X");
    assert_eq!(s.stale(), s.graph().order().to_vec());
    s.compose();
    assert!(s.stale().is_empty());

    s.select_run(RunId::new(1));
    let mut stale = s.stale();
    stale.sort();
    assert_eq!(
        stale,
        vec![
            Artifact::RunSeries,
            Artifact::Traces,
            Artifact::Layout,
            Artifact::Chart
        ]
    );
}
