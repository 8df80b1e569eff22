use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use av_core::{InstanceId, RunId};
use av_engine::{EngineError, ViewportPolicy, VizConfig, export_summary};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn write_run(dir: &PathBuf, name: &str, rows: &[(u64, f64, f64)]) {
    let content: String = rows
        .iter()
        .map(|(iteration, cost, time)| {
            format!(
                "{{\"iteration\":{},\"current_cost\":{},\"best_cost\":{},\"evaluations\":{},\"infeasible\":1,\"time\":{},\"temperature\":{}}}\n",
                iteration,
                cost,
                cost,
                iteration * 10,
                time,
                100.0 / (*iteration as f64 + 1.0)
            )
        })
        .collect();
    fs::write(dir.join(name), content).expect("failed to write run file");
}

#[test]
fn config_file_drives_a_directory_session() {
    let root = unique_temp_dir("av_engine_config");
    let runs = root.join("runs");
    fs::create_dir_all(&runs).expect("failed to create temp dir");
    write_run(&runs, "sa_Call_7_Vehicle_3_0.jsonl", &[(0, 50.0, 0.000_001), (1, 40.0, 0.000_001)]);
    write_run(&runs, "sa_Call_7_Vehicle_3_1.jsonl", &[(0, 30.0, 0.000_003)]);

    let config_path = root.join("viz.yaml");
    fs::write(
        &config_path,
        "instrumentation_dir: runs\nprefix: sa\nextensions: [jsonl]\ninstances: [Call_7_Vehicle_3]\nshow_bands: false\nviewport_policy: preserve\n",
    )
    .expect("failed to write config");

    let config = VizConfig::load_yaml(&config_path).expect("failed to load config");
    assert_eq!(config.instrumentation_dir, runs);
    assert_eq!(config.viewport_policy, ViewportPolicy::Preserve);

    let mut session = config.session();
    session.set_instance(config.instances[0].clone());
    let out = session.compose();
    assert_eq!(out.selected_run, Some(RunId::new(0)));
    assert!(out.advisories.iter().all(|a| !matches!(a, av_engine::Advisory::NotFound { .. })));
    assert_eq!(out.chart.band_traces().count(), 0);
    assert!(!out.chart.is_empty());

    let summary = export_summary(&config.store(), &config.instances[0])
        .expect("failed to export summary");
    // Infeasible counts are read through their short column alias.
    assert_eq!(summary.panels[1].traces.len(), 6);
    let time_mean = &summary.panels[2].traces[0];
    assert!((time_mean.y[0] - 2.0).abs() < 1e-9);
    assert_eq!(time_mean.y.len(), 2);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn summary_export_fails_for_unknown_instance() {
    let root = unique_temp_dir("av_engine_summary_missing");
    fs::create_dir_all(&root).expect("failed to create temp dir");
    let config = VizConfig {
        instrumentation_dir: root.clone(),
        ..VizConfig::default()
    };

    let err = export_summary(&config.store(), &InstanceId::from("Nope"))
        .expect_err("unknown instance must fail");
    assert!(matches!(
        err,
        EngineError::Results(av_results::ResultsError::NotFound { .. })
    ));

    fs::remove_dir_all(&root).ok();
}
