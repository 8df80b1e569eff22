use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use av_core::{AxisRange, InstanceId, RunId, Statistic};
use av_engine::{
    EngineError, EngineResult, Envelope, MetricPreset, RelayoutEvent, VizConfig, aggregate,
    export_summary, run_range, summarize_instance,
};
use av_results::ResultsError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "av-cli")]
#[command(about = "AnnealViz CLI - aggregate and chart simulated annealing runs", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Instrumentation directory, overriding the configuration
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured instances and their run counts
    Instances,
    /// Show the runs of an instance
    Runs {
        /// Instance name, e.g. Call_7_Vehicle_3
        instance: String,
    },
    /// Export per-iteration statistics across all runs as CSV
    Envelope {
        instance: String,
        /// Metric set: tracked, costs or summary
        #[arg(short, long)]
        metrics: Option<MetricPreset>,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compose the interactive chart of one run as JSON
    Chart {
        instance: String,
        /// Run to show (defaults to the lowest run)
        #[arg(short, long)]
        run: Option<u32>,
        /// Hide the min/max bands
        #[arg(long)]
        no_bands: bool,
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
        x_range: Option<Vec<f64>>,
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
        y_range: Option<Vec<f64>>,
        /// Output JSON file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compose the static four-panel summary as JSON
    Summary {
        instance: String,
        /// Output JSON file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> EngineResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.dir)?;

    match cli.command {
        Commands::Instances => cmd_instances(&config),
        Commands::Runs { instance } => cmd_runs(&config, &InstanceId::from(instance)),
        Commands::Envelope {
            instance,
            metrics,
            output,
        } => cmd_envelope(
            &config,
            &InstanceId::from(instance),
            metrics.unwrap_or(config.metric_set),
            output.as_deref(),
        ),
        Commands::Chart {
            instance,
            run,
            no_bands,
            x_range,
            y_range,
            output,
        } => cmd_chart(
            &config,
            InstanceId::from(instance),
            run.map(RunId::new),
            !no_bands,
            RangeArgs { x_range, y_range },
            output.as_deref(),
        ),
        Commands::Summary { instance, output } => {
            cmd_summary(&config, &InstanceId::from(instance), output.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>, dir: Option<PathBuf>) -> EngineResult<VizConfig> {
    let mut config = match path {
        Some(path) => VizConfig::load_yaml(path)?,
        None => VizConfig::default(),
    };
    if let Some(dir) = dir {
        config.instrumentation_dir = dir;
    }
    info!(dir = %config.instrumentation_dir.display(), prefix = %config.prefix, "configuration loaded");
    Ok(config)
}

fn write_output(output: Option<&Path>, content: &str, what: &str) -> EngineResult<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
        println!("✓ Exported {} to {}", what, path.display());
    } else {
        print!("{}", content);
    }
    Ok(())
}

fn cmd_instances(config: &VizConfig) -> EngineResult<()> {
    let store = config.store();
    if config.instances.is_empty() {
        println!("No instances configured");
        return Ok(());
    }
    println!("Instances in {}:", config.instrumentation_dir.display());
    for instance in &config.instances {
        match store.load(instance) {
            Ok(merged) => {
                let summary = summarize_instance(&merged);
                println!(
                    "  {} - {} runs, {} records",
                    instance, summary.run_count, summary.record_count
                );
            }
            Err(ResultsError::NotFound { .. }) => println!("  {} - no runs", instance),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn cmd_runs(config: &VizConfig, instance: &InstanceId) -> EngineResult<()> {
    let merged = config.store().load(instance)?;
    let summary = summarize_instance(&merged);

    match run_range(&merged) {
        Some(range) => {
            let marks: Vec<&str> = range.marks.values().map(String::as_str).collect();
            println!(
                "Runs of {}: {}..={} [{}]",
                instance,
                range.min,
                range.max,
                marks.join(", ")
            );
        }
        None => println!("Runs of {}: none loaded", instance),
    }
    for (run, dataset) in &merged.runs {
        println!(
            "  run {} - {} records, last iteration {} ({})",
            run,
            dataset.len(),
            dataset
                .last_iteration()
                .map_or_else(|| "-".to_string(), |i| i.to_string()),
            dataset.source
        );
    }
    let metrics: Vec<&str> = summary.metrics.iter().map(|m| m.column()).collect();
    println!("Metrics: {}", metrics.join(", "));
    for warning in &merged.warnings {
        println!("  ! {}", warning);
    }
    Ok(())
}

fn envelope_csv(envelope: &Envelope) -> String {
    let metrics: Vec<_> = envelope.metrics().collect();
    let mut iterations: Vec<u64> = metrics
        .iter()
        .filter_map(|m| envelope.get(*m))
        .flat_map(|e| e.iterations.iter().copied())
        .collect();
    iterations.sort_unstable();
    iterations.dedup();

    let mut csv = String::from("iteration");
    for metric in &metrics {
        for statistic in [Statistic::Min, Statistic::Max, Statistic::Mean] {
            csv.push_str(&format!(",{}_{}", metric.column(), statistic.suffix()));
        }
        csv.push_str(&format!(",{}_count", metric.column()));
    }
    csv.push('\n');

    for iteration in iterations {
        csv.push_str(&iteration.to_string());
        for metric in &metrics {
            match envelope.at(iteration, *metric) {
                Some(stats) => csv.push_str(&format!(
                    ",{},{},{},{}",
                    stats.min, stats.max, stats.mean, stats.count
                )),
                None => csv.push_str(",,,,"),
            }
        }
        csv.push('\n');
    }
    csv
}

fn cmd_envelope(
    config: &VizConfig,
    instance: &InstanceId,
    preset: MetricPreset,
    output: Option<&Path>,
) -> EngineResult<()> {
    let merged = config.store().load(instance)?;
    let envelope = aggregate(&merged, &preset.metric_set());
    for metric in envelope.missing() {
        eprintln!("! {} has no {} data", instance, metric.column());
    }
    write_output(output, &envelope_csv(&envelope), "envelope")
}

struct RangeArgs {
    x_range: Option<Vec<f64>>,
    y_range: Option<Vec<f64>>,
}

fn axis(values: Option<Vec<f64>>, what: &'static str) -> EngineResult<Option<AxisRange>> {
    match values.as_deref() {
        None => Ok(None),
        Some([min, max]) => Ok(Some(AxisRange::new(*min, *max, what)?)),
        Some(other) => Err(EngineError::Config(format!(
            "--{}-range takes two values, got {}",
            what,
            other.len()
        ))),
    }
}

fn cmd_chart(
    config: &VizConfig,
    instance: InstanceId,
    run: Option<RunId>,
    show_bands: bool,
    ranges: RangeArgs,
    output: Option<&Path>,
) -> EngineResult<()> {
    let mut session = config.session();
    session.set_instance(instance);
    // Settle the default view first so the edits below are incremental.
    session.compose();

    if let Some(run) = run {
        session.select_run(run);
    }
    session.set_show_bands(show_bands);
    session.relayout(&RelayoutEvent {
        x: axis(ranges.x_range, "x")?,
        y: axis(ranges.y_range, "y")?,
        autorange: false,
    });

    let composition = session.compose();
    for advisory in &composition.advisories {
        eprintln!("! {}", advisory);
    }
    eprintln!(
        "Runs {}..={}, showing {}",
        composition.run_range.min,
        composition.run_range.max,
        composition
            .selected_run
            .map_or_else(|| "none".to_string(), |r| r.to_string())
    );
    eprintln!("Recompute: {}", session.stats());

    let json = serde_json::to_string_pretty(&composition.chart)?;
    write_output(output, &json, "chart")
}

fn cmd_summary(
    config: &VizConfig,
    instance: &InstanceId,
    output: Option<&Path>,
) -> EngineResult<()> {
    let chart = export_summary(&config.store(), instance)?;
    let json = serde_json::to_string_pretty(&chart)?;
    write_output(output, &json, "summary")
}
