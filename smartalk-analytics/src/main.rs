//! smartalk-funnel - Funnel analysis and event replay tool
//!
//! Reads funnel data exported by the backend as JSON, runs the analysis
//! functions and prints a JSON report to stdout. `replay` re-delivers a
//! JSON-lines recording of events to the configured collector.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use smartalk_analytics::funnel::{
    calculate_conversion_rates, calculate_experiment_impact, compare_cohorts, detect_anomalies,
    generate_optimization_recommendations, identify_drop_off_points, CohortSummary,
    ExperimentResults, FunnelAnalysis,
};
use smartalk_analytics::{replay, EventBuffer, FunnelCount};
use smartalk_common::AnalyticsConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "smartalk-funnel")]
#[command(about = "Conversion funnel analysis for SmarTalk analytics")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Step conversion rates and drop-off points from `[{step, users}]`
    Conversion {
        file: PathBuf,

        /// Minimum drop-off rate to report
        #[arg(long, default_value = "0.2")]
        drop_off_threshold: f64,
    },

    /// Compare cohorts from `[{id, activationRate, totalUsers}]`, oldest first
    Cohorts { file: PathBuf },

    /// Experiment impact from `{control: {users, activated}, treatment: {...}}`
    Experiment { file: PathBuf },

    /// Steps deviating from expected rates
    Anomalies {
        /// `[{step, users}]`, entry step first
        counts: PathBuf,

        /// `{"<step>": expected fraction of entry users}`
        expected: PathBuf,

        #[arg(long, default_value = "0.2")]
        threshold: f64,
    },

    /// Optimization recommendations for one funnel analysis
    Recommend { file: PathBuf },

    /// Re-deliver a JSON-lines event recording
    Replay {
        events: PathBuf,

        /// Config file (default: SMARTALK_ANALYTICS_CONFIG, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting SmarTalk funnel tool (smartalk-funnel) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    match args.command {
        Command::Conversion {
            file,
            drop_off_threshold,
        } => {
            let funnel: Vec<FunnelCount> = read_json(&file)?;
            let rates = calculate_conversion_rates(&funnel)?;
            let drop_offs = identify_drop_off_points(&funnel, drop_off_threshold)?;
            print_json(&json!({
                "conversionRates": rates,
                "dropOffPoints": drop_offs,
            }))
        }
        Command::Cohorts { file } => {
            let cohorts: Vec<CohortSummary> = read_json(&file)?;
            print_json(&compare_cohorts(&cohorts)?)
        }
        Command::Experiment { file } => {
            let results: ExperimentResults = read_json(&file)?;
            print_json(&calculate_experiment_impact(&results)?)
        }
        Command::Anomalies {
            counts,
            expected,
            threshold,
        } => {
            let funnel: Vec<FunnelCount> = read_json(&counts)?;
            let expected: BTreeMap<String, f64> = read_json(&expected)?;
            print_json(&detect_anomalies(&funnel, &expected, threshold)?)
        }
        Command::Recommend { file } => {
            let analysis: FunnelAnalysis = read_json(&file)?;
            print_json(&generate_optimization_recommendations(&analysis)?)
        }
        Command::Replay { events, config } => {
            let config = AnalyticsConfig::load(config.as_deref())?;
            info!("Delivering to {}", config.batch_endpoint());

            let recorded = replay::read_events(&events)
                .with_context(|| format!("Failed to read {}", events.display()))?;
            let buffer = EventBuffer::from_config(&config)?;
            let summary = replay::replay(&buffer, recorded).await;
            buffer.destroy();

            print_json(&summary)?;
            if summary.undelivered > 0 {
                anyhow::bail!("{} events were not delivered", summary.undelivered);
            }
            Ok(())
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
