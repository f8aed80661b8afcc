use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use missionwatch::detect::AnomalyType;
use missionwatch::{report, AnomalyFilter, MissionConfig, Severity};

#[derive(Parser)]
#[command(
    name = "missionwatch",
    about = "Offline statistical anomaly detection for mission telemetry",
    version,
    long_about = None
)]
struct Cli {
    /// TOML config with redlines, mission events and detector tunables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON output for machine parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all detectors and list every anomaly in time order
    Detect {
        /// JSON array of observation records
        #[arg(long)]
        input: PathBuf,
    },

    /// Run detection and print counts and clustered events
    Summary {
        /// JSON array of observation records
        #[arg(long)]
        input: PathBuf,
    },

    /// Run detection and list only anomalies matching every given criterion
    Filter {
        /// JSON array of observation records
        #[arg(long)]
        input: PathBuf,

        /// caution, warning or critical
        #[arg(long)]
        severity: Option<Severity>,

        /// zscore, rate, redline or sustained (full type names also accepted)
        #[arg(long = "type")]
        anomaly_type: Option<AnomalyType>,

        /// Parameter key or label
        #[arg(long)]
        parameter: Option<String>,
    },

    /// Print the configured redline and mission-event tables
    Limits,
}

fn load_config(path: Option<&Path>) -> Result<MissionConfig> {
    match path {
        Some(p) => MissionConfig::load(p),
        None => Ok(MissionConfig::load_or_default()),
    }
}

fn print_anomalies<'a>(anomalies: impl IntoIterator<Item = &'a missionwatch::Anomaly>) {
    let mut empty = true;
    for a in anomalies {
        if empty {
            println!(
                "{:>10} | {:<8} | {:<18} | {:<24} | {:>18} | Evidence",
                "Time", "Severity", "Type", "Parameter", "Value"
            );
            println!("{:-<10}-|-{:-<8}-|-{:-<18}-|-{:-<24}-|-{:-<18}-|-{:-<12}", "", "", "", "", "", "");
            empty = false;
        }
        println!("{}", report::format_anomaly(a));
    }
    if empty {
        println!("No anomalies found.");
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect { input } => {
            tracing::info!(input = %input.display(), "Running anomaly detection");
            let engine = missionwatch::analyze_file(&input, config)?;
            let anomalies = engine.anomalies()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(anomalies)?);
            } else {
                print_anomalies(anomalies);
            }
        }
        Commands::Summary { input } => {
            let engine = missionwatch::analyze_file(&input, config)?;
            let summary = engine.summarize()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n=== Mission Anomaly Summary ===");
                print!("{}", report::format_summary(&summary));
                println!("===============================\n");
            }
        }
        Commands::Filter {
            input,
            severity,
            anomaly_type,
            parameter,
        } => {
            let engine = missionwatch::analyze_file(&input, config)?;
            let filter = AnomalyFilter {
                severity,
                anomaly_type,
                parameter,
            };
            let hits = engine.filter(&filter)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_anomalies(hits);
            }
        }
        Commands::Limits => {
            if cli.json {
                let tables = serde_json::json!({
                    "redlines": config.redlines,
                    "mission_events": config.mission_events,
                });
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                println!("{:<20} | {:<24} | {:>10} | {:>10} | Unit", "Parameter", "Label", "Min", "Max");
                println!("{:-<20}-|-{:-<24}-|-{:-<10}-|-{:-<10}-|-{:-<6}", "", "", "", "", "");
                for (name, limit) in &config.redlines {
                    println!(
                        "{:<20} | {:<24} | {:>10.2} | {:>10.2} | {}",
                        name, limit.label, limit.min, limit.max, limit.unit
                    );
                }
                println!("\nMission events:");
                let mut markers: Vec<(&String, &f64)> = config.mission_events.iter().collect();
                markers.sort_by(|a, b| a.1.total_cmp(b.1));
                for (name, t) in markers {
                    println!("  T+{:>8.1}s  {}", t, name);
                }
            }
        }
    }

    Ok(())
}
