//! missionwatch -- offline statistical anomaly detection for mission telemetry.
//!
//! This crate provides the core library: per-parameter baselines, four
//! independent detectors (z-score, rate of change, redline, sustained
//! deviation), temporal event clustering, and summary reporting.

pub mod config;
pub mod detect;
pub mod report;
pub mod telemetry;

use std::path::Path;

use anyhow::Result;

pub use config::MissionConfig;
pub use detect::engine::{run_detection, Detection};
pub use detect::{Anomaly, AnomalyEngine, AnomalyFilter, Event, Severity};
pub use report::Summary;

/// Load a JSON telemetry file and run detection over it in one step.
pub fn analyze_file(path: &Path, config: MissionConfig) -> Result<AnomalyEngine> {
    let records = telemetry::load_records(path)?;
    let mut engine = AnomalyEngine::new(config);
    engine.detect(&records);
    Ok(engine)
}
