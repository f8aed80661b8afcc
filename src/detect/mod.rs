//! Anomaly detection and event grouping.

pub mod engine;
pub mod incident;
pub mod rate;
pub mod redline;
pub mod stats;
pub mod sustained;
pub mod zscore;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DetectionConfig, RedlineLimit};
use crate::telemetry::ObservationRecord;

pub use engine::AnomalyEngine;
pub use incident::Event;
pub use stats::ParameterBaseline;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("no data available: run detection before querying results")]
    NoData,

    #[error("unknown severity '{0}' (expected caution, warning or critical)")]
    UnknownSeverity(String),

    #[error("unknown anomaly type '{0}'")]
    UnknownAnomalyType(String),
}

/// Severity tiers. Declaration order is the ranking: Caution < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Caution,
    Warning,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Caution, Severity::Warning, Severity::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Caution => "CAUTION",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "caution" => Ok(Severity::Caution),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(DetectError::UnknownSeverity(s.to_string())),
        }
    }
}

/// Which detector raised an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    ZScoreOutlier,
    RapidChange,
    RedlineViolation,
    SustainedDeviation,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::ZScoreOutlier => "ZScoreOutlier",
            AnomalyType::RapidChange => "RapidChange",
            AnomalyType::RedlineViolation => "RedlineViolation",
            AnomalyType::SustainedDeviation => "SustainedDeviation",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnomalyType {
    type Err = DetectError;

    /// Accepts the type name in any case, with or without `-`/`_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "zscoreoutlier" | "zscore" => Ok(AnomalyType::ZScoreOutlier),
            "rapidchange" | "rate" => Ok(AnomalyType::RapidChange),
            "redlineviolation" | "redline" => Ok(AnomalyType::RedlineViolation),
            "sustaineddeviation" | "sustained" => Ok(AnomalyType::SustainedDeviation),
            _ => Err(DetectError::UnknownAnomalyType(s.to_string())),
        }
    }
}

/// Side of the envelope a redline violation crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    High,
    Low,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Direction::High => "HIGH",
            Direction::Low => "LOW",
        })
    }
}

/// Detector-specific evidence. Reported figures are rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnomalyKind {
    ZScoreOutlier {
        expected: f64,
        z_score: f64,
    },
    RapidChange {
        previous: f64,
        rate_of_change: f64,
        threshold: f64,
    },
    RedlineViolation {
        direction: Direction,
        limit: f64,
        exceedance: f64,
        /// Infinite when the crossed limit is zero.
        #[serde(with = "crate::detect::stats::non_finite")]
        percent_over: f64,
    },
    SustainedDeviation {
        window_mean: f64,
        baseline_mean: f64,
        deviation_sigma: f64,
        window: usize,
    },
}

impl AnomalyKind {
    pub fn anomaly_type(&self) -> AnomalyType {
        match self {
            AnomalyKind::ZScoreOutlier { .. } => AnomalyType::ZScoreOutlier,
            AnomalyKind::RapidChange { .. } => AnomalyType::RapidChange,
            AnomalyKind::RedlineViolation { .. } => AnomalyType::RedlineViolation,
            AnomalyKind::SustainedDeviation { .. } => AnomalyType::SustainedDeviation,
        }
    }
}

/// A single flagged sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub severity: Severity,
    /// Raw parameter key.
    pub parameter: String,
    /// Human-readable parameter label from the redline table.
    pub label: String,
    pub unit: String,
    /// Observed value (the window mean for sustained deviations).
    pub value: f64,
    pub mission_time: f64,
    /// Position in the working set.
    pub sample_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(flatten)]
    pub kind: AnomalyKind,
    pub description: String,
}

impl Anomaly {
    pub fn anomaly_type(&self) -> AnomalyType {
        self.kind.anomaly_type()
    }
}

/// Read-only inputs shared by every detector during one run.
pub struct DetectionContext<'a> {
    /// The working set, in input order.
    pub records: &'a [&'a ObservationRecord],
    pub redlines: &'a BTreeMap<String, RedlineLimit>,
    pub baselines: &'a BTreeMap<String, ParameterBaseline>,
    pub config: &'a DetectionConfig,
}

impl<'a> DetectionContext<'a> {
    /// Monitored parameters paired with their baseline, when one was computed.
    pub fn with_baselines(
        &self,
    ) -> impl Iterator<Item = (&'a String, &'a RedlineLimit, &'a ParameterBaseline)> {
        let baselines = self.baselines;
        self.redlines
            .iter()
            .filter_map(move |(name, limit)| baselines.get(name).map(|b| (name, limit, b)))
    }

    /// Build an anomaly for the sample at `index` of the working set.
    #[allow(clippy::too_many_arguments)]
    pub fn flag(
        &self,
        parameter: &str,
        limit: &RedlineLimit,
        index: usize,
        value: f64,
        severity: Severity,
        kind: AnomalyKind,
        description: String,
    ) -> Anomaly {
        let record = self.records[index];
        Anomaly {
            severity,
            parameter: parameter.to_string(),
            label: limit.label.clone(),
            unit: limit.unit.clone(),
            value: stats::round_report(value),
            mission_time: record.mission_time,
            sample_index: index,
            phase: record.phase.clone(),
            kind,
            description,
        }
    }
}

/// One independent statistical heuristic.
pub trait Detector {
    fn anomaly_type(&self) -> AnomalyType;

    /// Scan the working set. Output is in parameter order, then sample order.
    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Anomaly>;
}

/// Read-only query over an already produced anomaly list. Criteria combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyFilter {
    pub severity: Option<Severity>,
    pub anomaly_type: Option<AnomalyType>,
    /// Matches either the raw key or the label.
    pub parameter: Option<String>,
}

impl AnomalyFilter {
    pub fn matches(&self, anomaly: &Anomaly) -> bool {
        if let Some(sev) = self.severity {
            if anomaly.severity != sev {
                return false;
            }
        }
        if let Some(ty) = self.anomaly_type {
            if anomaly.anomaly_type() != ty {
                return false;
            }
        }
        if let Some(param) = &self.parameter {
            if anomaly.parameter != *param && anomaly.label != *param {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, anomalies: &'a [Anomaly]) -> Vec<&'a Anomaly> {
        anomalies.iter().filter(|a| self.matches(a)).collect()
    }
}
