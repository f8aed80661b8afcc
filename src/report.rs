//! Summary aggregation and human-readable formatting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{MissionConfig, RedlineLimit};
use crate::detect::engine::Detection;
use crate::detect::{Anomaly, AnomalyKind, AnomalyType, Event, ParameterBaseline, Severity};

/// Aggregated view of one detection run, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_anomalies: usize,
    pub total_events: usize,
    /// Always holds all three tiers.
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<AnomalyType, usize>,
    /// Keyed by parameter label.
    pub by_parameter: BTreeMap<String, usize>,
    pub events: Vec<Event>,
    pub baselines: BTreeMap<String, ParameterBaseline>,
    pub redlines: BTreeMap<String, RedlineLimit>,
    pub mission_events: BTreeMap<String, f64>,
}

pub fn build_summary(run: &Detection, config: &MissionConfig) -> Summary {
    let mut by_severity: BTreeMap<Severity, usize> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_type = BTreeMap::new();
    let mut by_parameter = BTreeMap::new();

    for a in &run.anomalies {
        *by_severity.entry(a.severity).or_default() += 1;
        *by_type.entry(a.anomaly_type()).or_default() += 1;
        *by_parameter.entry(a.label.clone()).or_default() += 1;
    }

    Summary {
        total_anomalies: run.anomalies.len(),
        total_events: run.events.len(),
        by_severity,
        by_type,
        by_parameter,
        events: run.events.clone(),
        baselines: run.baselines.clone(),
        redlines: config.redlines.clone(),
        mission_events: config.mission_events.clone(),
    }
}

/// Detector-specific figure shown next to an anomaly.
fn evidence(kind: &AnomalyKind) -> String {
    match kind {
        AnomalyKind::ZScoreOutlier { z_score, .. } => format!("z={:.2}", z_score),
        AnomalyKind::RapidChange { rate_of_change, .. } => format!("step={:.2}", rate_of_change),
        AnomalyKind::RedlineViolation {
            direction,
            percent_over,
            ..
        } => format!("{} {:.1}%", direction, percent_over),
        AnomalyKind::SustainedDeviation {
            deviation_sigma, ..
        } => format!("dev={:.2}σ", deviation_sigma),
    }
}

/// One table row per anomaly.
pub fn format_anomaly(a: &Anomaly) -> String {
    format!(
        "{:>9.2}s | {:<8} | {:<18} | {:<24} | {:>12.2} {:<5} | {}",
        a.mission_time,
        a.severity,
        a.anomaly_type(),
        a.label,
        a.value,
        a.unit,
        evidence(&a.kind),
    )
}

/// One line per event, e.g. `EVT-001 [CRITICAL] 10.00s-15.00s: 3 anomalies (...)`.
pub fn format_event(e: &Event) -> String {
    let params: Vec<&str> = e.affected_parameters.iter().map(String::as_str).collect();
    format!(
        "{} [{}] {:.2}s-{:.2}s: {} anomal{} ({})",
        e.id,
        e.severity,
        e.start_time,
        e.end_time,
        e.count,
        if e.count == 1 { "y" } else { "ies" },
        params.join(", "),
    )
}

/// Multi-line text rendering of a summary.
pub fn format_summary(summary: &Summary) -> String {
    let mut out = format!(
        "{} anomalies in {} events\n",
        summary.total_anomalies, summary.total_events
    );

    let tiers: Vec<String> = summary
        .by_severity
        .iter()
        .rev()
        .map(|(sev, n)| format!("{}: {}", sev, n))
        .collect();
    out.push_str(&format!("Severity:   {}\n", tiers.join(", ")));

    if !summary.by_type.is_empty() {
        let types: Vec<String> = summary
            .by_type
            .iter()
            .map(|(ty, n)| format!("{}: {}", ty, n))
            .collect();
        out.push_str(&format!("Types:      {}\n", types.join(", ")));
    }

    if !summary.by_parameter.is_empty() {
        let params: Vec<String> = summary
            .by_parameter
            .iter()
            .map(|(p, n)| format!("{}: {}", p, n))
            .collect();
        out.push_str(&format!("Parameters: {}\n", params.join(", ")));
    }

    if !summary.events.is_empty() {
        out.push_str("\nEvents:\n");
        for e in &summary.events {
            out.push_str(&format!(" - {}\n", format_event(e)));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::incident::cluster;
    use crate::detect::tests::sample_anomaly;

    fn run_of(anomalies: Vec<Anomaly>) -> Detection {
        let events = cluster(&anomalies, 10.0);
        Detection {
            baselines: BTreeMap::new(),
            anomalies,
            events,
        }
    }

    #[test]
    fn test_summary_counts() {
        let run = run_of(vec![
            sample_anomaly(Severity::Critical, "a", 1.0),
            sample_anomaly(Severity::Critical, "b", 2.0),
            sample_anomaly(Severity::Caution, "a", 40.0),
        ]);
        let summary = build_summary(&run, &MissionConfig::default());

        assert_eq!(summary.total_anomalies, 3);
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.by_severity[&Severity::Critical], 2);
        assert_eq!(summary.by_severity[&Severity::Warning], 0);
        assert_eq!(summary.by_severity[&Severity::Caution], 1);
        assert_eq!(summary.by_type[&AnomalyType::ZScoreOutlier], 3);
        assert_eq!(summary.by_parameter["a label"], 2);
        assert_eq!(summary.mission_events["MECO"], 162.0);
        assert!(summary.redlines.contains_key("chamber_pressure"));
    }

    #[test]
    fn test_empty_summary_has_all_tiers() {
        let summary = build_summary(&Detection::default(), &MissionConfig::default());
        assert_eq!(summary.by_severity.len(), 3);
        assert!(summary.by_severity.values().all(|n| *n == 0));
        assert!(summary.by_type.is_empty());
        assert!(format_summary(&summary).starts_with("0 anomalies in 0 events"));
    }

    #[test]
    fn test_summary_json_keys() {
        let run = run_of(vec![sample_anomaly(Severity::Warning, "a", 1.0)]);
        let json = serde_json::to_value(build_summary(&run, &MissionConfig::default())).unwrap();
        assert_eq!(json["by_severity"]["WARNING"], 1);
        assert_eq!(json["by_type"]["ZScoreOutlier"], 1);
        assert_eq!(json["events"][0]["id"], "EVT-001");
    }

    #[test]
    fn test_format_event() {
        let run = run_of(vec![
            sample_anomaly(Severity::Warning, "a", 10.0),
            sample_anomaly(Severity::Critical, "b", 12.5),
        ]);
        let line = format_event(&run.events[0]);
        assert_eq!(
            line,
            "EVT-001 [CRITICAL] 10.00s-12.50s: 2 anomalies (a label, b label)"
        );
    }

    #[test]
    fn test_format_anomaly_includes_evidence() {
        let line = format_anomaly(&sample_anomaly(Severity::Caution, "a", 3.0));
        assert!(line.contains("CAUTION"));
        assert!(line.contains("ZScoreOutlier"));
        assert!(line.contains("z=3.50"));
    }
}
