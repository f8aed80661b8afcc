use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::MissionConfig;
use crate::detect::incident::{self, Event};
use crate::detect::rate::RateOfChangeDetector;
use crate::detect::redline::RedlineDetector;
use crate::detect::stats::{self, ParameterBaseline};
use crate::detect::sustained::SustainedDeviationDetector;
use crate::detect::zscore::ZScoreDetector;
use crate::detect::{Anomaly, AnomalyFilter, DetectError, DetectionContext, Detector};
use crate::report::{self, Summary};
use crate::telemetry::{self, ObservationRecord};

/// Everything one detection run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub baselines: BTreeMap<String, ParameterBaseline>,
    /// Sorted ascending by mission time.
    pub anomalies: Vec<Anomaly>,
    pub events: Vec<Event>,
}

/// Run every detector over `records` and cluster the result.
///
/// Pure: the same input and configuration always give the same output.
pub fn run_detection(records: &[ObservationRecord], config: &MissionConfig) -> Detection {
    let set = telemetry::working_set(records);
    if set.is_empty() {
        info!(records = records.len(), "no valid timed records, nothing to analyze");
        return Detection::default();
    }

    let baselines = stats::compute_baselines(&set, config.redlines.keys());
    let ctx = DetectionContext {
        records: &set,
        redlines: &config.redlines,
        baselines: &baselines,
        config: &config.detection,
    };

    let detectors: [&dyn Detector; 4] = [
        &ZScoreDetector,
        &RateOfChangeDetector,
        &RedlineDetector,
        &SustainedDeviationDetector,
    ];
    let mut anomalies = Vec::new();
    for detector in detectors {
        let found = detector.detect(&ctx);
        debug!(detector = %detector.anomaly_type(), found = found.len(), "detector finished");
        anomalies.extend(found);
    }

    // Stable sort: ties keep detector order, then parameter order, then sample order.
    anomalies.sort_by(|a, b| a.mission_time.total_cmp(&b.mission_time));
    let events = incident::cluster(&anomalies, config.detection.cluster_window_secs);

    info!(
        records = records.len(),
        working_set = set.len(),
        parameters = baselines.len(),
        anomalies = anomalies.len(),
        events = events.len(),
        "detection run complete"
    );

    Detection {
        baselines,
        anomalies,
        events,
    }
}

/// Owned detector instance. Each call to [`AnomalyEngine::detect`] replaces
/// the previous run's results; nothing carries across runs.
pub struct AnomalyEngine {
    config: MissionConfig,
    last_run: Option<Detection>,
}

impl AnomalyEngine {
    pub fn new(config: MissionConfig) -> Self {
        Self {
            config,
            last_run: None,
        }
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Detect anomalies in `records`, returning the time-sorted flat list.
    pub fn detect(&mut self, records: &[ObservationRecord]) -> &[Anomaly] {
        let run = self.last_run.insert(run_detection(records, &self.config));
        &run.anomalies
    }

    fn latest(&self) -> Result<&Detection, DetectError> {
        self.last_run.as_ref().ok_or(DetectError::NoData)
    }

    pub fn anomalies(&self) -> Result<&[Anomaly], DetectError> {
        Ok(&self.latest()?.anomalies)
    }

    pub fn events(&self) -> Result<&[Event], DetectError> {
        Ok(&self.latest()?.events)
    }

    pub fn baselines(&self) -> Result<&BTreeMap<String, ParameterBaseline>, DetectError> {
        Ok(&self.latest()?.baselines)
    }

    /// Counts, events and static tables for the latest run.
    pub fn summarize(&self) -> Result<Summary, DetectError> {
        Ok(report::build_summary(self.latest()?, &self.config))
    }

    /// Pure filter over the latest run's anomalies.
    pub fn filter(&self, filter: &AnomalyFilter) -> Result<Vec<&Anomaly>, DetectError> {
        Ok(filter.apply(&self.latest()?.anomalies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{AnomalyType, Severity};

    fn engine() -> AnomalyEngine {
        AnomalyEngine::new(MissionConfig::default())
    }

    fn records_with_spike() -> Vec<ObservationRecord> {
        (0..30)
            .map(|i| {
                let pressure = if i == 15 { 1575.0 } else { 1000.0 };
                ObservationRecord::new(i as f64).with("chamber_pressure", pressure)
            })
            .collect()
    }

    #[test]
    fn test_queries_before_detection_report_no_data() {
        let e = engine();
        assert_eq!(e.summarize().unwrap_err(), DetectError::NoData);
        assert_eq!(
            e.filter(&AnomalyFilter::default()).unwrap_err(),
            DetectError::NoData
        );
        assert!(e.anomalies().is_err());
    }

    #[test]
    fn test_empty_input_yields_empty_run() {
        let mut e = engine();
        assert!(e.detect(&[]).is_empty());
        assert!(e.events().unwrap().is_empty());
        assert_eq!(e.summarize().unwrap().total_anomalies, 0);

        let untimed = vec![ObservationRecord::new(-5.0).with("vibration", 99.0)];
        assert!(e.detect(&untimed).is_empty());
    }

    #[test]
    fn test_spike_is_flagged_by_three_detectors() {
        let mut e = engine();
        let anomalies = e.detect(&records_with_spike()).to_vec();

        let types: Vec<AnomalyType> = anomalies.iter().map(|a| a.anomaly_type()).collect();
        assert!(types.contains(&AnomalyType::ZScoreOutlier));
        assert!(types.contains(&AnomalyType::RapidChange));
        assert!(types.contains(&AnomalyType::RedlineViolation));
        assert!(anomalies
            .windows(2)
            .all(|w| w[0].mission_time <= w[1].mission_time));

        let events = e.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].count, anomalies.len());

        let redline = e
            .filter(&AnomalyFilter {
                anomaly_type: Some(AnomalyType::RedlineViolation),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(redline.len(), 1);
        assert_eq!(redline[0].severity, Severity::Caution);
    }

    #[test]
    fn test_rerun_replaces_results() {
        let mut e = engine();
        let first = e.detect(&records_with_spike()).to_vec();
        let second = e.detect(&records_with_spike()).to_vec();
        assert_eq!(first, second);

        e.detect(&[]);
        assert!(e.anomalies().unwrap().is_empty());
        assert!(e.baselines().unwrap().is_empty());
    }
}
