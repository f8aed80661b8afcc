//! Grouping of time-sorted anomalies into events.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::detect::{Anomaly, AnomalyType, Severity};

/// A temporally clustered group of anomalies treated as one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Highest member severity.
    pub severity: Severity,
    pub anomalies: Vec<Anomaly>,
    /// Labels of the parameters involved.
    pub affected_parameters: BTreeSet<String>,
    pub anomaly_types: BTreeSet<AnomalyType>,
    pub count: usize,
}

impl Event {
    fn seed(id: String, first: &Anomaly) -> Self {
        Self {
            id,
            start_time: first.mission_time,
            end_time: first.mission_time,
            severity: first.severity,
            anomalies: Vec::new(),
            affected_parameters: BTreeSet::new(),
            anomaly_types: BTreeSet::new(),
            count: 0,
        }
    }

    fn absorb(&mut self, anomaly: &Anomaly) {
        self.end_time = self.end_time.max(anomaly.mission_time);
        self.severity = self.severity.max(anomaly.severity);
        self.affected_parameters.insert(anomaly.label.clone());
        self.anomaly_types.insert(anomaly.anomaly_type());
        self.anomalies.push(anomaly.clone());
        self.count += 1;
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Sequential event id: `EVT-001`, `EVT-002`, ...
pub fn event_id(n: usize) -> String {
    format!("EVT-{:03}", n)
}

/// Greedy clustering over anomalies sorted ascending by mission time.
///
/// Each unvisited anomaly seeds an event; every later unvisited anomaly within
/// `window_secs` of the seed's start time joins it. Distance is measured from
/// the start, not the latest member, so an event never drifts.
pub fn cluster(sorted: &[Anomaly], window_secs: f64) -> Vec<Event> {
    let mut visited = vec![false; sorted.len()];
    let mut events = Vec::new();

    for i in 0..sorted.len() {
        if visited[i] {
            continue;
        }
        let mut event = Event::seed(event_id(events.len() + 1), &sorted[i]);

        for j in i..sorted.len() {
            if visited[j] {
                continue;
            }
            if sorted[j].mission_time - event.start_time > window_secs {
                // Input is sorted: nothing later can fall inside the window.
                break;
            }
            visited[j] = true;
            event.absorb(&sorted[j]);
        }

        events.push(event);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::sample_anomaly;

    #[test]
    fn test_window_anchored_at_start() {
        let anomalies = vec![
            sample_anomaly(Severity::Caution, "a", 10.0),
            sample_anomaly(Severity::Warning, "b", 15.0),
            sample_anomaly(Severity::Caution, "a", 25.0),
        ];
        let events = cluster(&anomalies, 10.0);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "EVT-001");
        assert_eq!(events[0].count, 2);
        assert_eq!((events[0].start_time, events[0].end_time), (10.0, 15.0));
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].affected_parameters.len(), 2);

        assert_eq!(events[1].id, "EVT-002");
        assert_eq!(events[1].start_time, 25.0);
        assert_eq!(events[1].count, 1);
    }

    #[test]
    fn test_chain_does_not_drift() {
        // Each gap is under the window, but the chain spans more than it.
        let anomalies: Vec<Anomaly> = [0.0, 6.0, 12.0, 18.0]
            .iter()
            .map(|t| sample_anomaly(Severity::Caution, "a", *t))
            .collect();
        let events = cluster(&anomalies, 10.0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].count, 2);
        assert_eq!(events[1].start_time, 12.0);
        assert_eq!(events[1].end_time, 18.0);
    }

    #[test]
    fn test_inclusive_boundary_and_rollup() {
        let anomalies = vec![
            sample_anomaly(Severity::Caution, "a", 0.0),
            sample_anomaly(Severity::Critical, "a", 10.0),
            sample_anomaly(Severity::Warning, "a", 10.0),
        ];
        let events = cluster(&anomalies, 10.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Critical);
        assert_eq!(events[0].duration(), 10.0);
        assert_eq!(events[0].affected_parameters.len(), 1);
        assert_eq!(
            events[0].anomaly_types.iter().copied().collect::<Vec<_>>(),
            vec![AnomalyType::ZScoreOutlier]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster(&[], 10.0).is_empty());
    }

    #[test]
    fn test_event_ids() {
        assert_eq!(event_id(1), "EVT-001");
        assert_eq!(event_id(42), "EVT-042");
        assert_eq!(event_id(1234), "EVT-1234");
    }
}
