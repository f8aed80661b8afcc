//! Sample-to-sample jumps far above the parameter's typical step.

use tracing::debug;

use super::stats::round_report;
use super::{Anomaly, AnomalyKind, AnomalyType, DetectionContext, Detector, Severity};
use crate::telemetry::ObservationRecord;

fn calculate_severity(step: f64, threshold: f64) -> Severity {
    if step > 3.0 * threshold {
        Severity::Critical
    } else if step > 2.0 * threshold {
        Severity::Warning
    } else {
        Severity::Caution
    }
}

/// Consecutive valid readings of `parameter`, as
/// `(working-set index of the later one, previous, current)`.
///
/// Records without a reading are skipped, so a sparsely sampled parameter
/// still pairs its neighbouring readings.
fn valid_pairs(records: &[&ObservationRecord], parameter: &str) -> Vec<(usize, f64, f64)> {
    let readings: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.value(parameter).map(|v| (i, v)))
        .collect();
    readings
        .windows(2)
        .map(|pair| (pair[1].0, pair[0].1, pair[1].1))
        .collect()
}

/// Mean absolute step over valid consecutive pairs; zero when there are none.
pub fn average_step(records: &[&ObservationRecord], parameter: &str) -> f64 {
    let (sum, count) = valid_pairs(records, parameter)
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), (_, prev, cur)| (sum + (cur - prev).abs(), n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Flags steps larger than `rate_multiplier` times the average step.
pub struct RateOfChangeDetector;

impl Detector for RateOfChangeDetector {
    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::RapidChange
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for (name, limit) in ctx.redlines {
            let threshold = ctx.config.rate_multiplier * average_step(ctx.records, name);
            if threshold == 0.0 {
                debug!(parameter = %name, "zero rate-of-change threshold, skipping");
                continue;
            }

            for (index, prev, cur) in valid_pairs(ctx.records, name) {
                let step = (cur - prev).abs();
                if step <= threshold {
                    continue;
                }

                let description = format!(
                    "{} changed by {:.2} {} in one sample ({:.2} -> {:.2}), threshold {:.2}",
                    limit.label, step, limit.unit, prev, cur, threshold
                );
                anomalies.push(ctx.flag(
                    name,
                    limit,
                    index,
                    cur,
                    calculate_severity(step, threshold),
                    AnomalyKind::RapidChange {
                        previous: round_report(prev),
                        rate_of_change: round_report(step),
                        threshold: round_report(threshold),
                    },
                    description,
                ));
            }
        }

        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::{run_detector, series, single_limit};

    #[test]
    fn test_level_shift_flagged_once() {
        // Ramp of step 1 with a +21 jump at index 20.
        let values: Vec<f64> = (0..30)
            .map(|i| if i < 20 { i as f64 } else { i as f64 + 20.0 })
            .collect();
        let records = series("p", &values);
        let anomalies =
            run_detector(&RateOfChangeDetector, &records, &single_limit("p", -1e6, 1e6));

        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.sample_index, 20);
        assert_eq!(a.value, 40.0);
        // avg step 49/29, threshold ~8.45: 21 is above 2x but not 3x.
        assert_eq!(a.severity, Severity::Warning);
        match a.kind {
            AnomalyKind::RapidChange {
                previous,
                rate_of_change,
                threshold,
            } => {
                assert_eq!(previous, 19.0);
                assert_eq!(rate_of_change, 21.0);
                assert_eq!(threshold, 8.45);
            }
            ref other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_isolated_spike_is_critical_both_ways() {
        let mut values = vec![0.0; 100];
        values[50] = 100.0;
        let records = series("p", &values);
        let anomalies =
            run_detector(&RateOfChangeDetector, &records, &single_limit("p", -1e6, 1e6));

        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].sample_index, 50);
        assert_eq!(anomalies[1].sample_index, 51);
        assert!(anomalies.iter().all(|a| a.severity == Severity::Critical));
    }

    #[test]
    fn test_flat_series_skipped() {
        let records = series("p", &[42.0; 25]);
        let anomalies =
            run_detector(&RateOfChangeDetector, &records, &single_limit("p", -1e6, 1e6));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(calculate_severity(11.0, 10.0), Severity::Caution);
        assert_eq!(calculate_severity(20.0, 10.0), Severity::Caution);
        assert_eq!(calculate_severity(20.01, 10.0), Severity::Warning);
        assert_eq!(calculate_severity(30.0, 10.0), Severity::Warning);
        assert_eq!(calculate_severity(30.01, 10.0), Severity::Critical);
    }

    #[test]
    fn test_small_jump_is_caution() {
        // Ramp of step 1 with a single +10 jump at index 50.
        let values: Vec<f64> = (0..100)
            .map(|i| if i < 50 { i as f64 } else { i as f64 + 9.0 })
            .collect();
        let records = series("p", &values);
        let anomalies =
            run_detector(&RateOfChangeDetector, &records, &single_limit("p", -1e6, 1e6));

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].sample_index, 50);
        assert_eq!(anomalies[0].severity, Severity::Caution);
    }

    #[test]
    fn test_sparse_parameter_still_paired() {
        // Readings on even records only: 0, 2, 0, 2, ... with a spike at t=30.
        let records: Vec<ObservationRecord> = (0..60)
            .map(|i| {
                let r = ObservationRecord::new(i as f64);
                match i {
                    30 => r.with("p", 500.0),
                    i if i % 2 == 0 => r.with("p", if i % 4 == 0 { 0.0 } else { 2.0 }),
                    _ => r,
                }
            })
            .collect();
        let anomalies =
            run_detector(&RateOfChangeDetector, &records, &single_limit("p", -1e6, 1e6));

        let indices: Vec<usize> = anomalies.iter().map(|a| a.sample_index).collect();
        assert_eq!(indices, vec![30, 32]);
        // avg step 1054/29, threshold ~181.7: 500 is above 2x but not 3x.
        assert!(anomalies.iter().all(|a| a.severity == Severity::Warning));
        match anomalies[0].kind {
            AnomalyKind::RapidChange { previous, .. } => assert_eq!(previous, 0.0),
            ref other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_pairs_skip_gaps() {
        let records = series("p", &[1.0, f64::NAN, 5.0, 6.0]);
        let set: Vec<&ObservationRecord> = records.iter().collect();
        let pairs = valid_pairs(&set, "p");
        assert_eq!(pairs, vec![(2, 1.0, 5.0), (3, 5.0, 6.0)]);
        assert_eq!(average_step(&set, "p"), 2.5);
        assert_eq!(average_step(&set, "missing"), 0.0);
    }
}
