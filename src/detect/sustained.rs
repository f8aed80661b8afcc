//! Rolling-window drift away from the baseline mean.

use tracing::debug;

use super::stats::round_report;
use super::{Anomaly, AnomalyKind, AnomalyType, DetectionContext, Detector, Severity};
use crate::telemetry::ObservationRecord;

fn calculate_severity(deviation: f64) -> Severity {
    if deviation > 4.0 {
        Severity::Critical
    } else if deviation > 3.0 {
        Severity::Warning
    } else {
        Severity::Caution
    }
}

/// Mean of the valid readings in `window`, or None when fewer than
/// `min_valid` of them are usable.
pub fn window_mean(window: &[&ObservationRecord], parameter: &str, min_valid: f64) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .filter_map(|r| r.value(parameter))
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 || (count as f64) < min_valid {
        return None;
    }
    Some(sum / count as f64)
}

/// Flags windows of `sustained_window` samples whose mean sits more than
/// `sustained_sigma` baseline deviations from the baseline mean.
///
/// The window preceding index `i` is `[i - W, i)`; the flag is raised on
/// record `i`. One excursion yields one flag: a candidate closer than `W`
/// samples to the last flag for the same parameter is dropped.
pub struct SustainedDeviationDetector;

impl Detector for SustainedDeviationDetector {
    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::SustainedDeviation
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Anomaly> {
        let w = ctx.config.sustained_window;
        let min_valid = ctx.config.window_coverage * w as f64;
        let mut anomalies = Vec::new();

        for (name, limit, baseline) in ctx.with_baselines() {
            if !baseline.has_spread() {
                debug!(parameter = %name, "zero variance, skipping sustained deviation");
                continue;
            }

            let mut last_flagged: Option<usize> = None;
            for i in w..ctx.records.len() {
                let Some(mean) = window_mean(&ctx.records[i - w..i], name, min_valid) else {
                    continue;
                };
                let deviation = (mean - baseline.mean).abs() / baseline.std;
                if deviation <= ctx.config.sustained_sigma {
                    continue;
                }
                if last_flagged.is_some_and(|last| i - last < w) {
                    continue;
                }
                last_flagged = Some(i);

                let description = format!(
                    "{} {}-sample mean of {:.2} {} is {:.1} standard deviations from the baseline of {:.2} {}",
                    limit.label, w, mean, limit.unit, deviation, baseline.mean, limit.unit
                );
                anomalies.push(ctx.flag(
                    name,
                    limit,
                    i,
                    mean,
                    calculate_severity(deviation),
                    AnomalyKind::SustainedDeviation {
                        window_mean: round_report(mean),
                        baseline_mean: round_report(baseline.mean),
                        deviation_sigma: round_report(deviation),
                        window: w,
                    },
                    description,
                ));
            }
        }

        anomalies
    }
}
