//! Gaussian z-score outliers against the run's baseline.

use tracing::debug;

use super::stats::round_report;
use super::{Anomaly, AnomalyKind, AnomalyType, DetectionContext, Detector, Severity};

fn calculate_severity(z_score: f64) -> Severity {
    if z_score > 5.0 {
        Severity::Critical
    } else if z_score > 4.0 {
        Severity::Warning
    } else {
        Severity::Caution
    }
}

/// Flags samples whose |value - mean| / std exceeds the z threshold.
pub struct ZScoreDetector;

impl Detector for ZScoreDetector {
    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::ZScoreOutlier
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Anomaly> {
        let threshold = ctx.config.z_threshold;
        let mut anomalies = Vec::new();

        for (name, limit, baseline) in ctx.with_baselines() {
            // Constant series: only the redline check applies.
            if !baseline.has_spread() {
                debug!(parameter = %name, "zero variance, skipping z-score");
                continue;
            }

            for (index, record) in ctx.records.iter().enumerate() {
                let Some(value) = record.value(name) else {
                    continue;
                };
                let z = (value - baseline.mean).abs() / baseline.std;
                if z <= threshold {
                    continue;
                }

                let description = format!(
                    "{} reading of {:.2} {} is {:.1} standard deviations from the mean of {:.2} {}",
                    limit.label, value, limit.unit, z, baseline.mean, limit.unit
                );
                anomalies.push(ctx.flag(
                    name,
                    limit,
                    index,
                    value,
                    calculate_severity(z),
                    AnomalyKind::ZScoreOutlier {
                        expected: round_report(baseline.mean),
                        z_score: round_report(z),
                    },
                    description,
                ));
            }
        }

        anomalies
    }
}
