//! Static safe-envelope violations. Needs no baseline.

use super::stats::round_report;
use super::{Anomaly, AnomalyKind, AnomalyType, DetectionContext, Detector, Direction, Severity};
use crate::config::RedlineLimit;

fn calculate_severity(percent_over: f64) -> Severity {
    if percent_over > 10.0 {
        Severity::Critical
    } else if percent_over > 5.0 {
        Severity::Warning
    } else {
        Severity::Caution
    }
}

/// A single envelope breach, before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub direction: Direction,
    pub limit: f64,
    pub exceedance: f64,
    pub percent_over: f64,
}

/// Compare one value against its envelope.
///
/// Percent-over divides by the magnitude of the crossed limit itself, so a
/// limit at or near zero yields an infinite or inflated percentage.
pub fn check(value: f64, limit: &RedlineLimit) -> Option<Violation> {
    let (direction, bound, exceedance) = if value > limit.max {
        (Direction::High, limit.max, value - limit.max)
    } else if value < limit.min {
        (Direction::Low, limit.min, limit.min - value)
    } else {
        return None;
    };
    Some(Violation {
        direction,
        limit: bound,
        exceedance,
        percent_over: 100.0 * exceedance / bound.abs(),
    })
}

/// Flags every valid sample outside its configured `{min, max}`.
pub struct RedlineDetector;

impl Detector for RedlineDetector {
    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::RedlineViolation
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for (name, limit) in ctx.redlines {
            for (index, record) in ctx.records.iter().enumerate() {
                let Some(value) = record.value(name) else {
                    continue;
                };
                let Some(v) = check(value, limit) else {
                    continue;
                };

                let description = format!(
                    "{} {} redline: {:.2} {} against limit {:.2} {} ({:.1}% beyond)",
                    limit.label, v.direction, value, limit.unit, v.limit, limit.unit, v.percent_over
                );
                anomalies.push(ctx.flag(
                    name,
                    limit,
                    index,
                    value,
                    calculate_severity(v.percent_over),
                    AnomalyKind::RedlineViolation {
                        direction: v.direction,
                        limit: v.limit,
                        exceedance: round_report(v.exceedance),
                        percent_over: round_report(v.percent_over),
                    },
                    description,
                ));
            }
        }

        anomalies
    }
}
