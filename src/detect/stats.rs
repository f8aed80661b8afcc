//! Per-parameter baselines over the working set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::telemetry::ObservationRecord;

/// Decimal places kept on reported figures.
pub const REPORT_DECIMALS: i32 = 2;

/// A simple series of finite samples for one parameter.
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Collect the finite readings of `parameter` from the working set.
    pub fn from_records(records: &[&ObservationRecord], parameter: &str) -> Self {
        Self::new(records.iter().filter_map(|r| r.value(parameter)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance: Σ(x - mean)² / n.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq_diff: f64 = self.values.iter().map(|&x| (x - mean).powi(2)).sum();
        sum_sq_diff / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Mean, population std, min and max of one parameter's valid samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBaseline {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl ParameterBaseline {
    /// None when the series holds no valid samples.
    pub fn from_series(series: &TimeSeries) -> Option<Self> {
        if series.is_empty() {
            return None;
        }
        Some(Self {
            mean: series.mean(),
            std: series.std_dev(),
            min: series.min(),
            max: series.max(),
            samples: series.len(),
        })
    }

    /// Baselines with zero spread cannot normalize a deviation.
    pub fn has_spread(&self) -> bool {
        self.std > 0.0
    }
}

/// Compute baselines for every monitored parameter that has at least one
/// valid sample. Parameters with none are absent from the result.
pub fn compute_baselines<'a>(
    records: &[&ObservationRecord],
    parameters: impl IntoIterator<Item = &'a String>,
) -> BTreeMap<String, ParameterBaseline> {
    let mut baselines = BTreeMap::new();
    for name in parameters {
        let series = TimeSeries::from_records(records, name);
        match ParameterBaseline::from_series(&series) {
            Some(b) => {
                baselines.insert(name.clone(), b);
            }
            None => debug!(parameter = %name, "no valid samples, skipping baseline"),
        }
    }
    baselines
}

/// Round to a fixed number of decimal places for reporting.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to [`REPORT_DECIMALS`].
pub fn round_report(value: f64) -> f64 {
    round_to(value, REPORT_DECIMALS)
}

/// Serde codec for figures that may be non-finite. JSON has no literal for
/// infinity or NaN, so those are written as the strings `"inf"`, `"-inf"`
/// and `"NaN"` and read back the same way.
pub mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number, \"inf\", \"-inf\" or \"NaN\", got \"{other}\""
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let ts = TimeSeries::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ts.mean(), 3.0);
        // Population variance of 1..5 is 2.0
        assert_eq!(ts.variance(), 2.0);
        assert!((ts.std_dev() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(ts.min(), 1.0);
        assert_eq!(ts.max(), 5.0);
    }

    #[test]
    fn test_baselines_skip_invalid_and_missing() {
        let records = vec![
            ObservationRecord::new(0.0).with("a", 10.0).with("b", f64::NAN),
            ObservationRecord::new(1.0).with("a", 20.0),
            ObservationRecord::new(2.0).with("a", f64::INFINITY),
        ];
        let refs: Vec<&ObservationRecord> = records.iter().collect();
        let params = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let baselines = compute_baselines(&refs, &params);

        assert_eq!(baselines.len(), 1);
        let a = baselines["a"];
        assert_eq!(a.mean, 15.0);
        assert_eq!(a.std, 5.0);
        assert_eq!((a.min, a.max), (10.0, 20.0));
        assert_eq!(a.samples, 2);
    }

    #[test]
    fn test_constant_series_has_no_spread() {
        let b = ParameterBaseline::from_series(&TimeSeries::new(vec![7.0; 10])).unwrap();
        assert_eq!(b.std, 0.0);
        assert!(!b.has_spread());
        assert!(ParameterBaseline::from_series(&TimeSeries::new(vec![])).is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(5.5849, 2), 5.58);
        assert_eq!(round_to(-1.005, 1), -1.0);
        assert_eq!(round_report(102.666_666), 102.67);
    }
}
