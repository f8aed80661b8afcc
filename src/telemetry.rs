//! Observation records and the working set the detectors run over.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One uniformly-sampled telemetry frame: parameter readings at a mission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct ObservationRecord {
    /// Seconds since the mission reference epoch. NaN when the source had none.
    pub mission_time: f64,
    /// Optional flight phase label (e.g. "ascent").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Numeric readings keyed by parameter name.
    pub values: BTreeMap<String, f64>,
}

impl ObservationRecord {
    pub fn new(mission_time: f64) -> Self {
        Self {
            mission_time,
            phase: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, parameter: &str, value: f64) -> Self {
        self.values.insert(parameter.to_string(), value);
        self
    }

    pub fn with_phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    /// The reading for `parameter`, only if it is a finite number.
    pub fn value(&self, parameter: &str) -> Option<f64> {
        self.values
            .get(parameter)
            .copied()
            .filter(|v| v.is_finite())
    }

    /// True when the mission time is a usable, non-negative number.
    pub fn has_valid_time(&self) -> bool {
        self.mission_time.is_finite() && self.mission_time >= 0.0
    }
}

/// Wire shape produced by the ingestion side. Type coercion has already
/// happened upstream; anything that is still not a number is dropped here.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, alias = "missionTime")]
    mission_time: Option<serde_json::Value>,
    #[serde(default)]
    phase: Option<serde_json::Value>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl From<RawRecord> for ObservationRecord {
    fn from(raw: RawRecord) -> Self {
        let mission_time = raw
            .mission_time
            .as_ref()
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(f64::NAN);

        let values = match raw.rest.get("values") {
            // Re-serialized records nest readings under "values".
            Some(serde_json::Value::Object(map)) => numeric_entries(map.iter()),
            _ => numeric_entries(raw.rest.iter()),
        };

        Self {
            mission_time,
            phase: raw
                .phase
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            values,
        }
    }
}

fn numeric_entries<'a>(
    entries: impl Iterator<Item = (&'a String, &'a serde_json::Value)>,
) -> BTreeMap<String, f64> {
    entries
        .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
        .collect()
}

/// Records whose mission time is a valid non-negative number, in input order.
///
/// Every detector sees this slice and nothing else; sample indices reported
/// on anomalies are positions in it.
pub fn working_set(records: &[ObservationRecord]) -> Vec<&ObservationRecord> {
    let set: Vec<&ObservationRecord> = records.iter().filter(|r| r.has_valid_time()).collect();
    let dropped = records.len() - set.len();
    if dropped > 0 {
        warn!(dropped, "dropped records without a valid mission time");
    }
    set
}

/// Load a JSON array of observation records.
pub fn load_records(path: &Path) -> Result<Vec<ObservationRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read telemetry file: {}", path.display()))?;
    let records: Vec<ObservationRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse telemetry file: {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "loaded telemetry");
    Ok(records)
}
