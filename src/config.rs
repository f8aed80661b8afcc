//! TOML configuration for missionwatch.
//!
//! Holds the static redline table, the mission-event marker table, and the
//! detector tunables. Layered loading: `$MISSIONWATCH_CONFIG`, then
//! `./missionwatch.toml`, then compiled-in defaults.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MISSIONWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "missionwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default = "default_redlines")]
    pub redlines: BTreeMap<String, RedlineLimit>,
    #[serde(default = "default_mission_events")]
    pub mission_events: BTreeMap<String, f64>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            redlines: default_redlines(),
            mission_events: default_mission_events(),
        }
    }
}

impl MissionConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(
            path = %path.display(),
            redlines = config.redlines.len(),
            "loaded mission configuration"
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.detection.validate()?;
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in `MISSIONWATCH_CONFIG`.
    /// 2. `./missionwatch.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "MISSIONWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Detection tunables
// ---------------------------------------------------------------------------

/// Thresholds shared by the detectors. Defaults are the reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Flag a sample when |z| exceeds this.
    pub z_threshold: f64,
    /// Rate-of-change threshold as a multiple of the average step size.
    pub rate_multiplier: f64,
    /// Rolling window length, in samples, for sustained deviation.
    pub sustained_window: usize,
    /// Window-mean deviation, in baseline sigmas, that counts as sustained.
    pub sustained_sigma: f64,
    /// Fraction of a window that must hold valid readings.
    pub window_coverage: f64,
    /// Maximum distance, in seconds, from an event's start time.
    pub cluster_window_secs: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            rate_multiplier: 5.0,
            sustained_window: 20,
            sustained_sigma: 2.0,
            window_coverage: 0.8,
            cluster_window_secs: 10.0,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sustained_window == 0 {
            anyhow::bail!("detection.sustained_window must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.window_coverage) {
            anyhow::bail!(
                "detection.window_coverage must be within [0, 1], got {}",
                self.window_coverage
            );
        }
        for (name, v) in [
            ("z_threshold", self.z_threshold),
            ("rate_multiplier", self.rate_multiplier),
            ("sustained_sigma", self.sustained_sigma),
            ("cluster_window_secs", self.cluster_window_secs),
        ] {
            if !v.is_finite() || v < 0.0 {
                anyhow::bail!("detection.{name} must be a non-negative number, got {v}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Redlines
// ---------------------------------------------------------------------------

/// Static safe operating envelope for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedlineLimit {
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub label: String,
}

impl RedlineLimit {
    pub fn new(min: f64, max: f64, unit: &str, label: &str) -> Self {
        Self {
            min,
            max,
            unit: unit.to_string(),
            label: label.to_string(),
        }
    }
}

fn default_redlines() -> BTreeMap<String, RedlineLimit> {
    [
        ("chamber_pressure", RedlineLimit::new(200.0, 1500.0, "psi", "Chamber Pressure")),
        ("turbopump_speed", RedlineLimit::new(5000.0, 36000.0, "rpm", "Turbopump Speed")),
        ("lox_tank_pressure", RedlineLimit::new(30.0, 65.0, "psi", "LOX Tank Pressure")),
        ("fuel_tank_pressure", RedlineLimit::new(25.0, 60.0, "psi", "Fuel Tank Pressure")),
        ("engine_bay_temp", RedlineLimit::new(-40.0, 120.0, "degC", "Engine Bay Temperature")),
        ("vibration", RedlineLimit::new(0.0, 12.0, "g", "Vibration")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_mission_events() -> BTreeMap<String, f64> {
    [
        ("Liftoff", 0.0),
        ("Max-Q", 72.0),
        ("MECO", 162.0),
        ("Stage Separation", 165.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
