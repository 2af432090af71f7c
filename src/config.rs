//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::dispatch::policy::RampMode;

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Dispatchable unit parameters.
    #[serde(default)]
    pub unit: UnitConfig,
    /// Regulation participation and AGC signal parameters.
    #[serde(default)]
    pub regulation: RegulationConfig,
    /// Scheduled power targets (`[[targets]]` tables).
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Reserve activation requests (`[[reserve_calls]]` tables).
    #[serde(default)]
    pub reserve_calls: Vec<ReserveCallConfig>,
}

/// Simulation timing and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Time before the first step (seconds).
    pub start_time: f64,
    /// Step length (seconds, must be > 0).
    pub step_secs: f64,
    /// Number of steps to run (must be > 0).
    pub steps: usize,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            step_secs: 60.0,
            steps: 120,
            seed: 42,
        }
    }
}

/// Dispatchable unit parameters. Power is in MW, ramps in MW/s.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnitConfig {
    /// Output at `simulation.start_time`.
    pub initial_output: f64,
    /// Upward ramp limit.
    pub ramp_up: f64,
    /// Downward ramp limit (positive magnitude).
    pub ramp_down: f64,
    /// Minimum ramp duration for the midpoint and delayed modes (seconds).
    pub ramp_time: f64,
    /// Ramp mode name (`interp`, `midpoint`, `delayed`, `justintime`, `ontargetramp`).
    pub mode: String,
    pub power_min: f64,
    pub power_max: f64,
    /// Reserve headroom held available.
    pub reserve_available: f64,
    /// Time allowed to bring the reserve online (seconds).
    pub reserve_ramp_time: f64,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            initial_output: 50.0,
            ramp_up: 0.05,
            ramp_down: 0.05,
            ramp_time: 1200.0,
            mode: "interp".to_string(),
            power_min: 0.0,
            power_max: 100.0,
            reserve_available: 0.0,
            reserve_ramp_time: 900.0,
        }
    }
}

/// Regulation participation and AGC signal parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegulationConfig {
    /// Whether the unit participates in regulation.
    pub enabled: bool,
    /// Fraction of the rating held for upward regulation (0.0-1.0).
    pub up_fraction: f64,
    /// Fraction of the rating held for downward regulation (0.0-1.0).
    pub down_fraction: f64,
    /// Machine rating used as the per-unit base (MW).
    pub rating: f64,
    /// Regulation already delivered at start (MW).
    pub initial_level: f64,
    /// AGC sinusoid amplitude as a fraction of capacity (0.0-1.0).
    pub signal_amplitude: f64,
    /// AGC sinusoid period (seconds).
    pub signal_period_secs: f64,
    /// AR(1) correlation coefficient of the AGC noise (0.0-1.0).
    pub signal_alpha: f64,
    /// AR(1) innovation noise standard deviation.
    pub signal_noise_std: f64,
}

impl Default for RegulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            up_fraction: 0.0,
            down_fraction: 0.0,
            rating: 100.0,
            initial_level: 0.0,
            signal_amplitude: 0.8,
            signal_period_secs: 600.0,
            signal_alpha: 0.9,
            signal_noise_std: 0.2,
        }
    }
}

/// A scheduled power target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Time the target is due (seconds).
    pub time: f64,
    /// Power commanded (MW).
    pub power: f64,
}

/// A reserve activation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReserveCallConfig {
    /// Time the request is issued (seconds).
    pub time: f64,
    /// Reserve level requested (MW).
    pub level: f64,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.step_secs"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn targets(pairs: &[(f64, f64)]) -> Vec<TargetConfig> {
    pairs
        .iter()
        .map(|&(time, power)| TargetConfig { time, power })
        .collect()
}

impl ScenarioConfig {
    /// Returns the baseline scenario: interpolated ramps through three targets
    /// with a reserve call in between.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            unit: UnitConfig {
                reserve_available: 10.0,
                ..UnitConfig::default()
            },
            regulation: RegulationConfig::default(),
            targets: targets(&[(1800.0, 80.0), (3600.0, 40.0), (5400.0, 85.0)]),
            reserve_calls: vec![
                ReserveCallConfig {
                    time: 4200.0,
                    level: 6.0,
                },
                ReserveCallConfig {
                    time: 6000.0,
                    level: 0.0,
                },
            ],
        }
    }

    /// Returns the delayed preset: ramps at the limit, stretched to `ramp_time`.
    pub fn delayed() -> Self {
        Self {
            unit: UnitConfig {
                mode: "delayed".to_string(),
                ramp_time: 600.0,
                ..UnitConfig::default()
            },
            reserve_calls: Vec::new(),
            ..Self::baseline()
        }
    }

    /// Returns the midpoint preset: ramps centered between consecutive targets.
    pub fn midpoint() -> Self {
        Self {
            unit: UnitConfig {
                mode: "midpoint".to_string(),
                ramp_time: 900.0,
                ramp_up: 0.1,
                ramp_down: 0.1,
                ..UnitConfig::default()
            },
            reserve_calls: Vec::new(),
            ..Self::baseline()
        }
    }

    /// Returns the regulation preset: AGC participation on a faster step.
    pub fn regulation() -> Self {
        Self {
            simulation: SimulationConfig {
                step_secs: 4.0,
                steps: 1800,
                ..SimulationConfig::default()
            },
            unit: UnitConfig {
                ramp_up: 0.2,
                ramp_down: 0.2,
                ..UnitConfig::default()
            },
            regulation: RegulationConfig {
                enabled: true,
                up_fraction: 0.1,
                down_fraction: 0.1,
                signal_period_secs: 300.0,
                ..RegulationConfig::default()
            },
            targets: targets(&[(1800.0, 70.0), (5400.0, 45.0)]),
            reserve_calls: Vec::new(),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "delayed", "midpoint", "regulation"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "delayed" => Ok(Self::delayed()),
            "midpoint" => Ok(Self::midpoint()),
            "regulation" => Ok(Self::regulation()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed ramp mode.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on `unit.mode` if the name is not a known mode.
    pub fn ramp_mode(&self) -> Result<RampMode, ConfigError> {
        self.unit
            .mode
            .parse()
            .map_err(|e| ConfigError::new("unit.mode", format!("{e}")))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        if !(s.step_secs > 0.0 && s.step_secs.is_finite()) {
            errors.push(ConfigError::new("simulation.step_secs", "must be finite and > 0"));
        }
        if s.steps == 0 {
            errors.push(ConfigError::new("simulation.steps", "must be > 0"));
        }
        if !s.start_time.is_finite() {
            errors.push(ConfigError::new("simulation.start_time", "must be finite"));
        }

        let u = &self.unit;
        if let Err(e) = self.ramp_mode() {
            errors.push(e);
        }
        if u.ramp_up < 0.0 {
            errors.push(ConfigError::new("unit.ramp_up", "must be >= 0"));
        }
        if u.ramp_down < 0.0 {
            errors.push(ConfigError::new("unit.ramp_down", "must be >= 0 (a magnitude)"));
        }
        if u.ramp_time < 0.0 {
            errors.push(ConfigError::new("unit.ramp_time", "must be >= 0"));
        }
        if u.power_min > u.power_max {
            errors.push(ConfigError::new("unit.power_min", "must be <= unit.power_max"));
        }
        if u.reserve_available < 0.0 {
            errors.push(ConfigError::new("unit.reserve_available", "must be >= 0"));
        }
        if u.reserve_ramp_time <= 0.0 {
            errors.push(ConfigError::new("unit.reserve_ramp_time", "must be > 0"));
        }

        let r = &self.regulation;
        for (field, value) in [
            ("regulation.up_fraction", r.up_fraction),
            ("regulation.down_fraction", r.down_fraction),
            ("regulation.signal_amplitude", r.signal_amplitude),
            ("regulation.signal_alpha", r.signal_alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
            }
        }
        if r.rating <= 0.0 {
            errors.push(ConfigError::new("regulation.rating", "must be > 0"));
        }
        if r.signal_noise_std < 0.0 {
            errors.push(ConfigError::new("regulation.signal_noise_std", "must be >= 0"));
        }

        for (i, t) in self.targets.iter().enumerate() {
            if !(t.time.is_finite() && t.power.is_finite()) {
                errors.push(ConfigError::new(
                    format!("targets[{i}]"),
                    "time and power must be finite",
                ));
            }
        }
        if self.targets.windows(2).any(|w| w[0].time > w[1].time) {
            errors.push(ConfigError::new("targets", "must be sorted by time"));
        }

        for (i, c) in self.reserve_calls.iter().enumerate() {
            if !c.time.is_finite() {
                errors.push(ConfigError::new(format!("reserve_calls[{i}].time"), "must be finite"));
            }
            if c.level < 0.0 {
                errors.push(ConfigError::new(format!("reserve_calls[{i}].level"), "must be >= 0"));
            }
        }

        errors
    }
}
