//! Regulation (AGC) overlay on top of a [`RampEngine`].
//!
//! A unit that participates in regulation reserves part of its capacity and
//! ramp capability for a fast secondary signal. While regulation is enabled
//! the wrapped engine dispatches inside a shrunk envelope:
//!
//! - `power_max = regulation_max - up_fraction * base`
//! - `power_min = regulation_min + down_fraction * base`
//! - `ramp_up   = regulation_ramp_up - up_fraction * base / 600`
//! - `ramp_down = regulation_ramp_down - down_fraction * base / 600`
//!
//! and the layer adds its own bounded ramp toward the regulation command.
//! The regulation component is never integrated on its own; after every step
//! it is re-derived as `total_output - committed_power - reserve_realized`.

use tracing::{debug, warn};

use super::aggregator::{AgcHandle, UnitId};
use super::engine::{DispatchSnapshot, RampEngine};
use super::message::{ControlMessage, MessageOutcome};
use super::options::{ParamError, RampOption, RegulationOption};
use super::policy::RampMode;
use super::target::TargetRecord;

/// Window over which regulation capacity must be deliverable (seconds).
pub const REGULATION_WINDOW_SECS: f64 = 600.0;

const DEFAULT_RATING: f64 = 100.0;

/// A [`RampEngine`] with an AGC regulation layer.
///
/// Created with [`RegulationLayer::new`] or [`RegulationLayer::from_engine`];
/// the unshrunk limits are the envelope the unit physically has, the wrapped
/// engine sees the shrunk one whenever regulation is enabled.
#[derive(Debug)]
pub struct RegulationLayer {
    id: UnitId,
    engine: RampEngine,

    regulation_current: f64,
    regulation_target: f64,
    reg_up_fraction: f64,
    reg_down_fraction: f64,
    regulation_max: f64,
    regulation_min: f64,
    regulation_ramp_up: f64,
    regulation_ramp_down: f64,
    regulation_enabled: bool,
    rating: f64,

    aggregator: Option<AgcHandle>,
    registered: bool,
}

impl RegulationLayer {
    /// Creates a layer around a fresh engine delivering `initial_output`.
    ///
    /// The engine's `ramp_time` is set to the regulation window.
    pub fn new(id: UnitId, initial_output: f64) -> Self {
        let mut engine = RampEngine::with_output(initial_output);
        engine.set(RampOption::RampTime, REGULATION_WINDOW_SECS);
        Self::from_engine(id, engine)
    }

    /// Wraps an existing engine, adopting its current limits as the unit's
    /// unshrunk envelope.
    pub fn from_engine(id: UnitId, engine: RampEngine) -> Self {
        Self {
            id,
            regulation_max: engine.power_max(),
            regulation_min: engine.power_min(),
            regulation_ramp_up: engine.ramp_up(),
            regulation_ramp_down: engine.ramp_down(),
            engine,
            regulation_current: 0.0,
            regulation_target: 0.0,
            reg_up_fraction: 0.0,
            reg_down_fraction: 0.0,
            regulation_enabled: false,
            rating: DEFAULT_RATING,
            aggregator: None,
            registered: false,
        }
    }

    /// Attaches the aggregator handle used for registration and notifications.
    pub fn with_aggregator(mut self, handle: AgcHandle) -> Self {
        self.set_aggregator(Some(handle));
        self
    }

    /// Replaces the aggregator handle, moving any registration to the new one.
    ///
    /// A unit with regulation enabled registers with the new aggregator even
    /// if it had no handle before.
    pub fn set_aggregator(&mut self, handle: Option<AgcHandle>) {
        let was_registered = self.registered;
        self.deregister();
        self.aggregator = handle;
        if was_registered || self.regulation_enabled {
            self.register();
        }
    }

    /// Prepares the unit to be stepped from `time0`.
    pub fn initialize(&mut self, time0: f64) {
        self.engine.initialize(time0);
        if self.reg_up_fraction > 0.0 || self.reg_down_fraction > 0.0 {
            self.register();
        }
    }

    /// Like [`initialize`](Self::initialize), starting with `level` of
    /// regulation already delivered.
    pub fn initialize_with_regulation(&mut self, time0: f64, level: f64) {
        self.initialize(time0);
        let level = self.clamp_regulation(level);
        self.regulation_current = level;
        self.regulation_target = level;
        let total = self.base_output() + level;
        let derivative = self.engine.output_derivative();
        self.engine.overlay_output(total, derivative);
    }

    /// Deregisters from the aggregator and empties the schedule.
    pub fn teardown(&mut self) {
        self.deregister();
        self.engine.clear_schedule();
    }

    /// Commands a regulation level, limited to the unit's participation band.
    pub fn set_regulation(&mut self, level: f64) {
        self.regulation_target = self.clamp_regulation(level);
    }

    /// Changes participation.
    ///
    /// `up` and `down` replace the fractions of the base held for upward and
    /// downward regulation; when only `up` is given it applies to both
    /// directions. Fractions are limited to `[0, 1]`.
    pub fn regulation_settings(&mut self, active: bool, up: Option<f64>, down: Option<f64>) {
        if let Some(up) = up {
            self.reg_up_fraction = up.clamp(0.0, 1.0);
            self.reg_down_fraction = down.unwrap_or(up).clamp(0.0, 1.0);
        } else if let Some(down) = down {
            self.reg_down_fraction = down.clamp(0.0, 1.0);
        }

        let was_enabled = self.regulation_enabled;
        self.regulation_enabled = active;
        self.apply_envelope();
        if active && !was_enabled {
            self.register();
        } else if !active && was_enabled {
            self.deregister();
        }
        debug!(
            unit = %self.id,
            active,
            up = self.reg_up_fraction,
            down = self.reg_down_fraction,
            "regulation settings changed"
        );
        self.notify();
    }

    /// Per-unit base the participation fractions are scaled by.
    pub fn regulation_base(&self) -> f64 {
        if self.rating.is_finite() {
            self.rating
        } else if self.regulation_max.is_finite() {
            self.regulation_max
        } else {
            0.0
        }
    }

    /// Upward regulation still available beyond the current level.
    pub fn regulation_up_available(&self) -> f64 {
        if self.regulation_enabled {
            (self.reg_up_fraction * self.regulation_base() - self.regulation_current).max(0.0)
        } else {
            0.0
        }
    }

    /// Downward regulation still available below the current level.
    pub fn regulation_down_available(&self) -> f64 {
        if self.regulation_enabled {
            (self.reg_down_fraction * self.regulation_base() + self.regulation_current).max(0.0)
        } else {
            0.0
        }
    }

    fn clamp_regulation(&self, level: f64) -> f64 {
        let base = self.regulation_base();
        level
            .min(self.reg_up_fraction * base)
            .max(-self.reg_down_fraction * base)
    }

    fn effective_regulation_target(&self) -> f64 {
        if self.regulation_enabled {
            self.regulation_target
        } else {
            0.0
        }
    }

    /// Pushes the shrunk (or unshrunk) envelope into the engine and re-plans.
    fn apply_envelope(&mut self) {
        self.regulation_target = self.clamp_regulation(self.regulation_target);
        if self.regulation_enabled {
            let base = self.regulation_base();
            let up = self.reg_up_fraction * base;
            let down = self.reg_down_fraction * base;
            self.engine.set_envelope(
                self.regulation_min + down,
                self.regulation_max - up,
                self.regulation_ramp_up - up / REGULATION_WINDOW_SECS,
                self.regulation_ramp_down - down / REGULATION_WINDOW_SECS,
            );
        } else {
            self.engine.set_envelope(
                self.regulation_min,
                self.regulation_max,
                self.regulation_ramp_up,
                self.regulation_ramp_down,
            );
        }
        self.engine.replan();
    }

    fn register(&mut self) {
        if self.registered {
            return;
        }
        match self.aggregator.as_ref().and_then(|h| h.upgrade()) {
            Some(agc) => {
                agc.register(self.id);
                self.registered = true;
                debug!(unit = %self.id, "registered with AGC");
            }
            None => {
                if self.aggregator.is_some() {
                    warn!(unit = %self.id, "AGC aggregator is gone, not registering");
                }
            }
        }
    }

    fn deregister(&mut self) {
        if !self.registered {
            return;
        }
        if let Some(agc) = self.aggregator.as_ref().and_then(|h| h.upgrade()) {
            agc.deregister(self.id);
            debug!(unit = %self.id, "deregistered from AGC");
        }
        self.registered = false;
    }

    fn notify(&self) {
        if let Some(agc) = self.aggregator.as_ref().and_then(|h| h.upgrade()) {
            agc.regulation_changed(self.id);
        }
    }

    /// Advances the unit to `time`, then moves the output toward the
    /// regulation command within the unshrunk ramp and power limits.
    pub fn advance(&mut self, time: f64) {
        let dt = time - self.engine.previous_time();
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let prev_output = self.engine.total_output();
        let prev_base = self.base_output();

        self.engine.advance(time);

        let base = self.base_output();
        let rate = self.regulation_rate(self.regulation_current, (base - prev_base) / dt, dt);
        let total = self.clamp_output(prev_output + rate * dt);
        self.engine.overlay_output(total, rate);
        self.regulation_current = total - base;
    }

    /// Output expected at `time` if nothing changes. Never mutates.
    pub fn predict(&self, time: f64) -> f64 {
        let dt = time - self.engine.previous_time();
        if dt.is_nan() || dt <= 0.0 {
            return self.engine.total_output();
        }
        let prev_base = self.base_output();
        let base = self.engine.predict(time) - self.regulation_current;
        let rate = self.regulation_rate(self.regulation_current, (base - prev_base) / dt, dt);
        self.clamp_output(self.engine.total_output() + rate * dt)
    }

    fn regulation_rate(&self, current: f64, base_slope: f64, dt: f64) -> f64 {
        ((self.effective_regulation_target() - current) / dt + base_slope)
            .min(self.regulation_ramp_up)
            .max(-self.regulation_ramp_down)
    }

    fn clamp_output(&self, output: f64) -> f64 {
        output.min(self.regulation_max).max(self.regulation_min)
    }

    fn base_output(&self) -> f64 {
        self.engine.committed_power() + self.engine.reserve_realized()
    }

    pub fn insert_target(&mut self, record: TargetRecord) {
        self.engine.insert_target(record);
    }

    pub fn set_target(&mut self, power: f64) {
        self.engine.set_target(power);
    }

    pub fn set_target_at(&mut self, time: f64, power: f64) {
        self.engine.set_target_at(time, power);
    }

    pub fn set_targets(&mut self, times: &[f64], powers: &[f64]) {
        self.engine.set_targets(times, powers);
    }

    pub fn clear_schedule(&mut self) {
        self.engine.clear_schedule();
    }

    pub fn set_reserve_target(&mut self, level: f64) {
        self.engine.set_reserve_target(level);
    }

    pub fn set_mode(&mut self, mode: RampMode) {
        self.engine.set_mode(mode);
    }

    /// Applies a numeric option; limit options address the unshrunk envelope.
    pub fn set(&mut self, option: RegulationOption, value: f64) {
        match option {
            RegulationOption::Max => self.regulation_max = value,
            RegulationOption::Min => self.regulation_min = value,
            RegulationOption::Ramp => {
                self.regulation_ramp_up = value;
                self.regulation_ramp_down = value.abs();
            }
            RegulationOption::RampUp => self.regulation_ramp_up = value,
            RegulationOption::RampDown => self.regulation_ramp_down = value.abs(),
            RegulationOption::Rating => self.rating = value,
            RegulationOption::RegFrac => {
                return self.regulation_settings(self.regulation_enabled, Some(value), None);
            }
            RegulationOption::RegUpFrac => {
                let down = self.reg_down_fraction;
                return self.regulation_settings(self.regulation_enabled, Some(value), Some(down));
            }
            RegulationOption::RegDownFrac => {
                return self.regulation_settings(self.regulation_enabled, None, Some(value));
            }
            RegulationOption::RegEnabled => {
                return self.regulation_settings(value > 0.0, None, None);
            }
            RegulationOption::Engine(option) => return self.engine.set(option, value),
        }
        self.apply_envelope();
        self.notify();
    }

    /// Applies a numeric option by key.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnknownOption`] when neither the layer nor the
    /// engine knows `key`.
    pub fn set_option(&mut self, key: &str, value: f64) -> Result<(), ParamError> {
        let option = key.parse()?;
        self.set(option, value);
        Ok(())
    }

    /// See [`RampEngine::set_mode_str`].
    ///
    /// # Errors
    ///
    /// Propagates the engine's error for unknown keys or mode names.
    pub fn set_mode_str(&mut self, key: &str, value: &str) -> Result<(), ParamError> {
        self.engine.set_mode_str(key, value)
    }

    /// Reads a numeric option by key.
    ///
    /// `max` and `min` report the power limits base dispatch is held to,
    /// which are narrower than the unit's physical limits while regulating.
    /// The ramp keys report the unshrunk regulation ramps.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnknownOption`] if `key` is not readable.
    pub fn get(&self, key: &str) -> Result<f64, ParamError> {
        match key {
            "max" => Ok(self.engine.power_max()),
            "min" => Ok(self.engine.power_min()),
            "rampup" => Ok(self.regulation_ramp_up),
            "rampdown" => Ok(self.regulation_ramp_down),
            "rating" | "base" => Ok(self.rating),
            "regupfrac" => Ok(self.reg_up_fraction),
            "regdownfrac" => Ok(self.reg_down_fraction),
            "regenabled" => Ok(if self.regulation_enabled { 1.0 } else { 0.0 }),
            other => self.engine.get(other),
        }
    }

    pub fn receive_message(&mut self, message: &ControlMessage) -> MessageOutcome {
        match message {
            ControlMessage::UpdateRegulationTarget { level } => {
                debug!(unit = %self.id, level, "regulation target received");
                self.set_regulation(*level);
                MessageOutcome::Applied
            }
            other => self.engine.receive_message(other),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn engine(&self) -> &RampEngine {
        &self.engine
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        self.engine.snapshot()
    }

    pub fn total_output(&self) -> f64 {
        self.engine.total_output()
    }

    pub fn regulation_current(&self) -> f64 {
        self.regulation_current
    }

    pub fn regulation_target(&self) -> f64 {
        self.regulation_target
    }

    pub fn reg_up_fraction(&self) -> f64 {
        self.reg_up_fraction
    }

    pub fn reg_down_fraction(&self) -> f64 {
        self.reg_down_fraction
    }

    pub fn regulation_enabled(&self) -> bool {
        self.regulation_enabled
    }

    pub fn regulation_max(&self) -> f64 {
        self.regulation_max
    }

    pub fn regulation_min(&self) -> f64 {
        self.regulation_min
    }

    pub fn regulation_ramp_up(&self) -> f64 {
        self.regulation_ramp_up
    }

    pub fn regulation_ramp_down(&self) -> f64 {
        self.regulation_ramp_down
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl Drop for RegulationLayer {
    fn drop(&mut self) {
        self.deregister();
    }
}
