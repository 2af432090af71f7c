//! Simulation driver that steps one dispatchable unit through a scenario.

use std::rc::Rc;

use tracing::{debug, info};

use crate::config::{ConfigError, ScenarioConfig};
use crate::dispatch::aggregator::{AgcRoster, UnitId};
use crate::dispatch::engine::RampEngine;
use crate::dispatch::message::ControlMessage;
use crate::dispatch::options::{RampOption, RegulationOption};
use crate::dispatch::regulation::RegulationLayer;

use super::clock::Clock;
use super::signal::RegulationSignal;
use super::types::StepResult;

/// Slack allowed when checking the observed ramp against the limits (MW/s).
const RAMP_CHECK_TOLERANCE: f64 = 1e-6;

/// Source id the simulation registers with the unit as its dispatcher.
const HARNESS_DISPATCHER_ID: u64 = 0;

/// A reserve activation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReserveCall {
    pub time: f64,
    pub level: f64,
}

/// Simulation owning the unit, its AGC roster and the scenario drivers.
///
/// Scheduled targets are handed to the unit up front as an add-targets
/// message. Reserve calls and AGC commands are delivered as messages at the
/// start of the first step whose start time is at or after the call time.
pub struct Simulation {
    unit: RegulationLayer,
    roster: Rc<AgcRoster>,
    clock: Clock,
    signal: Option<RegulationSignal>,
    reserve_calls: Vec<ReserveCall>,
    next_call: usize,
    last_command: f64,
}

impl Simulation {
    /// Creates a simulation around an already configured unit.
    ///
    /// The unit is initialized at the clock's start time. `reserve_calls`
    /// are sorted by time.
    ///
    /// # Arguments
    ///
    /// * `unit` - Unit to drive; it is attached to a fresh AGC roster
    /// * `clock` - Step schedule
    /// * `signal` - AGC command source, if the unit regulates
    /// * `reserve_calls` - Reserve activation requests
    /// * `initial_regulation` - Regulation already delivered at start
    pub fn new(
        unit: RegulationLayer,
        clock: Clock,
        signal: Option<RegulationSignal>,
        mut reserve_calls: Vec<ReserveCall>,
        initial_regulation: f64,
    ) -> Self {
        let roster = Rc::new(AgcRoster::new());
        let mut unit = unit.with_aggregator(AgcRoster::handle(&roster));
        unit.receive_message(&ControlMessage::RegisterDispatcher {
            source: HARNESS_DISPATCHER_ID,
        });
        unit.initialize_with_regulation(clock.start_time(), initial_regulation);
        reserve_calls.sort_by(|a, b| a.time.total_cmp(&b.time));

        Self {
            unit,
            roster,
            clock,
            signal,
            reserve_calls,
            next_call: 0,
            last_command: initial_regulation,
        }
    }

    /// Builds the unit and scenario drivers from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the ramp mode name is unknown. Other
    /// constraints are checked by [`ScenarioConfig::validate`].
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self, ConfigError> {
        let mode = cfg.ramp_mode()?;
        let u = &cfg.unit;

        let mut engine = RampEngine::with_output(u.initial_output);
        engine.set_mode(mode);
        engine.set(RampOption::RampUp, u.ramp_up);
        engine.set(RampOption::RampDown, u.ramp_down);
        engine.set(RampOption::RampTime, u.ramp_time);
        engine.set(RampOption::Min, u.power_min);
        engine.set(RampOption::Max, u.power_max);
        engine.set(RampOption::ReserveRampTime, u.reserve_ramp_time);
        engine.set(RampOption::Reserve, u.reserve_available);

        let r = &cfg.regulation;
        let mut unit = RegulationLayer::from_engine(UnitId(1), engine);
        unit.set(RegulationOption::Rating, r.rating);
        unit.regulation_settings(r.enabled, Some(r.up_fraction), Some(r.down_fraction));

        let times: Vec<f64> = cfg.targets.iter().map(|t| t.time).collect();
        let powers: Vec<f64> = cfg.targets.iter().map(|t| t.power).collect();
        unit.receive_message(&ControlMessage::AddTargets { times, powers });

        let s = &cfg.simulation;
        let clock = Clock::new(s.start_time, s.step_secs, s.steps);
        let signal = r.enabled.then(|| {
            RegulationSignal::new(
                r.signal_amplitude,
                r.signal_period_secs,
                r.signal_alpha,
                r.signal_noise_std,
                s.seed,
            )
        });
        let reserve_calls = cfg
            .reserve_calls
            .iter()
            .map(|c| ReserveCall {
                time: c.time,
                level: c.level,
            })
            .collect();

        Ok(Self::new(unit, clock, signal, reserve_calls, r.initial_level))
    }

    /// Executes one step ending at `time` and returns its record.
    pub fn step(&mut self, step: usize, time: f64) -> StepResult {
        let start = self.unit.engine().previous_time();
        let prev_output = self.unit.total_output();

        self.deliver_reserve_calls(start);
        if let Some(signal) = self.signal.as_mut() {
            let command = signal.next_command(start);
            let fraction = if command >= 0.0 {
                self.unit.reg_up_fraction()
            } else {
                self.unit.reg_down_fraction()
            };
            let capacity = fraction * self.unit.regulation_base();
            self.unit.receive_message(&ControlMessage::UpdateRegulationTarget {
                level: command * capacity,
            });
            self.last_command = self.unit.regulation_target();
        }

        let consumed_before = self.unit.engine().targets_consumed();
        self.unit.advance(time);

        let engine = self.unit.engine();
        let dt = time - start;
        let output = self.unit.total_output();
        let ramp_rate = if dt > 0.0 { (output - prev_output) / dt } else { 0.0 };
        let within_ramp_limits = ramp_rate <= self.unit.regulation_ramp_up() + RAMP_CHECK_TOLERANCE
            && ramp_rate >= -self.unit.regulation_ramp_down() - RAMP_CHECK_TOLERANCE;

        StepResult {
            step,
            time,
            target: engine.target(),
            committed: engine.committed_power(),
            reserve: engine.reserve_realized(),
            regulation_command: self.last_command,
            regulation: self.unit.regulation_current(),
            output,
            ramp_rate,
            within_ramp_limits,
            targets_consumed: engine.targets_consumed() - consumed_before,
        }
    }

    /// Executes all remaining steps and returns the complete step record vector.
    pub fn run(&mut self) -> Vec<StepResult> {
        info!(
            unit = %self.unit.id(),
            steps = self.clock.total_steps(),
            step_secs = self.clock.step_secs(),
            mode = %self.unit.engine().mode(),
            regulating = self.unit.regulation_enabled(),
            "simulation starting"
        );
        let mut results = Vec::with_capacity(self.clock.total_steps());
        while let Some((step, time)) = self.clock.tick() {
            results.push(self.step(step, time));
        }
        info!(
            unit = %self.unit.id(),
            final_output = self.unit.total_output(),
            "simulation finished"
        );
        results
    }

    fn deliver_reserve_calls(&mut self, now: f64) {
        while let Some(call) = self.reserve_calls.get(self.next_call).copied() {
            if call.time > now {
                break;
            }
            debug!(time = call.time, level = call.level, "reserve call");
            self.unit
                .receive_message(&ControlMessage::UseReserve { level: call.level });
            self.next_call += 1;
        }
    }

    /// Returns a reference to the simulated unit.
    pub fn unit(&self) -> &RegulationLayer {
        &self.unit
    }

    /// Returns the AGC roster the unit registers with.
    pub fn roster(&self) -> &AgcRoster {
        &self.roster
    }

    /// Returns the step schedule.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_configured_number_of_steps() {
        let cfg = ScenarioConfig::baseline();
        let sim = Simulation::from_config(&cfg);
        assert!(sim.is_ok());
        let results = sim.map(|mut s| s.run()).unwrap_or_default();
        assert_eq!(results.len(), cfg.simulation.steps);
        assert_eq!(results.last().map(|r| r.time), Some(7200.0));
    }

    #[test]
    fn reserve_call_is_delivered_at_step_boundary() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.targets.clear();
        cfg.reserve_calls = vec![crate::config::ReserveCallConfig {
            time: 120.0,
            level: 4.0,
        }];
        let Ok(mut sim) = Simulation::from_config(&cfg) else {
            panic!("baseline should build");
        };
        let first = sim.step(0, 60.0);
        assert_eq!(first.reserve, 0.0);
        sim.step(1, 120.0);
        let third = sim.step(2, 180.0);
        assert!(third.reserve > 0.0);
        assert_eq!(sim.unit().engine().reserve_requested(), 4.0);
    }

    #[test]
    fn ramp_limited_target_is_counted_in_the_step_it_falls_due() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.unit.reserve_available = 0.0;
        cfg.reserve_calls.clear();
        cfg.targets = vec![crate::config::TargetConfig {
            time: 120.0,
            power: 100.0,
        }];
        let Ok(mut sim) = Simulation::from_config(&cfg) else {
            panic!("baseline should build");
        };
        let results = sim.run();

        // 50 -> 100 at 0.05 MW/s only reaches 56 by t=120; the rest is
        // delivered by t=1000 without counting as another target.
        assert_eq!(results[1].time, 120.0);
        assert_eq!(results[1].targets_consumed, 1);
        assert!((results[1].committed - 56.0).abs() < 1e-9);
        let total: usize = results.iter().map(|r| r.targets_consumed).sum();
        assert_eq!(total, 1);
        assert!((results[18].committed - 100.0).abs() < 1e-9);
    }

    #[test]
    fn regulating_unit_registers_with_roster() {
        let cfg = ScenarioConfig::regulation();
        let Ok(sim) = Simulation::from_config(&cfg) else {
            panic!("regulation preset should build");
        };
        assert_eq!(sim.roster().registered(), vec![UnitId(1)]);
        assert_eq!(sim.unit().engine().dispatcher(), Some(HARNESS_DISPATCHER_ID));
    }

    #[test]
    fn unknown_mode_is_a_config_error() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.unit.mode = "sideways".to_string();
        let err = Simulation::from_config(&cfg).err();
        assert_eq!(err.map(|e| e.field), Some("unit.mode".to_string()));
    }
}
