//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use ramp_dispatch::config::ScenarioConfig;
use ramp_dispatch::dispatch::aggregator::UnitId;
use ramp_dispatch::dispatch::engine::RampEngine;
use ramp_dispatch::dispatch::policy::RampMode;
use ramp_dispatch::dispatch::regulation::RegulationLayer;
use ramp_dispatch::sim::engine::Simulation;
use ramp_dispatch::sim::types::StepResult;

/// Absolute tolerance used for trajectory comparisons.
pub const EPS: f64 = 1e-9;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// Engine at `initial` output with symmetric ramp limits and `[0, 100]` power limits.
pub fn limited_engine(initial: f64, ramp: f64, mode: RampMode) -> RampEngine {
    let mut engine = RampEngine::with_output(initial);
    engine.set_mode(mode);
    engine.set_ramp_limits(ramp, ramp);
    engine.set_power_limits(0.0, 100.0);
    engine.initialize(0.0);
    engine
}

/// Unit at 50 MW, 1 MW/s ramps, `[0, 100]` limits, regulating `fraction` of a 100 MW rating.
pub fn regulating_unit(fraction: f64) -> RegulationLayer {
    let mut engine = RampEngine::with_output(50.0);
    engine.set_ramp_limits(1.0, 1.0);
    engine.set_power_limits(0.0, 100.0);
    let mut unit = RegulationLayer::from_engine(UnitId(7), engine);
    unit.regulation_settings(true, Some(fraction), None);
    unit.initialize(0.0);
    unit
}

/// Runs a scenario configuration to completion.
///
/// # Panics
///
/// Panics if the configuration is invalid.
pub fn run_config(cfg: &ScenarioConfig) -> Vec<StepResult> {
    let errors = cfg.validate();
    assert!(errors.is_empty(), "scenario should be valid: {errors:?}");
    match Simulation::from_config(cfg) {
        Ok(mut sim) => sim.run(),
        Err(e) => panic!("scenario should build: {e}"),
    }
}

/// Runs a built-in preset to completion.
pub fn run_preset(name: &str) -> Vec<StepResult> {
    match ScenarioConfig::from_preset(name) {
        Ok(cfg) => run_config(&cfg),
        Err(e) => panic!("preset should load: {e}"),
    }
}
