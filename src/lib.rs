//! Ramp-rate limited generator dispatch with reserve and regulation (AGC).

pub mod config;
pub mod dispatch;
pub mod io;
/// Scenario simulation: clock, AGC signal, driver and metrics.
pub mod sim;
