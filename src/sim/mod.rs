/// Fixed-step clock over continuous time.
pub mod clock;
pub mod engine;
pub mod kpi;
/// Synthetic AGC command source.
pub mod signal;
pub mod types;
