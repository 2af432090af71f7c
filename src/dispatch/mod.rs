//! Ramp-rate limited dispatch: target queue, ramp policies, the ramp engine
//! and its regulation overlay.

pub mod aggregator;
pub mod engine;
pub mod message;
pub mod options;
pub mod policy;
pub mod regulation;
pub mod target;
