//! Ramp-timing policies.
//!
//! Each [`RampMode`] variant is a pure planning function: given the head
//! target, the current committed power and the ramp limits, it decides the
//! ramp rate to apply now and the time at which the plan must be revisited.
//! Nothing here depends on the history of earlier decisions except through
//! the `current_rate` and `last_target_time` inputs.

use std::fmt;
use std::str::FromStr;

use super::options::ParamError;

/// Timing policy used to reach the next queued target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampMode {
    /// Ramp linearly so the target is reached exactly at its time.
    #[default]
    Interpolated,
    /// Center a ramp of length `ramp_time` inside the inter-target interval.
    Midpoint,
    /// Ramp at the limit, but never faster than over `ramp_time`.
    Delayed,
    /// Reserved policy; plans as [`RampMode::Interpolated`].
    JustInTime,
    /// Reserved policy; plans as [`RampMode::Interpolated`].
    OnTargetRamp,
}

impl RampMode {
    /// Returns `false` for the reserved variants that have no policy of their own.
    pub fn is_specified(self) -> bool {
        !matches!(self, Self::JustInTime | Self::OnTargetRamp)
    }

    /// The mode whose planning function is actually run for `self`.
    pub fn effective(self) -> Self {
        if self.is_specified() {
            self
        } else {
            Self::Interpolated
        }
    }

    /// Plans the ramp toward a target that is not yet due.
    ///
    /// `input.target_time` must be strictly later than `input.previous_time`;
    /// the engine consumes due targets before calling this.
    pub fn plan(self, input: &PlanInput) -> RampDecision {
        match self.effective() {
            Self::Midpoint => plan_midpoint(input),
            Self::Delayed => plan_delayed(input),
            _ => plan_interpolated(input),
        }
    }
}

impl fmt::Display for RampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interpolated => "interp",
            Self::Midpoint => "midpoint",
            Self::Delayed => "delayed",
            Self::JustInTime => "justintime",
            Self::OnTargetRamp => "ontargetramp",
        };
        f.write_str(name)
    }
}

impl FromStr for RampMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interp" | "interpolated" => Ok(Self::Interpolated),
            "midpoint" => Ok(Self::Midpoint),
            "delayed" => Ok(Self::Delayed),
            "justintime" => Ok(Self::JustInTime),
            "ontargetramp" => Ok(Self::OnTargetRamp),
            _ => Err(ParamError::InvalidValue {
                option: "rampmode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Everything a policy needs to plan one leg toward the head target.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput {
    /// Time of the last integration step.
    pub previous_time: f64,
    /// Time of the most recently consumed target.
    pub last_target_time: f64,
    /// Time of the head target.
    pub target_time: f64,
    /// Head target power minus committed power.
    pub delta: f64,
    /// Ramp rate currently being applied.
    pub current_rate: f64,
    /// Upward ramp limit after withholding unused reserve headroom.
    pub ramp_limit_up: f64,
    /// Downward ramp limit (positive magnitude).
    pub ramp_down: f64,
    /// Minimum ramp duration used by the midpoint and delayed policies.
    pub ramp_time: f64,
}

impl PlanInput {
    fn elapsed(&self) -> f64 {
        self.target_time - self.previous_time
    }

    fn clamp_rate(&self, rate: f64) -> f64 {
        rate.min(self.ramp_limit_up).max(-self.ramp_down)
    }
}

/// Outcome of a planning pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampDecision {
    /// Ramp rate to apply from now on (power/s).
    pub rate: f64,
    /// Time at which the plan must be revisited.
    pub next_decision_time: f64,
}

fn plan_interpolated(input: &PlanInput) -> RampDecision {
    RampDecision {
        rate: input.clamp_rate(input.delta / input.elapsed()),
        next_decision_time: input.target_time,
    }
}

fn plan_midpoint(input: &PlanInput) -> RampDecision {
    let span = input.target_time - input.last_target_time;
    let window_start = input.last_target_time + (span - input.ramp_time) / 2.0;
    let window_end = window_start + input.ramp_time;
    let prev = input.previous_time;

    if input.elapsed() >= input.ramp_time {
        if prev < window_start {
            RampDecision {
                rate: 0.0,
                next_decision_time: window_start,
            }
        } else if prev < window_end {
            RampDecision {
                rate: input.clamp_rate(input.delta / (window_end - prev)),
                next_decision_time: window_end,
            }
        } else {
            finish_ramp(input)
        }
    } else if prev >= window_end {
        finish_ramp(input)
    } else {
        plan_interpolated(input)
    }
}

/// Keeps ramping toward the target past the end of the midpoint window.
fn finish_ramp(input: &PlanInput) -> RampDecision {
    let rate = if input.current_rate * input.delta > 0.0 {
        input.clamp_rate(input.current_rate)
    } else {
        input.clamp_rate(input.delta / input.elapsed())
    };
    let next_decision_time = if rate == 0.0 {
        input.target_time
    } else {
        (input.previous_time + input.delta / rate).min(input.target_time)
    };
    RampDecision {
        rate,
        next_decision_time,
    }
}

fn plan_delayed(input: &PlanInput) -> RampDecision {
    let elapsed = input.elapsed();
    let limit = if input.delta > 0.0 {
        input.ramp_limit_up
    } else {
        input.ramp_down
    };
    let mut remaining = if limit > 0.0 {
        input.delta.abs() / limit
    } else {
        elapsed
    };
    remaining = remaining.max(input.ramp_time).min(elapsed);
    if remaining <= 0.0 {
        remaining = elapsed;
    }
    RampDecision {
        rate: input.clamp_rate(input.delta / remaining),
        next_decision_time: input.previous_time + remaining,
    }
}
