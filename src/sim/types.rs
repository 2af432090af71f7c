//! Per-step simulation record.

use std::fmt;

/// Complete record of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Step index.
    pub step: usize,
    /// Simulation time at the end of the step (seconds).
    pub time: f64,
    /// Power of the head target after the step (committed power when idle).
    pub target: f64,
    /// Power committed toward scheduled targets.
    pub committed: f64,
    /// Reserve realized.
    pub reserve: f64,
    /// Regulation level commanded by the AGC signal.
    pub regulation_command: f64,
    /// Regulation level actually delivered.
    pub regulation: f64,
    /// Total unit output.
    pub output: f64,
    /// Observed ramp over the step: `(output - previous output) / dt`.
    pub ramp_rate: f64,
    /// Whether the observed ramp stayed within the unit's ramp limits.
    pub within_ramp_limits: bool,
    /// Scheduled targets consumed during the step.
    pub targets_consumed: usize,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "k={:>4} t={:>8.1}s | out={:>8.3}  target={:>8.3}  committed={:>8.3} \
             | res={:>6.3}  reg={:>6.3} (cmd={:>6.3}) | ramp={:>7.4}/s ok={}",
            self.step,
            self.time,
            self.output,
            self.target,
            self.committed,
            self.reserve,
            self.regulation,
            self.regulation_command,
            self.ramp_rate,
            self.within_ramp_limits,
        )
    }
}
