//! Post-hoc trajectory metrics computed from simulation results.

use std::fmt;

use super::types::StepResult;

const SECS_PER_HOUR: f64 = 3600.0;

/// Aggregate indicators derived from a complete simulation run.
///
/// Computed post-hoc from `Vec<StepResult>` so that step data and reported
/// metrics cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryReport {
    /// Highest output observed (MW).
    pub peak_output: f64,
    /// Lowest output observed (MW).
    pub min_output: f64,
    /// Largest observed ramp magnitude (MW/s).
    pub max_abs_ramp: f64,
    /// Steps whose observed ramp exceeded the ramp limits.
    pub ramp_violations: usize,
    /// Scheduled targets consumed over the run.
    pub targets_consumed: usize,
    /// Mean absolute difference between regulation command and delivery (MW).
    pub regulation_mae: f64,
    /// Energy delivered (MWh).
    pub energy_mwh: f64,
}

impl TrajectoryReport {
    /// Computes all metrics from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation step results
    /// * `step_secs` - Step duration in seconds
    pub fn from_results(results: &[StepResult], step_secs: f64) -> Self {
        if results.is_empty() {
            return Self {
                peak_output: 0.0,
                min_output: 0.0,
                max_abs_ramp: 0.0,
                ramp_violations: 0,
                targets_consumed: 0,
                regulation_mae: 0.0,
                energy_mwh: 0.0,
            };
        }

        let mut peak = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut max_ramp = 0.0_f64;
        let mut violations = 0_usize;
        let mut consumed = 0_usize;
        let mut reg_err_sum = 0.0;
        let mut energy = 0.0;

        for r in results {
            peak = peak.max(r.output);
            min = min.min(r.output);
            max_ramp = max_ramp.max(r.ramp_rate.abs());
            if !r.within_ramp_limits {
                violations += 1;
            }
            consumed += r.targets_consumed;
            reg_err_sum += (r.regulation_command - r.regulation).abs();
            energy += r.output * step_secs / SECS_PER_HOUR;
        }

        Self {
            peak_output: peak,
            min_output: min,
            max_abs_ramp: max_ramp,
            ramp_violations: violations,
            targets_consumed: consumed,
            regulation_mae: reg_err_sum / results.len() as f64,
            energy_mwh: energy,
        }
    }
}

impl fmt::Display for TrajectoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Trajectory Report ---")?;
        writeln!(f, "Peak output:           {:.3} MW", self.peak_output)?;
        writeln!(f, "Minimum output:        {:.3} MW", self.min_output)?;
        writeln!(f, "Max observed ramp:     {:.4} MW/s", self.max_abs_ramp)?;
        writeln!(f, "Ramp violations:       {}", self.ramp_violations)?;
        writeln!(f, "Targets consumed:      {}", self.targets_consumed)?;
        writeln!(f, "Regulation MAE:        {:.4} MW", self.regulation_mae)?;
        write!(f, "Energy delivered:      {:.3} MWh", self.energy_mwh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(output: f64, ramp_rate: f64) -> StepResult {
        StepResult {
            step: 0,
            time: 0.0,
            target: output,
            committed: output,
            reserve: 0.0,
            regulation_command: 0.0,
            regulation: 0.0,
            output,
            ramp_rate,
            within_ramp_limits: true,
            targets_consumed: 0,
        }
    }

    #[test]
    fn peak_and_minimum() {
        let results: Vec<StepResult> = [30.0, 55.0, 20.0, 41.0]
            .iter()
            .map(|&p| make_result(p, 0.0))
            .collect();
        let kpi = TrajectoryReport::from_results(&results, 60.0);
        assert_eq!(kpi.peak_output, 55.0);
        assert_eq!(kpi.min_output, 20.0);
    }

    #[test]
    fn energy_integrates_output() {
        // 4 steps of 15 minutes at 10 MW = 10 MWh
        let results = vec![make_result(10.0, 0.0); 4];
        let kpi = TrajectoryReport::from_results(&results, 900.0);
        assert!((kpi.energy_mwh - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ramp_magnitude_and_violations() {
        let mut results: Vec<StepResult> = [0.1, -0.3, 0.2]
            .iter()
            .map(|&r| make_result(50.0, r))
            .collect();
        results[1].within_ramp_limits = false;
        let kpi = TrajectoryReport::from_results(&results, 60.0);
        assert_eq!(kpi.max_abs_ramp, 0.3);
        assert_eq!(kpi.ramp_violations, 1);
    }

    #[test]
    fn regulation_tracking_error() {
        // errors: [1.0, 0.5, 0.0] -> mean 0.5
        let mut results = vec![make_result(50.0, 0.0); 3];
        results[0].regulation_command = 3.0;
        results[0].regulation = 2.0;
        results[1].regulation_command = -1.0;
        results[1].regulation = -0.5;
        results[2].targets_consumed = 2;
        let kpi = TrajectoryReport::from_results(&results, 4.0);
        assert!((kpi.regulation_mae - 0.5).abs() < 1e-12);
        assert_eq!(kpi.targets_consumed, 2);
    }

    #[test]
    fn empty_results() {
        let kpi = TrajectoryReport::from_results(&[], 60.0);
        assert_eq!(kpi.peak_output, 0.0);
        assert_eq!(kpi.ramp_violations, 0);
    }
}
