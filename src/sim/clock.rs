/// A fixed-step simulation clock over continuous time.
///
/// Each tick yields the step index and the time at the *end* of that step,
/// which is the time the simulated unit is advanced to.
///
/// # Examples
///
/// ```
/// use ramp_dispatch::sim::clock::Clock;
///
/// let mut clock = Clock::new(100.0, 10.0, 3);
/// let mut ticks = Vec::new();
///
/// clock.run(|step, time| ticks.push((step, time)));
/// assert_eq!(ticks, vec![(0, 110.0), (1, 120.0), (2, 130.0)]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
    start_time: f64,
    step_secs: f64,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start_time` - Simulation time before the first step (seconds)
    /// * `step_secs` - Step length (seconds)
    /// * `total` - The total number of steps the clock will run
    pub fn new(start_time: f64, step_secs: f64, total: usize) -> Self {
        Self {
            current: 0,
            total,
            start_time,
            step_secs,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some((step, time))` - The step index and the time at its end
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<(usize, f64)> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some((step, self.time_at(self.current)))
        } else {
            None
        }
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(usize, f64)) {
        while let Some((step, time)) = self.tick() {
            f(step, time);
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn step_secs(&self) -> f64 {
        self.step_secs
    }

    pub fn total_steps(&self) -> usize {
        self.total
    }

    /// Time after `steps` whole steps. Computed by multiplication so long
    /// runs do not accumulate rounding drift.
    fn time_at(&self, steps: usize) -> f64 {
        self.start_time + steps as f64 * self.step_secs
    }
}
