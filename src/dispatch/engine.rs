//! Ramp-rate limited dispatch of a single generating unit.

use tracing::{debug, trace, warn};

use super::message::{ControlMessage, MessageOutcome};
use super::options::{ParamError, RampOption};
use super::policy::{PlanInput, RampMode};
use super::target::{TargetQueue, TargetRecord};

/// Power differences below this are treated as "on target".
pub const RAMP_TOLERANCE: f64 = 1e-4;
/// Reserve gaps below this do not pre-empt the planned ramp.
pub const RESERVE_TOLERANCE: f64 = 1e-3;
/// Settling horizon reported by an idle unit (one day).
pub const IDLE_HORIZON_SECS: f64 = 86_400.0;

const DEFAULT_RAMP_TIME: f64 = 1200.0;
const DEFAULT_RESERVE_RAMP_TIME: f64 = 900.0;

/// Point-in-time copy of the engine's numeric state.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSnapshot {
    pub time: f64,
    pub committed_power: f64,
    pub total_output: f64,
    pub active_ramp_rate: f64,
    pub output_derivative: f64,
    pub reserve_requested: f64,
    pub reserve_realized: f64,
    pub next_decision_time: f64,
    pub last_target_time: f64,
    pub queued_targets: usize,
    pub targets_consumed: usize,
}

/// Result of advancing the committed trajectory and reserve over a step.
#[derive(Debug, Clone, Copy)]
struct Extrapolation {
    committed: f64,
    reserve: f64,
    derivative: f64,
}

/// How an undelivered remainder will be delivered.
enum Continuation {
    Ramp(f64),
    Instant,
    Stuck,
}

/// Tracks a queue of commanded power targets within ramp-rate limits.
///
/// The engine keeps two trajectories: `committed_power`, the power delivered
/// toward scheduled targets, and `total_output`, which additionally carries
/// the realized reserve and anything a wrapping layer adds on top. Between
/// decision times the committed power moves at `active_ramp_rate`; at each
/// decision time the head of the queue is re-planned using the configured
/// [`RampMode`].
///
/// # Examples
///
/// ```
/// use ramp_dispatch::dispatch::engine::RampEngine;
/// use ramp_dispatch::dispatch::target::TargetRecord;
///
/// let mut engine = RampEngine::new();
/// engine.set_ramp_limits(1.0, 1.0);
/// engine.insert_target(TargetRecord::new(10.0, 5.0));
/// assert_eq!(engine.active_ramp_rate(), 0.5);
///
/// engine.advance(10.0);
/// assert!((engine.total_output() - 5.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct RampEngine {
    queue: TargetQueue,

    committed_power: f64,
    total_output: f64,
    active_ramp_rate: f64,
    output_derivative: f64,

    ramp_up: f64,
    ramp_down: f64,
    ramp10_up: f64,
    ramp10_down: f64,
    ramp30_up: f64,
    ramp30_down: f64,
    ramp_time: f64,
    mode: RampMode,

    reserve_available: f64,
    reserve_requested: f64,
    reserve_realized: f64,
    reserve_ramp_time: f64,

    power_max: f64,
    power_min: f64,

    previous_time: f64,
    next_decision_time: f64,
    last_target_time: f64,
    targets_consumed: usize,

    dispatcher: Option<u64>,
}

impl Default for RampEngine {
    fn default() -> Self {
        Self::with_output(0.0)
    }
}

impl RampEngine {
    /// Creates an idle engine at zero output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an idle engine delivering `initial_output`.
    ///
    /// Ramp and power limits start unbounded.
    pub fn with_output(initial_output: f64) -> Self {
        Self {
            queue: TargetQueue::new(),
            committed_power: initial_output,
            total_output: initial_output,
            active_ramp_rate: 0.0,
            output_derivative: 0.0,
            ramp_up: f64::INFINITY,
            ramp_down: f64::INFINITY,
            ramp10_up: f64::INFINITY,
            ramp10_down: f64::INFINITY,
            ramp30_up: f64::INFINITY,
            ramp30_down: f64::INFINITY,
            ramp_time: DEFAULT_RAMP_TIME,
            mode: RampMode::default(),
            reserve_available: 0.0,
            reserve_requested: 0.0,
            reserve_realized: 0.0,
            reserve_ramp_time: DEFAULT_RESERVE_RAMP_TIME,
            power_max: f64::INFINITY,
            power_min: f64::NEG_INFINITY,
            previous_time: 0.0,
            next_decision_time: f64::INFINITY,
            last_target_time: 0.0,
            targets_consumed: 0,
            dispatcher: None,
        }
    }

    /// Prepares the engine to be stepped from `time0`.
    ///
    /// Targets strictly older than `time0` are discarded; targets due exactly
    /// at `time0` are consumed by the initial plan.
    pub fn initialize(&mut self, time0: f64) {
        let stale = self.queue.drop_before(time0);
        if stale > 0 {
            debug!(stale, time0, "dropped stale targets at initialization");
        }
        self.previous_time = time0;
        self.last_target_time = time0;
        self.replan();
        self.output_derivative = self.active_ramp_rate;
    }

    /// Queues `record`, re-planning if it lands on the current decision time.
    pub fn insert_target(&mut self, record: TargetRecord) {
        self.queue.insert(record);
        if record.time < self.next_decision_time {
            self.next_decision_time = record.time;
        }
        if record.time == self.next_decision_time {
            self.replan();
        }
    }

    /// Commands `power` effective immediately.
    pub fn set_target(&mut self, power: f64) {
        self.insert_target(TargetRecord::new(self.previous_time, power));
    }

    /// Commands `power` effective at `time`.
    pub fn set_target_at(&mut self, time: f64, power: f64) {
        self.insert_target(TargetRecord::new(time, power));
    }

    /// Queues paired `(time, power)` targets; the longer slice is truncated.
    pub fn set_targets(&mut self, times: &[f64], powers: &[f64]) {
        for (&time, &power) in times.iter().zip(powers) {
            self.insert_target(TargetRecord::new(time, power));
        }
    }

    /// Empties the queue and cancels any ramp in progress.
    pub fn clear_schedule(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.active_ramp_rate = 0.0;
        self.next_decision_time = f64::INFINITY;
        debug!(dropped, time = self.previous_time, "schedule cleared");
    }

    /// Power of the head target, or the committed power when idle.
    pub fn target(&self) -> f64 {
        self.queue
            .front()
            .map_or(self.committed_power, |r| r.power)
    }

    pub fn queue(&self) -> &TargetQueue {
        &self.queue
    }

    /// Requests activation of `level`, limited to `[0, reserve_available]`.
    pub fn set_reserve_target(&mut self, level: f64) {
        self.reserve_requested = level.min(self.reserve_available).max(0.0);
        self.replan();
    }

    /// Changes the reserve headroom held available.
    pub fn set_reserve_available(&mut self, available: f64) {
        self.reserve_available = available.max(0.0);
        self.reserve_requested = self.reserve_requested.min(self.reserve_available);
        self.replan();
    }

    /// Advances the unit to `time`.
    ///
    /// Every decision time reached on the way is handled in order: the state
    /// is integrated up to it, the plan is revised, and integration continues
    /// with the new rate. Times not later than the last step are ignored.
    pub fn advance(&mut self, time: f64) {
        if time.is_nan() || time <= self.previous_time {
            return;
        }
        while self.next_decision_time <= time {
            let boundary = self.next_decision_time;
            self.integrate_to(boundary);
            self.replan();
            if self.next_decision_time <= self.previous_time {
                warn!(
                    time = self.previous_time,
                    next = self.next_decision_time,
                    "plan did not advance the decision time"
                );
                break;
            }
        }
        self.integrate_to(time);
    }

    /// Output expected at `time` if the current plan holds. Never mutates.
    pub fn predict(&self, time: f64) -> f64 {
        let dt = time - self.previous_time;
        if dt.is_nan() || dt <= 0.0 {
            return self.total_output;
        }
        let step = self.extrapolate(dt);
        step.committed + step.reserve + self.layered_output()
    }

    /// Rate currently driving the total output.
    ///
    /// An outstanding reserve request pre-empts the planned ramp and moves the
    /// output at the full ramp limit.
    pub fn effective_ramp(&self) -> f64 {
        let gap = self.reserve_requested - self.reserve_realized;
        if gap > RESERVE_TOLERANCE {
            self.ramp_up
        } else if gap < -RESERVE_TOLERANCE {
            -self.ramp_down
        } else {
            self.active_ramp_rate
        }
    }

    /// Time until the reserve gap closes or, failing that, until the head target is due.
    pub fn time_to_settle(&self) -> f64 {
        let gap = self.reserve_requested - self.reserve_realized;
        let closing_rate = if gap > RESERVE_TOLERANCE {
            Some(self.ramp_up - self.active_ramp_rate)
        } else if gap < -RESERVE_TOLERANCE {
            Some(-self.ramp_down - self.active_ramp_rate)
        } else {
            None
        };
        if let Some(rate) = closing_rate {
            let t = gap / rate;
            return if t.is_finite() && t >= 0.0 { t } else { f64::INFINITY };
        }
        self.queue
            .front()
            .map_or(IDLE_HORIZON_SECS, |r| r.time - self.previous_time)
    }

    /// Upward ramp limit after withholding reserve headroom that is not in use.
    pub fn ramp_limit_up(&self) -> f64 {
        if self.reserve_available < RESERVE_TOLERANCE || self.reserve_ramp_time <= 0.0 {
            self.ramp_up
        } else {
            self.ramp_up - (self.reserve_available - self.reserve_requested) / self.reserve_ramp_time
        }
    }

    /// Revises `active_ramp_rate` and `next_decision_time` from the queue head.
    pub(crate) fn replan(&mut self) {
        let ramp_limit_up = self.ramp_limit_up();

        let mut consumed = None;
        while let Some(head) = self.queue.front().copied() {
            if head.time > self.previous_time {
                break;
            }
            self.queue.pop_front();
            self.last_target_time = head.time;
            if !head.is_continuation() {
                self.targets_consumed += 1;
            }
            consumed = Some(head);
        }

        if let Some(done) = consumed {
            let power = self.clamp_target(done.power);
            let mut remainder = power - self.committed_power;
            if remainder.abs() < RAMP_TOLERANCE {
                remainder = 0.0;
            }
            trace!(time = done.time, power, remainder, "target consumed");
            if remainder != 0.0 && self.continue_toward(power, remainder, ramp_limit_up) {
                return;
            }
        }

        let Some(head) = self.queue.front().copied() else {
            self.active_ramp_rate = 0.0;
            self.next_decision_time = f64::INFINITY;
            return;
        };

        let power = self.clamp_target(head.power);
        let delta = power - self.committed_power;
        if delta.abs() < RAMP_TOLERANCE {
            self.active_ramp_rate = 0.0;
            self.next_decision_time = head.time;
            return;
        }

        if !self.mode.is_specified() {
            debug!(mode = %self.mode, "ramp mode has no policy, planning as interpolated");
        }
        let decision = self.mode.plan(&PlanInput {
            previous_time: self.previous_time,
            last_target_time: self.last_target_time,
            target_time: head.time,
            delta,
            current_rate: self.active_ramp_rate,
            ramp_limit_up,
            ramp_down: self.ramp_down,
            ramp_time: self.ramp_time,
        });
        self.active_ramp_rate = decision.rate;
        self.next_decision_time = decision.next_decision_time;
        debug!(
            mode = %self.mode,
            time = self.previous_time,
            target_time = head.time,
            target = power,
            rate = decision.rate,
            next = decision.next_decision_time,
            "re-planned ramp"
        );
    }

    /// Arranges delivery of `remainder` left over from a consumed target.
    ///
    /// Returns `true` when a continuation target now drives the plan. A
    /// continuation that would finish after the next queued target is not
    /// created; that target's plan starts from the actual committed power.
    fn continue_toward(&mut self, power: f64, remainder: f64, ramp_limit_up: f64) -> bool {
        match self.continuation_rate(remainder, ramp_limit_up) {
            Continuation::Ramp(rate) => {
                let finish = self.previous_time + remainder / rate;
                if self.queue.front().is_some_and(|next| next.time < finish) {
                    return false;
                }
                self.queue.insert(TargetRecord::continuation(finish, power));
                self.active_ramp_rate = rate;
                self.next_decision_time = finish;
                debug!(remainder, rate, finish, "ramp-limited target continues");
                true
            }
            Continuation::Instant => {
                self.committed_power += remainder;
                self.total_output += remainder;
                false
            }
            Continuation::Stuck => {
                warn!(remainder, "unit cannot ramp toward consumed target");
                false
            }
        }
    }

    fn continuation_rate(&self, remainder: f64, ramp_limit_up: f64) -> Continuation {
        let rate = if self.active_ramp_rate * remainder > 0.0 {
            self.active_ramp_rate
        } else if remainder > 0.0 {
            if ramp_limit_up > 0.0 {
                ramp_limit_up
            } else {
                self.ramp_up
            }
        } else {
            -self.ramp_down
        };
        if rate.is_infinite() {
            Continuation::Instant
        } else if rate * remainder > 0.0 {
            Continuation::Ramp(rate)
        } else {
            Continuation::Stuck
        }
    }

    fn clamp_target(&self, power: f64) -> f64 {
        power
            .min(self.power_max - self.reserve_available)
            .max(self.power_min)
    }

    fn extrapolate(&self, dt: f64) -> Extrapolation {
        let derivative = self.effective_ramp();
        let committed = self.committed_power + self.active_ramp_rate * dt;
        let mut reserve = self.reserve_realized + (derivative - self.active_ramp_rate) * dt;
        let gap = self.reserve_requested - self.reserve_realized;
        if gap > RESERVE_TOLERANCE {
            reserve = reserve.min(self.reserve_requested);
        } else if gap < -RESERVE_TOLERANCE {
            reserve = reserve.max(self.reserve_requested);
        } else {
            reserve = self.reserve_realized;
        }
        Extrapolation {
            committed,
            reserve,
            derivative,
        }
    }

    fn integrate_to(&mut self, time: f64) {
        let dt = time - self.previous_time;
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let layered = self.layered_output();
        let step = self.extrapolate(dt);
        self.committed_power = step.committed;
        self.reserve_realized = step.reserve;
        self.total_output = step.committed + step.reserve + layered;
        self.output_derivative = step.derivative;
        self.previous_time = time;
        trace!(
            time,
            committed = self.committed_power,
            output = self.total_output,
            "integrated"
        );
    }

    /// Output carried on top of committed power and reserve by a wrapping layer.
    fn layered_output(&self) -> f64 {
        self.total_output - self.committed_power - self.reserve_realized
    }

    /// Replaces the total output with one computed by a wrapping layer.
    pub(crate) fn overlay_output(&mut self, total_output: f64, derivative: f64) {
        self.total_output = total_output;
        self.output_derivative = derivative;
    }

    /// Replaces power and ramp limits without re-planning.
    pub(crate) fn set_envelope(&mut self, power_min: f64, power_max: f64, ramp_up: f64, ramp_down: f64) {
        self.power_min = power_min;
        self.power_max = power_max;
        self.ramp_up = ramp_up;
        self.ramp_down = ramp_down;
    }

    /// Sets both primary ramp limits; `down` is stored as a magnitude.
    pub fn set_ramp_limits(&mut self, up: f64, down: f64) {
        self.ramp_up = up;
        self.ramp_down = down.abs();
        self.replan();
    }

    pub fn set_power_limits(&mut self, min: f64, max: f64) {
        self.power_min = min;
        self.power_max = max;
        self.replan();
    }

    pub fn set_mode(&mut self, mode: RampMode) {
        self.mode = mode;
        self.replan();
    }

    /// Applies a numeric option and re-plans.
    pub fn set(&mut self, option: RampOption, value: f64) {
        match option {
            RampOption::Ramp => {
                self.ramp_up = value;
                self.ramp_down = value.abs();
            }
            RampOption::RampUp => self.ramp_up = value,
            RampOption::RampDown => self.ramp_down = value.abs(),
            RampOption::Ramp10 => {
                self.ramp10_up = value;
                self.ramp10_down = value.abs();
            }
            RampOption::Ramp10Up => self.ramp10_up = value,
            RampOption::Ramp10Down => self.ramp10_down = value.abs(),
            RampOption::Ramp30 => {
                self.ramp30_up = value;
                self.ramp30_down = value.abs();
            }
            RampOption::Ramp30Up => self.ramp30_up = value,
            RampOption::Ramp30Down => self.ramp30_down = value.abs(),
            RampOption::RampTime => self.ramp_time = value,
            RampOption::Target => return self.set_target(value),
            RampOption::Reserve => return self.set_reserve_available(value),
            RampOption::ReserveRampTime => self.reserve_ramp_time = value,
            RampOption::Min => self.power_min = value,
            RampOption::Max => self.power_max = value,
        }
        self.replan();
    }

    /// Applies a numeric option by key.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnknownOption`] if `key` is not a ramp option.
    pub fn set_option(&mut self, key: &str, value: f64) -> Result<(), ParamError> {
        let option = key.parse()?;
        self.set(option, value);
        Ok(())
    }

    /// Applies a string option by key; only `rampmode` is recognized.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnknownOption`] for other keys and
    /// [`ParamError::InvalidValue`] for an unknown mode name.
    pub fn set_mode_str(&mut self, key: &str, value: &str) -> Result<(), ParamError> {
        match key {
            "rampmode" => {
                let mode = value.parse()?;
                self.set_mode(mode);
                Ok(())
            }
            _ => Err(ParamError::UnknownOption(key.to_string())),
        }
    }

    /// Reads a numeric option by key.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnknownOption`] if `key` is not readable.
    pub fn get(&self, key: &str) -> Result<f64, ParamError> {
        match key {
            "reserve" => Ok(self.reserve_available),
            "min" => Ok(self.power_min),
            "max" => Ok(self.power_max),
            "rampup" => Ok(self.ramp_up),
            "rampdown" => Ok(self.ramp_down),
            "ramptime" => Ok(self.ramp_time),
            "target" => Ok(self.target()),
            _ => Err(ParamError::UnknownOption(key.to_string())),
        }
    }

    /// Applies a control message.
    pub fn receive_message(&mut self, message: &ControlMessage) -> MessageOutcome {
        debug!(kind = message.kind(), time = self.previous_time, "control message");
        match message {
            ControlMessage::ClearTargets => {
                self.clear_schedule();
                MessageOutcome::Applied
            }
            ControlMessage::Shutdown
            | ControlMessage::Startup
            | ControlMessage::UpdateRegulationTarget { .. } => MessageOutcome::Ignored,
            ControlMessage::AddTargets { times, powers } => {
                self.set_targets(times, powers);
                MessageOutcome::Applied
            }
            ControlMessage::UpdateTargets { times, powers } => {
                self.clear_schedule();
                self.set_targets(times, powers);
                MessageOutcome::Applied
            }
            ControlMessage::UpdateReserves { available } => {
                self.set_reserve_available(*available);
                MessageOutcome::Applied
            }
            ControlMessage::UseReserve { level } => {
                self.set_reserve_target(*level);
                MessageOutcome::Applied
            }
            ControlMessage::RegisterDispatcher { source } => {
                self.dispatcher = Some(*source);
                MessageOutcome::Applied
            }
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            time: self.previous_time,
            committed_power: self.committed_power,
            total_output: self.total_output,
            active_ramp_rate: self.active_ramp_rate,
            output_derivative: self.output_derivative,
            reserve_requested: self.reserve_requested,
            reserve_realized: self.reserve_realized,
            next_decision_time: self.next_decision_time,
            last_target_time: self.last_target_time,
            queued_targets: self.queue.len(),
            targets_consumed: self.targets_consumed,
        }
    }

    pub fn committed_power(&self) -> f64 {
        self.committed_power
    }

    pub fn total_output(&self) -> f64 {
        self.total_output
    }

    pub fn active_ramp_rate(&self) -> f64 {
        self.active_ramp_rate
    }

    pub fn output_derivative(&self) -> f64 {
        self.output_derivative
    }

    pub fn ramp_up(&self) -> f64 {
        self.ramp_up
    }

    pub fn ramp_down(&self) -> f64 {
        self.ramp_down
    }

    /// Ten-minute ramp capability `(up, down)`; informational only.
    pub fn ramp10(&self) -> (f64, f64) {
        (self.ramp10_up, self.ramp10_down)
    }

    /// Thirty-minute ramp capability `(up, down)`; informational only.
    pub fn ramp30(&self) -> (f64, f64) {
        (self.ramp30_up, self.ramp30_down)
    }

    pub fn ramp_time(&self) -> f64 {
        self.ramp_time
    }

    pub fn mode(&self) -> RampMode {
        self.mode
    }

    pub fn reserve_available(&self) -> f64 {
        self.reserve_available
    }

    pub fn reserve_requested(&self) -> f64 {
        self.reserve_requested
    }

    pub fn reserve_realized(&self) -> f64 {
        self.reserve_realized
    }

    pub fn reserve_ramp_time(&self) -> f64 {
        self.reserve_ramp_time
    }

    pub fn power_max(&self) -> f64 {
        self.power_max
    }

    pub fn power_min(&self) -> f64 {
        self.power_min
    }

    pub fn previous_time(&self) -> f64 {
        self.previous_time
    }

    pub fn next_decision_time(&self) -> f64 {
        self.next_decision_time
    }

    pub fn last_target_time(&self) -> f64 {
        self.last_target_time
    }

    /// Commanded targets consumed so far; continuations are not counted.
    pub fn targets_consumed(&self) -> usize {
        self.targets_consumed
    }

    /// Source id of the dispatcher that registered with this unit.
    pub fn dispatcher(&self) -> Option<u64> {
        self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(up: f64, down: f64) -> RampEngine {
        let mut e = RampEngine::new();
        e.set_ramp_limits(up, down);
        e.set_power_limits(0.0, 100.0);
        e
    }

    #[test]
    fn idle_engine_is_quiescent() {
        let mut e = RampEngine::with_output(12.0);
        e.initialize(0.0);
        assert_eq!(e.next_decision_time(), f64::INFINITY);
        for t in [1.0, 5.0, 100.0] {
            e.advance(t);
            assert_eq!(e.total_output(), 12.0);
        }
    }

    #[test]
    fn interpolated_ramp_reaches_target() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 5.0));
        assert_eq!(e.active_ramp_rate(), 0.5);
        e.advance(10.0);
        assert!((e.total_output() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn saturated_ramp_uses_exact_limit() {
        let mut e = limited(2.0, 3.0);
        e.insert_target(TargetRecord::new(10.0, 80.0));
        assert_eq!(e.active_ramp_rate(), 2.0);

        let mut e = RampEngine::with_output(90.0);
        e.set_ramp_limits(2.0, 3.0);
        e.insert_target(TargetRecord::new(10.0, 0.0));
        assert_eq!(e.active_ramp_rate(), -3.0);
    }

    #[test]
    fn target_is_consumed_once() {
        let mut e = limited(100.0, 100.0);
        e.insert_target(TargetRecord::new(10.0, 50.0));
        e.advance(10.0);
        e.advance(11.0);
        assert_eq!(e.last_target_time(), 10.0);
        assert!(e.queue().is_empty());
        assert!((e.committed_power() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn insert_at_decision_time_replans() {
        let mut e = limited(10.0, 10.0);
        e.set_mode(RampMode::Delayed);
        e.set(RampOption::RampTime, 2.0);
        e.insert_target(TargetRecord::new(5.0, 20.0));
        assert_eq!(e.active_ramp_rate(), 10.0);
        assert_eq!(e.next_decision_time(), 2.0);

        e.insert_target(TargetRecord::new(2.0, 4.0));
        assert_eq!(e.active_ramp_rate(), 2.0);
        assert_eq!(e.next_decision_time(), 2.0);
        assert_eq!(e.target(), 4.0);
    }

    #[test]
    fn insert_before_decision_time_replans() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 5.0));
        assert_eq!(e.active_ramp_rate(), 0.5);

        e.insert_target(TargetRecord::new(4.0, 4.0));
        assert_eq!(e.active_ramp_rate(), 1.0);
        assert_eq!(e.next_decision_time(), 4.0);

        e.advance(4.0);
        assert!((e.committed_power() - 4.0).abs() < 1e-9);
        assert!((e.active_ramp_rate() - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(e.next_decision_time(), 10.0);
    }

    #[test]
    fn continuation_is_not_counted_as_consumed() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 20.0));
        e.advance(10.0);
        assert_eq!(e.targets_consumed(), 1);
        assert!(e.queue().iter().all(|r| r.is_continuation()));
        e.advance(25.0);
        assert_eq!(e.targets_consumed(), 1);
        assert!(e.queue().is_empty());
    }

    #[test]
    fn ramp_limited_remainder_continues() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 20.0));
        e.advance(10.0);
        // 10 delivered, 10 left: a continuation at t = 20 keeps ramping.
        assert!((e.committed_power() - 10.0).abs() < 1e-9);
        assert_eq!(e.queue().len(), 1);
        assert!((e.next_decision_time() - 20.0).abs() < 1e-9);
        e.advance(25.0);
        assert!((e.committed_power() - 20.0).abs() < 1e-9);
        assert!(e.queue().is_empty());
    }

    #[test]
    fn several_targets_in_one_step_are_all_consumed() {
        let mut e = limited(100.0, 100.0);
        e.set_targets(&[1.0, 2.0, 3.0], &[10.0, 20.0, 5.0]);
        e.advance(10.0);
        assert!(e.queue().is_empty());
        assert_eq!(e.last_target_time(), 3.0);
        assert!((e.total_output() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn predict_matches_advance_within_leg() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 5.0));
        let before = e.snapshot();
        let predicted = e.predict(4.0);
        assert_eq!(e.snapshot(), before);
        e.advance(4.0);
        assert!((e.total_output() - predicted).abs() < 1e-12);
    }

    #[test]
    fn reserve_request_preempts_planned_ramp() {
        let mut e = limited(1.0, 1.0);
        e.set_reserve_available(10.0);
        e.insert_target(TargetRecord::new(100.0, 10.0));
        e.set_reserve_target(5.0);
        assert_eq!(e.effective_ramp(), 1.0);
        let planned = e.active_ramp_rate();
        e.advance(2.0);
        assert!((e.reserve_realized() - 2.0 * (1.0 - planned)).abs() < 1e-9);
        assert!((e.committed_power() - 2.0 * planned).abs() < 1e-9);
    }

    #[test]
    fn reserve_stops_at_requested_level() {
        let mut e = limited(1.0, 1.0);
        e.set_reserve_available(10.0);
        e.set_reserve_target(3.0);
        e.advance(100.0);
        assert!((e.reserve_realized() - 3.0).abs() < 1e-9);
        assert!((e.total_output() - 3.0).abs() < 1e-9);
        assert_eq!(e.effective_ramp(), e.active_ramp_rate());
    }

    #[test]
    fn unused_reserve_is_withheld_from_ramping() {
        let mut e = limited(2.0, 2.0);
        e.set(RampOption::ReserveRampTime, 10.0);
        e.set_reserve_available(10.0);
        assert_eq!(e.ramp_limit_up(), 1.0);
        e.set_reserve_target(10.0);
        assert_eq!(e.ramp_limit_up(), 2.0);
    }

    #[test]
    fn targets_are_clamped_below_reserve_headroom() {
        let mut e = limited(100.0, 100.0);
        e.set_reserve_available(20.0);
        e.insert_target(TargetRecord::new(1.0, 95.0));
        e.advance(1.0);
        assert!((e.committed_power() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn clear_schedule_cancels_ramp() {
        let mut e = limited(1.0, 1.0);
        e.insert_target(TargetRecord::new(10.0, 5.0));
        e.clear_schedule();
        assert_eq!(e.active_ramp_rate(), 0.0);
        assert_eq!(e.next_decision_time(), f64::INFINITY);
        assert!(e.queue().is_empty());
    }

    #[test]
    fn set_target_without_time_is_immediate() {
        let mut e = RampEngine::with_output(3.0);
        e.initialize(5.0);
        e.set_target(8.0);
        assert_eq!(e.committed_power(), 8.0);
        assert_eq!(e.total_output(), 8.0);
        assert_eq!(e.last_target_time(), 5.0);
    }

    #[test]
    fn initialize_drops_stale_targets() {
        let mut e = limited(10.0, 10.0);
        e.set_targets(&[10.0, 40.0], &[50.0, 10.0]);
        e.initialize(30.0);
        assert_eq!(e.queue().len(), 1);
        assert_eq!(e.queue().front().map(|r| r.time), Some(40.0));
        assert_eq!(e.last_target_time(), 30.0);
    }

    #[test]
    fn option_table_round_trip() {
        let mut e = RampEngine::new();
        assert!(e.set_option("rampdown", -4.0).is_ok());
        assert_eq!(e.get("rampdown"), Ok(4.0));
        assert!(e.set_option("ramp30", 7.0).is_ok());
        assert_eq!(e.ramp30(), (7.0, 7.0));
        assert!(e.set_option("reserve", 3.0).is_ok());
        assert_eq!(e.get("reserve"), Ok(3.0));
        assert_eq!(
            e.set_option("wobble", 1.0),
            Err(ParamError::UnknownOption("wobble".into()))
        );
        assert!(e.get("wobble").is_err());
    }

    #[test]
    fn ramp_mode_string_option() {
        let mut e = RampEngine::new();
        assert!(e.set_mode_str("rampmode", "Delayed").is_ok());
        assert_eq!(e.mode(), RampMode::Delayed);
        assert!(matches!(
            e.set_mode_str("rampmode", "sideways"),
            Err(ParamError::InvalidValue { .. })
        ));
        assert_eq!(e.mode(), RampMode::Delayed);
        assert!(e.set_mode_str("colour", "blue").is_err());
    }

    #[test]
    fn messages_drive_the_queue() {
        let mut e = limited(1.0, 1.0);
        let add = ControlMessage::AddTargets {
            times: vec![10.0, 20.0],
            powers: vec![5.0, 10.0],
        };
        assert_eq!(e.receive_message(&add), MessageOutcome::Applied);
        assert_eq!(e.queue().len(), 2);

        let update = ControlMessage::UpdateTargets {
            times: vec![30.0],
            powers: vec![1.0],
        };
        e.receive_message(&update);
        assert_eq!(e.queue().len(), 1);

        assert_eq!(
            e.receive_message(&ControlMessage::ClearTargets),
            MessageOutcome::Applied
        );
        assert!(e.queue().is_empty());
        assert_eq!(
            e.receive_message(&ControlMessage::Shutdown),
            MessageOutcome::Ignored
        );
        e.receive_message(&ControlMessage::RegisterDispatcher { source: 9 });
        assert_eq!(e.dispatcher(), Some(9));
    }

    #[test]
    fn time_to_settle_reports_head_or_idle() {
        let mut e = limited(1.0, 1.0);
        assert_eq!(e.time_to_settle(), IDLE_HORIZON_SECS);
        e.insert_target(TargetRecord::new(40.0, 5.0));
        assert_eq!(e.time_to_settle(), 40.0);
    }
}
