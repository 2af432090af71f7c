//! Commanded power targets and the time-ordered queue that holds them.

use std::cmp::Ordering;
use std::collections::VecDeque;

/// A commanded power level that becomes effective at `time`.
///
/// Records compare by time only, so two records with the same time but
/// different power are considered equal. A record can also be compared
/// against a bare time value, which is what queue searches use.
///
/// # Examples
///
/// ```
/// use ramp_dispatch::dispatch::target::TargetRecord;
///
/// let a = TargetRecord::new(10.0, 50.0);
/// let b = TargetRecord::new(20.0, 5.0);
/// assert!(a < b);
/// assert!(a <= 10.0);
/// assert!(b > 10.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TargetRecord {
    /// Time at which the target takes effect (s).
    pub time: f64,
    /// Commanded power level.
    pub power: f64,
    continuation: bool,
}

impl TargetRecord {
    pub fn new(time: f64, power: f64) -> Self {
        Self {
            time,
            power,
            continuation: false,
        }
    }

    /// Record the engine queues itself to finish a ramp-limited target.
    pub(crate) fn continuation(time: f64, power: f64) -> Self {
        Self {
            time,
            power,
            continuation: true,
        }
    }

    /// Whether this record was queued by the engine rather than commanded.
    pub fn is_continuation(&self) -> bool {
        self.continuation
    }
}

impl PartialEq for TargetRecord {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl PartialOrd for TargetRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.time.partial_cmp(&other.time)
    }
}

impl PartialEq<f64> for TargetRecord {
    fn eq(&self, other: &f64) -> bool {
        self.time == *other
    }
}

impl PartialOrd<f64> for TargetRecord {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.time.partial_cmp(other)
    }
}

/// Time-ordered sequence of [`TargetRecord`]s.
///
/// Insertion keeps the sequence sorted; records with equal times keep their
/// insertion order. Consumers only ever look at or pop the front.
#[derive(Debug, Clone, Default)]
pub struct TargetQueue {
    records: VecDeque<TargetRecord>,
}

impl TargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` after every record whose time is not later than it.
    pub fn insert(&mut self, record: TargetRecord) {
        let idx = self.records.partition_point(|r| *r <= record.time);
        self.records.insert(idx, record);
    }

    /// Returns the earliest record without removing it.
    pub fn front(&self) -> Option<&TargetRecord> {
        self.records.front()
    }

    /// Removes and returns the earliest record.
    pub fn pop_front(&mut self) -> Option<TargetRecord> {
        self.records.pop_front()
    }

    /// Removes every record strictly earlier than `time`, returning how many were dropped.
    pub fn drop_before(&mut self, time: f64) -> usize {
        let stale = self.records.partition_point(|r| *r < time);
        self.records.drain(..stale);
        stale
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetRecord> {
        self.records.iter()
    }
}
