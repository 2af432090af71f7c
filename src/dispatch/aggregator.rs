//! Handle to the fleet-level AGC aggregator.
//!
//! The aggregator decides fleet-wide regulation targets and is owned by the
//! surrounding simulation. Units only hold a [`Weak`] handle to it, so a unit
//! never keeps the aggregator alive.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifier a unit registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Fleet-level regulation coordinator.
///
/// Methods take `&self`; implementations use interior mutability since the
/// same aggregator is shared by every participating unit.
pub trait AgcAggregator {
    /// Adds a unit to the set of regulating units.
    fn register(&self, unit: UnitId);
    /// Removes a unit from the set of regulating units.
    fn deregister(&self, unit: UnitId);
    /// Signals that a unit's regulation capacity or limits changed.
    fn regulation_changed(&self, unit: UnitId);
}

/// Non-owning handle to an aggregator.
pub type AgcHandle = Weak<dyn AgcAggregator>;

/// Minimal aggregator that records membership and change notifications.
#[derive(Debug, Default)]
pub struct AgcRoster {
    units: RefCell<BTreeSet<UnitId>>,
    changes: Cell<usize>,
}

impl AgcRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a non-owning handle suitable for handing to units.
    pub fn handle(roster: &Rc<AgcRoster>) -> AgcHandle {
        let weak: Weak<AgcRoster> = Rc::downgrade(roster);
        weak
    }

    pub fn is_registered(&self, unit: UnitId) -> bool {
        self.units.borrow().contains(&unit)
    }

    /// Registered units in ascending id order.
    pub fn registered(&self) -> Vec<UnitId> {
        self.units.borrow().iter().copied().collect()
    }

    /// Number of `regulation_changed` notifications received.
    pub fn change_count(&self) -> usize {
        self.changes.get()
    }
}

impl AgcAggregator for AgcRoster {
    fn register(&self, unit: UnitId) {
        self.units.borrow_mut().insert(unit);
    }

    fn deregister(&self, unit: UnitId) {
        self.units.borrow_mut().remove(&unit);
    }

    fn regulation_changed(&self, _unit: UnitId) {
        self.changes.set(self.changes.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_tracks_membership() {
        let roster = AgcRoster::new();
        roster.register(UnitId(2));
        roster.register(UnitId(1));
        roster.register(UnitId(2));
        assert_eq!(roster.registered(), vec![UnitId(1), UnitId(2)]);

        roster.deregister(UnitId(2));
        assert!(!roster.is_registered(UnitId(2)));
        assert!(roster.is_registered(UnitId(1)));
    }

    #[test]
    fn handle_does_not_keep_roster_alive() {
        let roster = Rc::new(AgcRoster::new());
        let handle = AgcRoster::handle(&roster);
        assert!(handle.upgrade().is_some());
        drop(roster);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn counts_change_notifications() {
        let roster = AgcRoster::new();
        roster.regulation_changed(UnitId(7));
        roster.regulation_changed(UnitId(7));
        assert_eq!(roster.change_count(), 2);
    }

    #[test]
    fn unit_id_display() {
        assert_eq!(UnitId(42).to_string(), "unit-42");
    }
}
