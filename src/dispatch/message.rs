//! Control messages delivered to a dispatchable unit.

/// Inbound control message.
///
/// Target payloads are paired vectors; extra entries in the longer vector
/// are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Drop every queued target and stop ramping.
    ClearTargets,
    Shutdown,
    Startup,
    /// Add targets to the existing schedule.
    AddTargets { times: Vec<f64>, powers: Vec<f64> },
    /// Replace the schedule with the given targets.
    UpdateTargets { times: Vec<f64>, powers: Vec<f64> },
    /// Change the reserve headroom held available.
    UpdateReserves { available: f64 },
    /// Request activation of `level` of the available reserve.
    UseReserve { level: f64 },
    /// New regulation command from the AGC aggregator.
    UpdateRegulationTarget { level: f64 },
    /// Records the sender as this unit's dispatcher.
    RegisterDispatcher { source: u64 },
}

impl ControlMessage {
    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClearTargets => "clear-targets",
            Self::Shutdown => "shutdown",
            Self::Startup => "startup",
            Self::AddTargets { .. } => "add-targets",
            Self::UpdateTargets { .. } => "update-targets",
            Self::UpdateReserves { .. } => "update-reserves",
            Self::UseReserve { .. } => "use-reserve",
            Self::UpdateRegulationTarget { .. } => "update-regulation-target",
            Self::RegisterDispatcher { .. } => "register-dispatcher",
        }
    }
}

/// What a unit did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Applied,
    /// Accepted but has no effect on this unit.
    Ignored,
}
