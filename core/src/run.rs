//! Scenario context shared by the observer, the workers and the validator.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::observation::{ObservationFlags, Outcome, OutcomeCell, RoleTable, Verdict};
use crate::scenario::{Limits, Scenario};

/// State of one run. Lives for the whole run and is never reset.
pub struct ScenarioRun {
    scenario: &'static dyn Scenario,
    limits: Limits,
    pub flags: ObservationFlags,
    pub roles: RoleTable,
    outcome: OutcomeCell,
    switches: AtomicU32,
    reported: AtomicBool,
}

impl ScenarioRun {
    pub const fn new(scenario: &'static dyn Scenario, limits: Limits) -> Self {
        Self {
            scenario,
            limits,
            flags: ObservationFlags::new(),
            roles: RoleTable::new(),
            outcome: OutcomeCell::new(),
            switches: AtomicU32::new(0),
            reported: AtomicBool::new(false),
        }
    }

    /// Run with the scenario's own limits.
    pub fn with_defaults(scenario: &'static dyn Scenario) -> Self {
        Self::new(scenario, scenario.limits())
    }

    #[inline]
    pub fn scenario(&self) -> &'static dyn Scenario {
        self.scenario
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    #[inline]
    pub fn outcome(&self) -> Outcome {
        self.outcome.load()
    }

    /// Settle the run. Only the first verdict sticks.
    pub fn conclude(&self, verdict: Verdict) -> bool {
        self.outcome.conclude(verdict)
    }

    #[inline]
    pub fn switch_count(&self) -> u32 {
        self.switches.load(Ordering::Relaxed)
    }

    /// Count one switch event and return the new total.
    pub(crate) fn count_switch(&self) -> u32 {
        self.switches.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    /// Claim the single verdict report of this run.
    pub(crate) fn claim_report(&self) -> bool {
        !self.reported.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}
