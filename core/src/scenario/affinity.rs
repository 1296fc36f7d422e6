//! Affinity + preemption-disable.
//!
//! A is pinned to core 1 above B and C and holds its core with preemption
//! disabled for two seconds. B bumps the phase and spins for two seconds.
//! C waits for the phase and then validates. The first switch that shows C
//! has run after the phase moved decides: A must be running in that sample
//! and B must have run.
//!
//! That switch normally comes within the first ticks, while A still holds
//! its core, so the verdict is reported before `Mark::PreemptionEnabled` is
//! stamped and the trace line shows it as `F`. Whether B runs again once A's
//! window closes is not part of the verdict; boards check it from their own
//! switch history.

use smpv_abi::{CoreAffinity, TaskRole, TaskSpec, priority_above_idle};

use super::{Limits, RoleSpec, Scenario};
use crate::error::FailureCause;
use crate::observation::{Mark, ObservationFlags, Verdict};
use crate::observer::SwitchSample;
use crate::worker::Step;

pub const AFFINITY_SWITCH_CEILING: u32 = 2048;
const HOLD_US: u32 = 2_000_000;

static TASK_A: [Step; 6] = [
    Step::DisablePreemption,
    Step::Mark(Mark::PreemptionDisabled),
    Step::BusyWait { us: HOLD_US },
    Step::Mark(Mark::PreemptionEnabled),
    Step::EnablePreemption,
    Step::Idle { delay_ms: 10, busy_us: 0 },
];

static TASK_B: [Step; 4] = [
    Step::AdvancePhase,
    Step::Report("TaskB Entering busyWait...\n"),
    Step::BusyWait { us: HOLD_US },
    Step::IDLE,
];

static TASK_C: [Step; 4] = [
    Step::AwaitPhase,
    Step::Report("TaskC Past Guard\n"),
    Step::Validate,
    Step::IDLE,
];

static ROLES: [RoleSpec; 3] = [
    RoleSpec {
        role: TaskRole::A,
        spec: TaskSpec::new("TaskA", priority_above_idle(3)).pinned(CoreAffinity::CORE1),
        script: &TASK_A,
    },
    RoleSpec {
        role: TaskRole::B,
        spec: TaskSpec::new("TaskB", priority_above_idle(2)),
        script: &TASK_B,
    },
    RoleSpec {
        role: TaskRole::C,
        spec: TaskSpec::new("TaskC", priority_above_idle(2)),
        script: &TASK_C,
    },
];

pub struct AffinityScenario;

impl Scenario for AffinityScenario {
    fn name(&self) -> &'static str {
        "affinity"
    }

    fn check_name(&self) -> &'static str {
        "validate_affinity_and_preemption_disable"
    }

    fn roles(&self) -> &'static [RoleSpec] {
        &ROLES
    }

    fn limits(&self) -> Limits {
        Limits::new(AFFINITY_SWITCH_CEILING)
    }

    fn on_switch(&self, flags: &ObservationFlags, sample: &SwitchSample) -> Option<Verdict> {
        if flags.phase() == 0 || !flags.has_run(TaskRole::C) {
            return None;
        }
        if sample.is_running(TaskRole::A) && flags.has_run(TaskRole::B) {
            Some(Verdict::Passed)
        } else {
            Some(Verdict::Failed(FailureCause::Contradiction))
        }
    }

    fn traced_marks(&self) -> &'static [Mark] {
        &[Mark::PreemptionDisabled, Mark::PreemptionEnabled]
    }
}
