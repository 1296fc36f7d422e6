//! Cross-core mutual exclusion.
//!
//! A (core 1) takes the critical section and holds it for over ten seconds,
//! notifying B a quarter second in. B (core 0) tries to take the same
//! section ten milliseconds after start. C floats and validates. The run
//! fails the moment either worker is stamped inside the other's section.

use smpv_abi::{CoreAffinity, TaskRole, TaskSpec, priority_above_idle};

use super::{Limits, RoleSpec, Scenario};
use crate::error::FailureCause;
use crate::observation::{Mark, ObservationFlags, Verdict};
use crate::observer::SwitchSample;
use crate::worker::Step;

pub const EXCLUSION_SWITCH_CEILING: u32 = 1500;

static TASK_A: [Step; 9] = [
    Step::EnterCritical,
    Step::Mark(Mark::AEnteredCritical),
    Step::BusyWait { us: 250_000 },
    Step::Notify(TaskRole::B),
    Step::Mark(Mark::NotifiedPeer),
    Step::BusyWait { us: 10_000_000 },
    Step::Mark(Mark::AExitedCritical),
    Step::ExitCritical,
    Step::IDLE,
];

static TASK_B: [Step; 7] = [
    Step::Delay { ms: 10 },
    Step::EnterCritical,
    Step::Mark(Mark::BEnteredCritical),
    Step::BusyWait { us: 8_000_000 },
    Step::Mark(Mark::BExitedCritical),
    Step::ExitCritical,
    Step::IDLE,
];

static TASK_C: [Step; 3] = [Step::BusyWait { us: 250_000 }, Step::Validate, Step::IDLE];

static ROLES: [RoleSpec; 3] = [
    RoleSpec {
        role: TaskRole::A,
        spec: TaskSpec::new("TaskA", priority_above_idle(2)).pinned(CoreAffinity::CORE1),
        script: &TASK_A,
    },
    RoleSpec {
        role: TaskRole::B,
        spec: TaskSpec::new("TaskB", priority_above_idle(1)).pinned(CoreAffinity::CORE0),
        script: &TASK_B,
    },
    RoleSpec {
        role: TaskRole::C,
        spec: TaskSpec::new("TaskC", priority_above_idle(1)),
        script: &TASK_C,
    },
];

/// Either worker stamped its entry while the other's section was open.
fn sections_overlap(flags: &ObservationFlags) -> bool {
    flags.stamped_inside(
        Mark::BEnteredCritical,
        Mark::AEnteredCritical,
        Mark::AExitedCritical,
    ) || flags.stamped_inside(
        Mark::AEnteredCritical,
        Mark::BEnteredCritical,
        Mark::BExitedCritical,
    )
}

pub struct ExclusionScenario;

impl Scenario for ExclusionScenario {
    fn name(&self) -> &'static str {
        "exclusion"
    }

    fn check_name(&self) -> &'static str {
        "validate_cross_core_mutual_exclusion"
    }

    fn roles(&self) -> &'static [RoleSpec] {
        &ROLES
    }

    fn limits(&self) -> Limits {
        Limits::new(EXCLUSION_SWITCH_CEILING)
    }

    fn on_switch(&self, flags: &ObservationFlags, _sample: &SwitchSample) -> Option<Verdict> {
        sections_overlap(flags).then_some(Verdict::Failed(FailureCause::Contradiction))
    }

    fn judge(&self, flags: &ObservationFlags) -> Option<Verdict> {
        if sections_overlap(flags) {
            Some(Verdict::Failed(FailureCause::Contradiction))
        } else if flags.all_ran() && flags.is_marked(Mark::AEnteredCritical) {
            Some(Verdict::Passed)
        } else {
            None
        }
    }

    fn progress_made(&self, flags: &ObservationFlags) -> bool {
        flags.all_ran()
    }

    fn traced_marks(&self) -> &'static [Mark] {
        &[
            Mark::AEnteredCritical,
            Mark::AExitedCritical,
            Mark::BEnteredCritical,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ran() -> ObservationFlags {
        let flags = ObservationFlags::new();
        for role in TaskRole::ALL {
            flags.note_ran(role);
        }
        flags
    }

    #[test]
    fn b_inside_open_section_is_a_contradiction() {
        let flags = all_ran();
        flags.stamp(Mark::AEnteredCritical);
        flags.stamp(Mark::BEnteredCritical);
        let verdict = Some(Verdict::Failed(FailureCause::Contradiction));
        assert_eq!(ExclusionScenario.on_switch(&flags, &SwitchSample::empty()), verdict);
        assert_eq!(ExclusionScenario.judge(&flags), verdict);
    }

    #[test]
    fn b_after_a_exits_passes() {
        let flags = all_ran();
        flags.stamp(Mark::AEnteredCritical);
        flags.stamp(Mark::AExitedCritical);
        flags.stamp(Mark::BEnteredCritical);
        assert_eq!(ExclusionScenario.on_switch(&flags, &SwitchSample::empty()), None);
        assert_eq!(ExclusionScenario.judge(&flags), Some(Verdict::Passed));
    }

    #[test]
    fn a_inside_b_section_is_a_contradiction() {
        let flags = all_ran();
        flags.stamp(Mark::BEnteredCritical);
        flags.stamp(Mark::AEnteredCritical);
        assert_eq!(
            ExclusionScenario.judge(&flags),
            Some(Verdict::Failed(FailureCause::Contradiction))
        );
    }

    #[test]
    fn judge_waits_for_liveness() {
        let flags = ObservationFlags::new();
        flags.note_ran(TaskRole::A);
        flags.stamp(Mark::AEnteredCritical);
        assert_eq!(ExclusionScenario.judge(&flags), None);
        assert!(!ExclusionScenario.progress_made(&flags));
        flags.note_ran(TaskRole::B);
        flags.note_ran(TaskRole::C);
        assert!(ExclusionScenario.progress_made(&flags));
        assert_eq!(ExclusionScenario.judge(&flags), Some(Verdict::Passed));
    }
}
