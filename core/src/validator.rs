//! Scenario validator: bounded polling of the run's outcome.

use smpv_lib::testing::TestResult;
use smpv_lib::{assert_test, klog_debug, klog_info};

use crate::error::FailureCause;
use crate::observation::{Outcome, Verdict};
use crate::run::ScenarioRun;
use crate::scenario::Limits;
use crate::scheduler::SchedulerOps;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Poll {
    /// Still pending; poll again after the attempt spacing.
    Retry,
    Done(Outcome),
}

/// Attempt budget for one validation. Strictly increasing, and once it
/// reaches the ceiling no further polls are counted.
#[derive(Clone, Copy, Debug)]
pub struct Validator {
    attempts: u32,
    max_attempts: u32,
    spacing_ms: u32,
}

impl Validator {
    pub fn new(limits: &Limits) -> Self {
        Self {
            attempts: 0,
            max_attempts: limits.attempts.max(1),
            spacing_ms: limits.attempt_spacing_ms,
        }
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[inline]
    pub fn spacing_ms(&self) -> u32 {
        self.spacing_ms
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn poll(&mut self, run: &ScenarioRun) -> Poll {
        if self.is_exhausted() {
            return Poll::Done(run.outcome());
        }
        self.attempts += 1;

        if let Some(verdict) = run.scenario().judge(&run.flags) {
            run.conclude(verdict);
        }
        let outcome = run.outcome();
        if outcome.is_terminal() {
            klog_debug!(
                "VALIDATE: settled {} after {} attempt(s)",
                outcome,
                self.attempts
            );
            return Poll::Done(outcome);
        }

        if self.is_exhausted() {
            run.conclude(Verdict::Failed(FailureCause::Convergence));
            klog_info!(
                "VALIDATE: still pending after {} attempts, giving up",
                self.attempts
            );
            return Poll::Done(run.outcome());
        }
        klog_debug!("VALIDATE: attempt {}/{} pending", self.attempts, self.max_attempts);
        Poll::Retry
    }
}

/// Poll from task context, sleeping the attempt spacing between polls.
pub fn validate_blocking(run: &ScenarioRun, sched: &dyn SchedulerOps) -> Outcome {
    let mut validator = Validator::new(run.limits());
    let ticks = sched.ms_to_ticks(validator.spacing_ms());
    loop {
        match validator.poll(run) {
            Poll::Retry => sched.delay_ticks(ticks),
            Poll::Done(outcome) => return outcome,
        }
    }
}

/// The registered check: the run must have passed.
pub fn assert_passed(outcome: Outcome) -> TestResult {
    assert_test!(outcome.is_passed(), "expected passed, outcome {}", outcome);
    TestResult::Pass
}

#[cfg(test)]
mod tests {
    use smpv_abi::TaskRole;

    use super::*;
    use crate::observation::Mark;
    use crate::scenario::{AFFINITY, EXCLUSION, Scenario};
    use crate::test_fixtures::FakeScheduler;

    #[test]
    fn settles_as_soon_as_judge_decides() {
        let run = ScenarioRun::with_defaults(&EXCLUSION);
        for role in TaskRole::ALL {
            run.flags.note_ran(role);
        }
        run.flags.stamp(Mark::AEnteredCritical);
        let mut validator = Validator::new(run.limits());
        assert_eq!(validator.poll(&run), Poll::Done(Outcome::Passed));
        assert_eq!(validator.attempts(), 1);
    }

    #[test]
    fn exhausting_the_budget_fails_convergence() {
        let run = ScenarioRun::new(&AFFINITY, AFFINITY.limits().with_attempts(3, 10));
        let mut validator = Validator::new(run.limits());
        assert_eq!(validator.poll(&run), Poll::Retry);
        assert_eq!(validator.poll(&run), Poll::Retry);
        assert_eq!(
            validator.poll(&run),
            Poll::Done(Outcome::Failed(FailureCause::Convergence))
        );
        assert!(validator.is_exhausted());
        assert_eq!(
            validator.poll(&run),
            Poll::Done(Outcome::Failed(FailureCause::Convergence))
        );
        assert_eq!(validator.attempts(), 3);
    }

    #[test]
    fn terminal_outcome_is_never_overwritten() {
        let run = ScenarioRun::new(&AFFINITY, AFFINITY.limits().with_attempts(1, 10));
        run.conclude(Verdict::Failed(FailureCause::Livelock));
        let mut validator = Validator::new(run.limits());
        assert_eq!(
            validator.poll(&run),
            Poll::Done(Outcome::Failed(FailureCause::Livelock))
        );
    }

    #[test]
    fn blocking_validation_sleeps_between_polls() {
        let sched = FakeScheduler::new();
        let run = ScenarioRun::new(&AFFINITY, AFFINITY.limits().with_attempts(25, 10));
        let outcome = validate_blocking(&run, &sched);
        assert_eq!(outcome, Outcome::Failed(FailureCause::Convergence));
        assert_eq!(sched.delayed_ticks(), 24 * 10);
    }

    #[test]
    fn check_passes_only_on_passed() {
        assert_eq!(assert_passed(Outcome::Passed), TestResult::Pass);
        assert_eq!(assert_passed(Outcome::Pending), TestResult::Fail);
        assert_eq!(
            assert_passed(Outcome::Failed(FailureCause::Contradiction)),
            TestResult::Fail
        );
    }
}
