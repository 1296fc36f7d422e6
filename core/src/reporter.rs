//! Verdict reporter: trace line, registered check and the final signal.

use core::fmt::{self, Write};

use smpv_abi::TaskRole;
use smpv_lib::platform::{LED_PIN, Platform};
use smpv_lib::string::LineBuf;
use smpv_lib::testing::{TestRun, TestRunSummary, Verbosity};
use smpv_lib::{klog_debug, klog_info, klog_warn};

use crate::observation::Outcome;
use crate::run::ScenarioRun;
use crate::validator;

pub const TEST_PASSED: &[u8] = b"TEST PASSED\n";
pub const TEST_FAILED: &[u8] = b"TEST FAILED\n";
const ALL_TASKS_HAVE_RUN: &[u8] = b"allTasksHaveRun\n";
const TRACE_LINE_CAP: usize = 128;

#[inline]
fn flag(value: bool) -> &'static str {
    if value { "T" } else { "F" }
}

/// Map the outcome to the pin and the fixed report text, then flush.
pub fn report_verdict(platform: &dyn Platform, outcome: Outcome) {
    if outcome.is_passed() {
        platform.set_pin(LED_PIN);
        platform.report(TEST_PASSED);
    } else {
        platform.report(TEST_FAILED);
    }
    platform.flush();
}

/// Report a run that never got to start.
pub fn report_setup_failure(platform: &dyn Platform) {
    platform.report(TEST_FAILED);
    platform.flush();
}

fn write_trace_line<W: Write>(out: &mut W, run: &ScenarioRun) -> fmt::Result {
    let flags = &run.flags;
    write!(out, "TRACE: switchCount={},", run.switch_count())?;
    for (i, role) in TaskRole::ALL.into_iter().enumerate() {
        let sep = if i == 0 { " " } else { "," };
        write!(out, "{}{}", sep, flag(flags.has_run(role)))?;
    }
    for (i, mark) in run.scenario().traced_marks().iter().enumerate() {
        let sep = if i == 0 { " " } else { "," };
        write!(out, "{}{}", sep, flag(flags.is_marked(*mark)))?;
    }
    out.write_str("\n")
}

/// `TRACE: switchCount=N, A,B,C m1,m2,...` followed by one note per fact.
pub fn report_trace(platform: &dyn Platform, run: &ScenarioRun) {
    let flags = &run.flags;
    let mut line = LineBuf::<TRACE_LINE_CAP>::new();
    let cut = write_trace_line(&mut line, run).is_err() || line.is_truncated();
    platform.report(line.as_bytes());
    if cut {
        klog_warn!("REPORT: trace line cut at {} bytes", TRACE_LINE_CAP);
        platform.report(b"\n");
    }
    klog_debug!("{}", line.as_str().trim_end());

    if flags.all_ran() {
        platform.report(ALL_TASKS_HAVE_RUN);
    }
    let marks = run.scenario().traced_marks();
    for mark in marks.iter().filter(|mark| flags.is_marked(**mark)) {
        platform.report(mark.note().as_bytes());
    }
}

/// Run the scenario's check under begin/end framing, then emit the trace
/// and the verdict. Only the first call of a run reports.
pub fn report_checks(
    run: &ScenarioRun,
    platform: &dyn Platform,
    verbosity: Verbosity,
) -> Option<TestRunSummary> {
    if !run.claim_report() {
        return None;
    }
    let scenario = run.scenario();
    let outcome = run.outcome();

    let mut checks = TestRun::begin(platform, scenario.name(), verbosity);
    checks.run(scenario.check_name(), || validator::assert_passed(outcome));
    let summary = checks.end();

    report_trace(platform, run);
    report_verdict(platform, outcome);
    klog_info!("HARNESS: {} {}", scenario.name(), outcome);
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCause;
    use crate::observation::{Mark, Verdict};
    use crate::scenario::{AFFINITY, EXCLUSION};
    use crate::test_fixtures::FakePlatform;

    #[test]
    fn passed_sets_led_and_flushes() {
        let platform = FakePlatform::new();
        report_verdict(&platform, Outcome::Passed);
        assert!(platform.pin_is_set(LED_PIN));
        assert_eq!(platform.report_text(), "TEST PASSED\n");
        assert_eq!(platform.flushes(), 1);
    }

    #[test]
    fn anything_else_reports_failed_with_pin_clear() {
        for outcome in [
            Outcome::Pending,
            Outcome::Failed(FailureCause::Convergence),
            Outcome::Failed(FailureCause::Livelock),
        ] {
            let platform = FakePlatform::new();
            report_verdict(&platform, outcome);
            assert!(!platform.pin_is_set(LED_PIN));
            assert_eq!(platform.report_text(), "TEST FAILED\n");
            assert_eq!(platform.flushes(), 1);
        }
    }

    #[test]
    fn trace_line_lists_roles_then_marks() {
        let platform = FakePlatform::new();
        let run = ScenarioRun::with_defaults(&EXCLUSION);
        for role in TaskRole::ALL {
            run.flags.note_ran(role);
        }
        run.flags.stamp(Mark::AEnteredCritical);
        report_trace(&platform, &run);
        assert_eq!(
            platform.report_text(),
            "TRACE: switchCount=0, T,T,T T,F,F\n\
             allTasksHaveRun\n\
             taskAHasEnteredCriticalSection\n"
        );
    }

    #[test]
    fn short_buffer_records_a_cut_trace_line() {
        let run = ScenarioRun::with_defaults(&EXCLUSION);
        let mut line = LineBuf::<16>::new();
        write_trace_line(&mut line, &run).unwrap();
        assert!(line.is_truncated());
        assert_eq!(line.as_str(), "TRACE: switchCou");

        let mut full = LineBuf::<TRACE_LINE_CAP>::new();
        write_trace_line(&mut full, &run).unwrap();
        assert!(!full.is_truncated());
        assert!(full.as_str().ends_with(" F,F,F F,F,F\n"));
    }

    #[test]
    fn checks_report_once_per_run() {
        let platform = FakePlatform::new();
        let run = ScenarioRun::with_defaults(&AFFINITY);
        run.conclude(Verdict::Passed);

        let summary = report_checks(&run, &platform, Verbosity::Quiet).unwrap();
        assert!(summary.all_passed());
        assert!(run.is_reported());
        assert!(platform.report_text().ends_with("TEST PASSED\n"));

        assert!(report_checks(&run, &platform, Verbosity::Quiet).is_none());
        assert_eq!(platform.report_text().matches("TEST PASSED").count(), 1);
    }

    #[test]
    fn pending_run_reports_a_failed_check() {
        let platform = FakePlatform::new();
        let run = ScenarioRun::with_defaults(&AFFINITY);
        let summary = report_checks(&run, &platform, Verbosity::Quiet).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(platform.report_text().ends_with("TEST FAILED\n"));
    }
}
