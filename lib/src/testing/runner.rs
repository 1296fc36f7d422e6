//! Check runner with begin/end framing.

use super::{TestResult, TestRunSummary, Verbosity};
use crate::platform::Platform;
use crate::{klog_debug, klog_info};

/// One framed group of checks.
pub struct TestRun<'a> {
    platform: &'a dyn Platform,
    verbosity: Verbosity,
    suite: &'static str,
    started_us: u64,
    summary: TestRunSummary,
}

impl<'a> TestRun<'a> {
    pub fn begin(platform: &'a dyn Platform, suite: &'static str, verbosity: Verbosity) -> Self {
        if verbosity != Verbosity::Quiet {
            klog_info!("SUITE BEGIN: {}", suite);
        }
        Self {
            platform,
            verbosity,
            suite,
            started_us: platform.monotonic_us(),
            summary: TestRunSummary::default(),
        }
    }

    pub fn run<F>(&mut self, name: &str, check: F) -> TestResult
    where
        F: FnOnce() -> TestResult,
    {
        if self.verbosity == Verbosity::Verbose {
            klog_debug!("RUN: {}", name);
        }
        let result = check();
        self.summary.add(result);
        if self.verbosity != Verbosity::Quiet {
            klog_info!("{}: {}", result.as_str(), name);
        }
        result
    }

    pub fn end(mut self) -> TestRunSummary {
        let elapsed_us = self.platform.monotonic_us().saturating_sub(self.started_us);
        self.summary.elapsed_ms = (elapsed_us / 1000).min(u32::MAX as u64) as u32;
        if self.verbosity != Verbosity::Quiet {
            klog_info!(
                "SUITE END: {} total={} passed={} failed={} skipped={} elapsed={}ms",
                self.suite,
                self.summary.total,
                self.summary.passed,
                self.summary.failed,
                self.summary.skipped,
                self.summary.elapsed_ms
            );
        }
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU64, Ordering};

    use smpv_abi::CoreId;

    use super::*;
    use crate::platform::{CoreEntry, PinId, PlatformError};

    struct Clock(AtomicU64);

    impl Platform for Clock {
        fn set_pin(&self, _pin: PinId) {}
        fn clear_pin(&self, _pin: PinId) {}
        fn delay_ms(&self, ms: u32) {
            self.0.fetch_add(ms as u64 * 1000, Ordering::Relaxed);
        }
        fn busy_wait_us(&self, us: u32) {
            self.0.fetch_add(us as u64, Ordering::Relaxed);
        }
        fn monotonic_us(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
        fn launch_on_core(&self, core: CoreId, _entry: CoreEntry) -> Result<(), PlatformError> {
            Err(PlatformError::CoreUnavailable(core))
        }
        fn report(&self, _bytes: &[u8]) {}
        fn flush(&self) {}
    }

    #[test]
    fn run_tracks_results_and_elapsed_time() {
        let clock = Clock(AtomicU64::new(0));
        let mut run = TestRun::begin(&clock, "suite", Verbosity::Quiet);
        assert!(run.run("ok", || TestResult::Pass).is_pass());
        clock.delay_ms(7);
        assert!(run.run("bad", || TestResult::Fail).is_failure());
        let summary = run.end();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.elapsed_ms, 7);
    }
}
