// Run summary aggregated across the checks of one scenario.

use super::TestResult;

/// Aggregated results from one reporting pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestRunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub elapsed_ms: u32,
}

impl TestRunSummary {
    /// Count one check result.
    pub fn add(&mut self, result: TestResult) {
        self.total = self.total.saturating_add(1);
        match result {
            TestResult::Pass => self.passed = self.passed.saturating_add(1),
            TestResult::Fail => self.failed = self.failed.saturating_add(1),
            TestResult::Skipped => self.skipped = self.skipped.saturating_add(1),
        }
    }

    /// True when at least one check ran and none failed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.passed > 0
    }
}
