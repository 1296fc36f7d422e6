//! Shared observation state of one scenario run.
//!
//! Every field is a single atomic word with exactly one writer: the switch
//! observer owns the `has_run` bits, each worker owns its own marks. Nothing
//! here is ever reset during a run.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use smpv_abi::{INVALID_TASK_HANDLE, ROLE_COUNT, TaskHandle, TaskRole};

use crate::error::{FailureCause, HarnessError, HarnessResult};

// =============================================================================
// Marks
// =============================================================================

pub const MARK_COUNT: usize = 7;

/// Write-once event a worker records about itself.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    AEnteredCritical = 0,
    AExitedCritical = 1,
    BEnteredCritical = 2,
    BExitedCritical = 3,
    NotifiedPeer = 4,
    PreemptionDisabled = 5,
    PreemptionEnabled = 6,
}

impl Mark {
    pub const ALL: [Mark; MARK_COUNT] = [
        Mark::AEnteredCritical,
        Mark::AExitedCritical,
        Mark::BEnteredCritical,
        Mark::BExitedCritical,
        Mark::NotifiedPeer,
        Mark::PreemptionDisabled,
        Mark::PreemptionEnabled,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    /// Short column name used in the trace line.
    pub const fn label(self) -> &'static str {
        match self {
            Self::AEnteredCritical => "enteredA",
            Self::AExitedCritical => "exitedA",
            Self::BEnteredCritical => "enteredB",
            Self::BExitedCritical => "exitedB",
            Self::NotifiedPeer => "notified",
            Self::PreemptionDisabled => "preemptOff",
            Self::PreemptionEnabled => "preemptOn",
        }
    }

    /// Note emitted under the trace line when the mark is set.
    pub const fn note(self) -> &'static str {
        match self {
            Self::AEnteredCritical => "taskAHasEnteredCriticalSection\n",
            Self::AExitedCritical => "taskAHasExitedCriticalSection\n",
            Self::BEnteredCritical => "taskBHasEnteredCriticalSection\n",
            Self::BExitedCritical => "taskBHasExitedCriticalSection\n",
            Self::NotifiedPeer => "taskAHasNotifiedPeer\n",
            Self::PreemptionDisabled => "taskAHasDisabledPreemption\n",
            Self::PreemptionEnabled => "taskAHasEnabledPreemption\n",
        }
    }
}

// =============================================================================
// Observation flags
// =============================================================================

pub struct ObservationFlags {
    has_run: [AtomicBool; ROLE_COUNT],
    phase: AtomicU32,
    /// Sequence stamp per mark, 0 while unset.
    marks: [AtomicU32; MARK_COUNT],
    seq: AtomicU32,
}

impl ObservationFlags {
    pub const fn new() -> Self {
        Self {
            has_run: [const { AtomicBool::new(false) }; ROLE_COUNT],
            phase: AtomicU32::new(0),
            marks: [const { AtomicU32::new(0) }; MARK_COUNT],
            seq: AtomicU32::new(0),
        }
    }

    /// Record that `role` was sampled running. Never cleared.
    #[inline]
    pub fn note_ran(&self, role: TaskRole) {
        let flag = &self.has_run[role.index()];
        if !flag.load(Ordering::Relaxed) {
            flag.store(true, Ordering::Release);
        }
    }

    #[inline]
    pub fn has_run(&self, role: TaskRole) -> bool {
        self.has_run[role.index()].load(Ordering::Acquire)
    }

    pub fn all_ran(&self) -> bool {
        TaskRole::ALL.iter().all(|&role| self.has_run(role))
    }

    /// Bump the phase counter and return the new value.
    pub fn advance_phase(&self) -> u32 {
        self.phase.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    #[inline]
    pub fn phase(&self) -> u32 {
        self.phase.load(Ordering::Acquire)
    }

    /// Set `mark` if unset. Returns the stamp in effect afterwards, so a
    /// repeated call reports the original stamp.
    pub fn stamp(&self, mark: Mark) -> u32 {
        let seq = self.seq.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        match self.marks[mark.index()].compare_exchange(
            0,
            seq,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => seq,
            Err(existing) => existing,
        }
    }

    #[inline]
    pub fn stamp_of(&self, mark: Mark) -> Option<u32> {
        match self.marks[mark.index()].load(Ordering::Acquire) {
            0 => None,
            stamp => Some(stamp),
        }
    }

    #[inline]
    pub fn is_marked(&self, mark: Mark) -> bool {
        self.stamp_of(mark).is_some()
    }

    /// Both marks are set and `earlier` was stamped first.
    pub fn happened_before(&self, earlier: Mark, later: Mark) -> bool {
        match (self.stamp_of(earlier), self.stamp_of(later)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// Whether `mark` was stamped while the section delimited by
    /// `opened`/`closed` was open. An unset `closed` means still open.
    pub fn stamped_inside(&self, mark: Mark, opened: Mark, closed: Mark) -> bool {
        let (Some(at), Some(open)) = (self.stamp_of(mark), self.stamp_of(opened)) else {
            return false;
        };
        match self.stamp_of(closed) {
            Some(close) => open < at && at < close,
            None => open < at,
        }
    }
}

impl Default for ObservationFlags {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Terminal result of a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(FailureCause),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Passed,
    Failed(FailureCause),
}

const OUTCOME_PENDING: u8 = 0;
const OUTCOME_PASSED: u8 = 1;
const OUTCOME_FAILED_BASE: u8 = 2;

impl Outcome {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[inline]
    pub const fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    const fn to_raw(self) -> u8 {
        match self {
            Self::Pending => OUTCOME_PENDING,
            Self::Passed => OUTCOME_PASSED,
            Self::Failed(cause) => OUTCOME_FAILED_BASE + cause as u8,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            OUTCOME_PENDING => Self::Pending,
            OUTCOME_PASSED => Self::Passed,
            2 => Self::Failed(FailureCause::Convergence),
            3 => Self::Failed(FailureCause::Contradiction),
            _ => Self::Failed(FailureCause::Livelock),
        }
    }
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => Self::Passed,
            Verdict::Failed(cause) => Self::Failed(cause),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Passed => f.write_str("passed"),
            Self::Failed(cause) => write!(f, "failed ({})", cause),
        }
    }
}

/// Outcome in one byte. Leaves Pending at most once.
pub struct OutcomeCell(AtomicU8);

impl OutcomeCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(OUTCOME_PENDING))
    }

    #[inline]
    pub fn load(&self) -> Outcome {
        Outcome::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Move out of Pending. Returns `false` if another verdict won.
    pub fn conclude(&self, verdict: Verdict) -> bool {
        self.0
            .compare_exchange(
                OUTCOME_PENDING,
                Outcome::from(verdict).to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for OutcomeCell {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Role table
// =============================================================================

/// Role ↔ task handle side table, filled once at setup.
pub struct RoleTable {
    handles: [AtomicU32; ROLE_COUNT],
}

impl RoleTable {
    pub const fn new() -> Self {
        Self {
            handles: [const { AtomicU32::new(INVALID_TASK_HANDLE.0) }; ROLE_COUNT],
        }
    }

    pub fn bind(&self, role: TaskRole, handle: TaskHandle) -> HarnessResult<()> {
        self.handles[role.index()]
            .compare_exchange(
                INVALID_TASK_HANDLE.0,
                handle.as_u32(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| HarnessError::RoleAlreadyBound(role))
    }

    pub fn handle_of(&self, role: TaskRole) -> Option<TaskHandle> {
        let handle = TaskHandle(self.handles[role.index()].load(Ordering::Acquire));
        handle.is_valid().then_some(handle)
    }

    pub fn role_of(&self, handle: TaskHandle) -> Option<TaskRole> {
        if !handle.is_valid() {
            return None;
        }
        TaskRole::ALL
            .into_iter()
            .find(|&role| self.handles[role.index()].load(Ordering::Acquire) == handle.as_u32())
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_run_is_sticky() {
        let flags = ObservationFlags::new();
        assert!(!flags.has_run(TaskRole::B));
        flags.note_ran(TaskRole::B);
        flags.note_ran(TaskRole::B);
        assert!(flags.has_run(TaskRole::B));
        assert!(!flags.all_ran());
        flags.note_ran(TaskRole::A);
        flags.note_ran(TaskRole::C);
        assert!(flags.all_ran());
        assert!(flags.has_run(TaskRole::B));
    }

    #[test]
    fn marks_keep_their_first_stamp() {
        let flags = ObservationFlags::new();
        let first = flags.stamp(Mark::AEnteredCritical);
        let later = flags.stamp(Mark::BEnteredCritical);
        assert_eq!(flags.stamp(Mark::AEnteredCritical), first);
        assert!(first < later);
        assert!(flags.happened_before(Mark::AEnteredCritical, Mark::BEnteredCritical));
        assert!(!flags.happened_before(Mark::BEnteredCritical, Mark::AEnteredCritical));
        assert!(!flags.happened_before(Mark::AEnteredCritical, Mark::AExitedCritical));
    }

    #[test]
    fn stamped_inside_treats_unset_close_as_open() {
        let flags = ObservationFlags::new();
        flags.stamp(Mark::AEnteredCritical);
        flags.stamp(Mark::BEnteredCritical);
        assert!(flags.stamped_inside(
            Mark::BEnteredCritical,
            Mark::AEnteredCritical,
            Mark::AExitedCritical
        ));

        let ordered = ObservationFlags::new();
        ordered.stamp(Mark::AEnteredCritical);
        ordered.stamp(Mark::AExitedCritical);
        ordered.stamp(Mark::BEnteredCritical);
        assert!(!ordered.stamped_inside(
            Mark::BEnteredCritical,
            Mark::AEnteredCritical,
            Mark::AExitedCritical
        ));
    }

    #[test]
    fn outcome_leaves_pending_once() {
        let cell = OutcomeCell::new();
        assert_eq!(cell.load(), Outcome::Pending);
        assert!(cell.conclude(Verdict::Failed(FailureCause::Livelock)));
        assert!(!cell.conclude(Verdict::Passed));
        assert_eq!(cell.load(), Outcome::Failed(FailureCause::Livelock));
    }

    #[test]
    fn outcome_raw_encoding_covers_every_cause() {
        for cause in [
            FailureCause::Convergence,
            FailureCause::Contradiction,
            FailureCause::Livelock,
        ] {
            let outcome = Outcome::Failed(cause);
            assert_eq!(Outcome::from_raw(outcome.to_raw()), outcome);
        }
    }

    #[test]
    fn role_table_binds_once() {
        let table = RoleTable::new();
        assert_eq!(table.handle_of(TaskRole::A), None);
        table.bind(TaskRole::A, TaskHandle(7)).unwrap();
        assert_eq!(
            table.bind(TaskRole::A, TaskHandle(8)),
            Err(HarnessError::RoleAlreadyBound(TaskRole::A))
        );
        assert_eq!(table.handle_of(TaskRole::A), Some(TaskHandle(7)));
        assert_eq!(table.role_of(TaskHandle(7)), Some(TaskRole::A));
        assert_eq!(table.role_of(TaskHandle(8)), None);
        assert_eq!(table.role_of(INVALID_TASK_HANDLE), None);
    }
}
