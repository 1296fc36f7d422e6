//! Task ABI types shared between the harness and the scheduler under test.
//!
//! The scheduler owns its task control blocks; the harness only ever sees
//! opaque [`TaskHandle`]s and the coarse [`TaskSample`] records returned by a
//! system-state query.

use bitflags::bitflags;

// --- Configuration ---

/// Number of processing cores the harness is built for.
pub const MAX_CORES: usize = 2;
/// Maximum number of task descriptors sampled per switch event. Tasks past
/// this bound are not sampled at all.
pub const MAX_SAMPLED_TASKS: usize = 16;
/// Default stack budget for worker tasks, in scheduler stack words.
pub const WORKER_STACK_WORDS: u32 = 256;
pub const INVALID_TASK_HANDLE: TaskHandle = TaskHandle(0xFFFF_FFFF);

// --- Task Priority ---

pub const TASK_PRIORITY_IDLE: u8 = 0;

/// Priority `offset` levels above the idle task.
#[inline]
pub const fn priority_above_idle(offset: u8) -> u8 {
    TASK_PRIORITY_IDLE.saturating_add(offset)
}

// --- CoreId ---

/// Index of a processing core, always below [`MAX_CORES`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(u8);

impl CoreId {
    pub const CORE0: Self = Self(0);
    pub const CORE1: Self = Self(1);

    #[inline]
    pub const fn new(raw: u8) -> Option<Self> {
        if (raw as usize) < MAX_CORES {
            Some(Self(raw))
        } else {
            None
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// All cores, lowest index first.
    pub fn all() -> impl Iterator<Item = CoreId> {
        (0..MAX_CORES as u8).map(CoreId)
    }
}

impl core::fmt::Display for CoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "core{}", self.0)
    }
}

// --- CoreAffinity ---

bitflags! {
    /// Set of cores a task may be scheduled on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CoreAffinity: u32 {
        const CORE0 = 1 << 0;
        const CORE1 = 1 << 1;
    }
}

impl CoreAffinity {
    /// Mask containing only `core`.
    #[inline]
    pub const fn only(core: CoreId) -> Self {
        Self::from_bits_truncate(1 << core.as_u8())
    }

    #[inline]
    pub const fn allows(self, core: CoreId) -> bool {
        self.contains(Self::only(core))
    }
}

// --- TaskHandle ---

/// Opaque, stable identifier of a live task, assigned by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u32);

impl TaskHandle {
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_TASK_HANDLE.0
    }
}

// --- RunState ---

/// Coarse run state reported by the scheduler's system-state query.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunState {
    /// Currently executing on a core.
    Running = 0,
    #[default]
    Ready = 1,
    Blocked = 2,
    Suspended = 3,
    Deleted = 4,
}

impl RunState {
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Ready,
            2 => Self::Blocked,
            3 => Self::Suspended,
            _ => Self::Deleted,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

// --- TaskSample ---

/// One entry of a scheduling snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSample {
    pub handle: TaskHandle,
    pub state: RunState,
    /// Core the task is executing on; only meaningful while `Running`.
    pub core: Option<CoreId>,
}

impl TaskSample {
    pub const EMPTY: Self = Self {
        handle: INVALID_TASK_HANDLE,
        state: RunState::Deleted,
        core: None,
    };

    #[inline]
    pub const fn running(handle: TaskHandle, core: CoreId) -> Self {
        Self {
            handle,
            state: RunState::Running,
            core: Some(core),
        }
    }

    #[inline]
    pub const fn with_state(handle: TaskHandle, state: RunState) -> Self {
        Self {
            handle,
            state,
            core: None,
        }
    }
}

impl Default for TaskSample {
    fn default() -> Self {
        Self::EMPTY
    }
}

// --- TaskSpec ---

/// Creation parameters handed to the scheduler for one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub stack_words: u32,
    pub priority: u8,
    /// `None` leaves the task free to run on any core.
    pub affinity: Option<CoreAffinity>,
}

impl TaskSpec {
    pub const fn new(name: &'static str, priority: u8) -> Self {
        Self {
            name,
            stack_words: WORKER_STACK_WORDS,
            priority,
            affinity: None,
        }
    }

    pub const fn pinned(mut self, affinity: CoreAffinity) -> Self {
        self.affinity = Some(affinity);
        self
    }

    /// Whether the task may run on `core`.
    #[inline]
    pub const fn may_run_on(&self, core: CoreId) -> bool {
        match self.affinity {
            Some(mask) => mask.allows(core),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_id_rejects_out_of_range() {
        assert_eq!(CoreId::new(1), Some(CoreId::CORE1));
        assert_eq!(CoreId::new(MAX_CORES as u8), None);
        assert_eq!(CoreId::all().count(), MAX_CORES);
    }

    #[test]
    fn affinity_only_allows_its_core() {
        let mask = CoreAffinity::only(CoreId::CORE1);
        assert_eq!(mask, CoreAffinity::CORE1);
        assert!(mask.allows(CoreId::CORE1));
        assert!(!mask.allows(CoreId::CORE0));
        assert!(CoreAffinity::all().allows(CoreId::CORE0));
    }

    #[test]
    fn unpinned_spec_runs_anywhere() {
        let spec = TaskSpec::new("TaskC", priority_above_idle(1));
        assert!(CoreId::all().all(|core| spec.may_run_on(core)));

        let pinned = spec.pinned(CoreAffinity::CORE0);
        assert!(pinned.may_run_on(CoreId::CORE0));
        assert!(!pinned.may_run_on(CoreId::CORE1));
    }

    #[test]
    fn run_state_round_trips_known_values() {
        assert_eq!(RunState::from_u8(RunState::Blocked.as_u8()), RunState::Blocked);
        assert_eq!(RunState::from_u8(0xFF), RunState::Deleted);
        assert!(RunState::Running.is_running());
        assert!(!TaskSample::EMPTY.handle.is_valid());
    }
}
