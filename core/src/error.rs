//! Error types for harness setup and the failure taxonomy of a run.

use core::fmt;

use smpv_abi::TaskRole;

/// Errors the scheduler can return while creating tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    OutOfMemory,
    /// Affinity mask selects no core this scheduler runs.
    InvalidAffinity,
    TooManyTasks,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory for task stack"),
            Self::InvalidAffinity => write!(f, "affinity mask selects no core"),
            Self::TooManyTasks => write!(f, "task table full"),
        }
    }
}

/// Harness setup failure. Any of these ends the run before the scheduler
/// starts and is reported as a failed scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessError {
    Scheduler(SchedError),
    AlreadyInstalled,
    RoleUnbound(TaskRole),
    RoleAlreadyBound(TaskRole),
    UnsupportedCoreCount { found: usize, required: usize },
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduler(err) => write!(f, "scheduler: {}", err),
            Self::AlreadyInstalled => write!(f, "harness context already installed"),
            Self::RoleUnbound(role) => write!(f, "{} has no task bound", role),
            Self::RoleAlreadyBound(role) => write!(f, "{} bound twice", role),
            Self::UnsupportedCoreCount { found, required } => {
                write!(f, "scheduler runs {} cores, scenario needs {}", found, required)
            }
        }
    }
}

impl From<SchedError> for HarnessError {
    fn from(err: SchedError) -> Self {
        Self::Scheduler(err)
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Why a scenario failed. Every cause is terminal for the run.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Attempt budget ran out while the outcome was still pending.
    Convergence = 0,
    /// An observation violated the scenario's invariant.
    Contradiction = 1,
    /// Switch ceiling exceeded before the scenario made progress.
    Livelock = 2,
}

impl FailureCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Convergence => "convergence",
            Self::Contradiction => "contradiction",
            Self::Livelock => "livelock",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
