//! Switch observer.
//!
//! Called on every context switch from the scheduler's own context. It takes
//! one bounded snapshot of the task table, marks the roles it sees running
//! and asks the scenario whether the sample settles the run. It never blocks,
//! never logs and never allocates.

use smpv_abi::{CoreId, MAX_SAMPLED_TASKS, ROLE_COUNT, TaskRole, TaskSample};

use crate::error::FailureCause;
use crate::observation::Verdict;
use crate::run::ScenarioRun;
use crate::scenario::role_spec;
use crate::scheduler::SchedulerOps;

/// Stack-local copy of the task table. Tasks past the capacity are not
/// sampled.
pub struct TaskSnapshot {
    samples: [TaskSample; MAX_SAMPLED_TASKS],
    len: usize,
}

impl TaskSnapshot {
    pub fn capture(sched: &dyn SchedulerOps) -> Self {
        let mut samples = [TaskSample::EMPTY; MAX_SAMPLED_TASKS];
        let len = sched.system_state(&mut samples).min(MAX_SAMPLED_TASKS);
        Self { samples, len }
    }

    #[inline]
    pub fn as_slice(&self) -> &[TaskSample] {
        &self.samples[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Per-role view of one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwitchSample {
    running: [bool; ROLE_COUNT],
    cores: [Option<CoreId>; ROLE_COUNT],
}

impl SwitchSample {
    pub const fn empty() -> Self {
        Self {
            running: [false; ROLE_COUNT],
            cores: [None; ROLE_COUNT],
        }
    }

    pub fn from_snapshot(snapshot: &TaskSnapshot, run: &ScenarioRun) -> Self {
        let mut sample = Self::empty();
        for task in snapshot.as_slice() {
            if !task.state.is_running() {
                continue;
            }
            if let Some(role) = run.roles.role_of(task.handle) {
                sample.set_running(role, task.core);
            }
        }
        sample
    }

    pub fn set_running(&mut self, role: TaskRole, core: Option<CoreId>) {
        self.running[role.index()] = true;
        self.cores[role.index()] = core;
    }

    #[inline]
    pub fn is_running(&self, role: TaskRole) -> bool {
        self.running[role.index()]
    }

    /// Core `role` was running on, if it was running and the scheduler said.
    #[inline]
    pub fn core_of(&self, role: TaskRole) -> Option<CoreId> {
        self.cores[role.index()]
    }

    pub fn running_roles(&self) -> impl Iterator<Item = TaskRole> + '_ {
        TaskRole::ALL.into_iter().filter(|&role| self.is_running(role))
    }
}

/// A role sampled running on a core its affinity excludes.
fn affinity_broken(run: &ScenarioRun, sample: &SwitchSample) -> bool {
    sample.running_roles().any(|role| {
        match (role_spec(run.scenario(), role), sample.core_of(role)) {
            (Some(spec), Some(core)) => !spec.spec.may_run_on(core),
            _ => false,
        }
    })
}

/// Observe one switch event.
pub fn on_switch(run: &ScenarioRun, sched: &dyn SchedulerOps) {
    if run.outcome().is_terminal() {
        return;
    }

    let snapshot = TaskSnapshot::capture(sched);
    let sample = SwitchSample::from_snapshot(&snapshot, run);
    for role in sample.running_roles() {
        run.flags.note_ran(role);
    }
    let switches = run.count_switch();

    if run.limits().strict_affinity && affinity_broken(run, &sample) {
        run.conclude(Verdict::Failed(FailureCause::Contradiction));
        return;
    }

    let scenario = run.scenario();
    if let Some(verdict) = scenario.on_switch(&run.flags, &sample) {
        run.conclude(verdict);
        return;
    }

    if switches > run.limits().switch_ceiling && !scenario.progress_made(&run.flags) {
        run.conclude(Verdict::Failed(FailureCause::Livelock));
    }
}
