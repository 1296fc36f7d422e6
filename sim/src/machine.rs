//! Deterministic two-core scheduler model.
//!
//! Every tick the machine wakes due tasks, re-dispatches each core, reports
//! the switch events to the observer and then runs each core for one tick of
//! virtual time. Dispatch is fixed-priority with round-robin among equal
//! priorities (least recently dispatched first, creation order on ties).
//! A task that disabled its preemption, holds the critical section or is
//! spinning to enter it keeps its core.

use std::cmp::Reverse;
use std::vec::Vec;

use spin::Mutex;

use smpv_abi::{
    CoreAffinity, CoreId, INVALID_TASK_HANDLE, MAX_CORES, MAX_SAMPLED_TASKS, RunState,
    TASK_PRIORITY_IDLE, TaskHandle, TaskRole, TaskSample, TaskSpec,
};
use smpv_core::observation::Outcome;
use smpv_core::scenario::role_spec;
use smpv_core::validator::{Poll, Validator};
use smpv_core::worker::{self, Action, Step};
use smpv_core::{SchedError, ScenarioRun, SchedulerOps, TaskEntry, observer, reporter};
use smpv_lib::{klog_debug, klog_info, klog_warn};

use crate::config::SimConfig;
use crate::platform::SimPlatform;

/// Length of one scheduler tick in virtual microseconds.
pub const TICK_US: u64 = 1_000;

/// One core switching to a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchRecord {
    pub at_us: u64,
    pub core: CoreId,
    pub task: TaskHandle,
    pub role: Option<TaskRole>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IdleLoop {
    delay_ms: u32,
    busy_us: u32,
}

/// Work a task is in the middle of.
#[derive(Clone, Copy, Debug)]
enum Pending {
    /// Fetch the next step.
    Next,
    Spin {
        remaining_us: u64,
        then_idle: Option<IdleLoop>,
    },
    AwaitPhase,
    /// Spinning on critical section entry.
    Acquire,
    Validate(Validator),
    Idle(IdleLoop),
}

struct SimTask {
    handle: TaskHandle,
    spec: TaskSpec,
    role: Option<TaskRole>,
    script: &'static [Step],
    pc: usize,
    state: RunState,
    core: Option<CoreId>,
    wake_at_us: u64,
    pending: Pending,
    preemption_disabled: bool,
    critical_depth: u32,
    last_dispatch: u64,
    notifications: u32,
}

impl SimTask {
    fn new(handle: TaskHandle, spec: TaskSpec, role: Option<TaskRole>, script: &'static [Step]) -> Self {
        Self {
            handle,
            spec,
            role,
            script,
            pc: 0,
            state: RunState::Ready,
            core: None,
            wake_at_us: 0,
            pending: Pending::Next,
            preemption_disabled: false,
            critical_depth: 0,
            last_dispatch: 0,
            notifications: 0,
        }
    }

    #[inline]
    fn is_idle_task(&self) -> bool {
        self.role.is_none()
    }

    /// Keeps its core across a tick boundary.
    fn holds_core(&self) -> bool {
        self.state == RunState::Running
            && (self.preemption_disabled
                || self.critical_depth > 0
                || matches!(self.pending, Pending::Acquire))
    }
}

struct MachineState {
    now_us: u64,
    tasks: Vec<SimTask>,
    running: [Option<usize>; MAX_CORES],
    critical_owner: Option<usize>,
    executing: Option<usize>,
    dispatch_seq: u64,
    log: Vec<SwitchRecord>,
}

impl MachineState {
    fn new() -> Self {
        let mut state = Self {
            now_us: 0,
            tasks: Vec::with_capacity(MAX_SAMPLED_TASKS),
            running: [None; MAX_CORES],
            critical_owner: None,
            executing: None,
            dispatch_seq: 0,
            log: Vec::new(),
        };
        for core in CoreId::all() {
            let name = if core == CoreId::CORE0 { "IDLE0" } else { "IDLE1" };
            let spec = TaskSpec::new(name, TASK_PRIORITY_IDLE).pinned(CoreAffinity::only(core));
            let handle = TaskHandle(state.tasks.len() as u32 + 1);
            state.tasks.push(SimTask::new(handle, spec, None, &[]));
        }
        state
    }

    fn index_of(&self, handle: TaskHandle) -> Option<usize> {
        self.tasks.iter().position(|task| task.handle == handle)
    }

    fn create(
        &mut self,
        spec: &TaskSpec,
        role: Option<TaskRole>,
        script: &'static [Step],
    ) -> Result<TaskHandle, SchedError> {
        if self.tasks.len() >= MAX_SAMPLED_TASKS {
            return Err(SchedError::TooManyTasks);
        }
        if let Some(mask) = spec.affinity {
            if !CoreId::all().any(|core| mask.allows(core)) {
                return Err(SchedError::InvalidAffinity);
            }
        }
        let handle = TaskHandle(self.tasks.len() as u32 + 1);
        self.tasks.push(SimTask::new(handle, *spec, role, script));
        Ok(handle)
    }

    fn wake_due(&mut self) {
        let now = self.now_us;
        for task in &mut self.tasks {
            if task.state == RunState::Blocked && task.wake_at_us <= now {
                task.state = RunState::Ready;
            }
        }
    }

    fn eligible(&self, idx: usize, core: CoreId, ignore_affinity: bool) -> bool {
        let task = &self.tasks[idx];
        let available = match task.state {
            RunState::Ready => true,
            RunState::Running => task.core == Some(core),
            _ => false,
        };
        let placeable = (ignore_affinity && !task.is_idle_task()) || task.spec.may_run_on(core);
        available && placeable
    }

    /// Re-dispatch every core. Returns the switch-ins, in core order.
    fn reschedule(&mut self, ignore_affinity: bool) -> Vec<SwitchRecord> {
        let mut switches = Vec::new();
        for core in CoreId::all() {
            let slot = core.index();
            let current = self.running[slot];
            if current.is_some_and(|idx| self.tasks[idx].holds_core()) {
                continue;
            }

            let best = (0..self.tasks.len())
                .filter(|&idx| self.eligible(idx, core, ignore_affinity))
                .min_by_key(|&idx| {
                    let task = &self.tasks[idx];
                    (Reverse(task.spec.priority), task.last_dispatch, idx)
                });
            if best == current {
                continue;
            }

            if let Some(prev) = current {
                let task = &mut self.tasks[prev];
                task.state = RunState::Ready;
                task.core = None;
            }
            self.running[slot] = best;
            if let Some(next) = best {
                self.dispatch_seq += 1;
                let task = &mut self.tasks[next];
                task.state = RunState::Running;
                task.core = Some(core);
                task.last_dispatch = self.dispatch_seq;
                let record = SwitchRecord {
                    at_us: self.now_us,
                    core,
                    task: task.handle,
                    role: task.role,
                };
                self.log.push(record);
                switches.push(record);
            }
        }
        switches
    }

    fn block(&mut self, idx: usize, until_us: u64) {
        let task = &mut self.tasks[idx];
        if let Some(core) = task.core.take() {
            self.running[core.index()] = None;
        }
        task.state = RunState::Blocked;
        task.wake_at_us = until_us;
    }

    fn suspend(&mut self, idx: usize) {
        let task = &mut self.tasks[idx];
        if let Some(core) = task.core.take() {
            self.running[core.index()] = None;
        }
        task.state = RunState::Suspended;
    }

    fn try_acquire(&mut self, idx: usize, broken: bool) -> bool {
        if broken {
            self.tasks[idx].critical_depth += 1;
            return true;
        }
        match self.critical_owner {
            Some(owner) if owner != idx => false,
            _ => {
                self.critical_owner = Some(idx);
                self.tasks[idx].critical_depth += 1;
                true
            }
        }
    }

    fn release(&mut self, idx: usize) {
        let task = &mut self.tasks[idx];
        task.critical_depth = task.critical_depth.saturating_sub(1);
        if task.critical_depth == 0 && self.critical_owner == Some(idx) {
            self.critical_owner = None;
        }
    }

    fn notify(&mut self, handle: TaskHandle) {
        match self.index_of(handle) {
            Some(idx) => self.tasks[idx].notifications += 1,
            None => klog_warn!("SIM: notify for unknown task {}", handle.as_u32()),
        }
    }

    fn apply(&mut self, idx: usize, action: Action, at_us: u64, run: &ScenarioRun, broken: bool) {
        match action {
            Action::Continue => {}
            Action::Spin { us } => {
                if us > 0 {
                    self.tasks[idx].pending = Pending::Spin {
                        remaining_us: us as u64,
                        then_idle: None,
                    };
                }
            }
            Action::Sleep { ms } => self.block(idx, at_us + ms as u64 * 1000),
            Action::EnterCritical => {
                if !self.try_acquire(idx, broken) {
                    self.tasks[idx].pending = Pending::Acquire;
                }
            }
            Action::ExitCritical => self.release(idx),
            Action::DisablePreemption => self.tasks[idx].preemption_disabled = true,
            Action::EnablePreemption => self.tasks[idx].preemption_disabled = false,
            Action::Notify(handle) => self.notify(handle),
            Action::AwaitPhase => self.tasks[idx].pending = Pending::AwaitPhase,
            Action::Validate => {
                self.tasks[idx].pending = Pending::Validate(Validator::new(run.limits()));
            }
            Action::Idle { delay_ms, busy_us } => {
                self.tasks[idx].pending = Pending::Idle(IdleLoop { delay_ms, busy_us });
            }
        }
    }

    /// Run whatever occupies `core` for one tick.
    fn execute(&mut self, core: CoreId, run: &ScenarioRun, platform: &SimPlatform, config: &SimConfig) {
        let broken = config.faults.broken_exclusion;
        let mut budget = TICK_US;
        while budget > 0 {
            let Some(idx) = self.running[core.index()] else {
                break;
            };
            let at_us = self.now_us + (TICK_US - budget);
            self.executing = Some(idx);

            match self.tasks[idx].pending {
                Pending::Spin {
                    remaining_us,
                    then_idle,
                } => {
                    let used = remaining_us.min(budget);
                    budget -= used;
                    let left = remaining_us - used;
                    self.tasks[idx].pending = match (left, then_idle) {
                        (0, Some(idle)) => Pending::Idle(idle),
                        (0, None) => Pending::Next,
                        (left, then_idle) => Pending::Spin {
                            remaining_us: left,
                            then_idle,
                        },
                    };
                }
                Pending::AwaitPhase => {
                    if run.flags.phase() > 0 {
                        self.tasks[idx].pending = Pending::Next;
                    } else {
                        budget = 0;
                    }
                }
                Pending::Acquire => {
                    if self.try_acquire(idx, broken) {
                        self.tasks[idx].pending = Pending::Next;
                    } else {
                        budget = 0;
                    }
                }
                Pending::Validate(mut validator) => match validator.poll(run) {
                    Poll::Retry => {
                        self.tasks[idx].pending = Pending::Validate(validator);
                        let spacing_us = validator.spacing_ms() as u64 * 1000;
                        self.block(idx, at_us + spacing_us);
                    }
                    Poll::Done(_) => {
                        reporter::report_checks(run, platform, config.verbosity);
                        self.tasks[idx].pending = Pending::Next;
                    }
                },
                Pending::Idle(idle) => {
                    self.tasks[idx].pending = if idle.busy_us > 0 {
                        Pending::Spin {
                            remaining_us: idle.busy_us as u64,
                            then_idle: Some(idle),
                        }
                    } else {
                        Pending::Idle(idle)
                    };
                    self.block(idx, at_us + idle.delay_ms as u64 * 1000);
                }
                Pending::Next => {
                    if self.tasks[idx].is_idle_task() {
                        budget = 0;
                        continue;
                    }
                    let script = self.tasks[idx].script;
                    let Some(step) = script.get(self.tasks[idx].pc) else {
                        klog_debug!("SIM: task {} finished its script", idx);
                        self.suspend(idx);
                        continue;
                    };
                    self.tasks[idx].pc += 1;
                    let action = worker::prepare_step(run, platform, step);
                    self.apply(idx, action, at_us, run, broken);
                }
            }
        }
        self.executing = None;
    }

    fn sample(&self, out: &mut [TaskSample]) -> usize {
        let mut written = 0;
        for (slot, task) in out.iter_mut().zip(&self.tasks) {
            *slot = TaskSample {
                handle: task.handle,
                state: task.state,
                core: task.core,
            };
            written += 1;
        }
        written
    }
}

/// The simulated board's scheduler.
pub struct Machine<'r> {
    run: &'r ScenarioRun,
    platform: &'r SimPlatform,
    config: SimConfig,
    state: Mutex<MachineState>,
}

impl<'r> Machine<'r> {
    pub fn new(run: &'r ScenarioRun, platform: &'r SimPlatform, config: SimConfig) -> Self {
        Self {
            run,
            platform,
            config,
            state: Mutex::new(MachineState::new()),
        }
    }

    #[inline]
    pub fn run(&self) -> &'r ScenarioRun {
        self.run
    }

    pub fn now_us(&self) -> u64 {
        self.state.lock().now_us
    }

    /// Advance virtual time by one tick.
    pub fn step(&self) {
        let switches = {
            let mut state = self.state.lock();
            self.platform.set_now(state.now_us);
            state.wake_due();
            state.reschedule(self.config.faults.ignore_affinity)
        };
        // The observer samples through `system_state`, so the lock is free.
        for _ in &switches {
            observer::on_switch(self.run, self);
        }

        let mut state = self.state.lock();
        for core in CoreId::all() {
            state.execute(core, self.run, self.platform, &self.config);
        }
        state.now_us += TICK_US;
        self.platform.set_now(state.now_us);
    }

    /// Tick until the verdict is reported or the time budget runs out.
    pub fn run_to_verdict(&self) -> Outcome {
        while !self.run.is_reported() && self.now_us() < self.config.max_us {
            self.step();
        }
        if !self.run.is_reported() {
            klog_warn!("SIM: no verdict reported within {} us", self.config.max_us);
        }
        self.run.outcome()
    }

    /// Tick for `us` more microseconds of virtual time.
    pub fn run_for(&self, us: u64) {
        let end = self.now_us().saturating_add(us);
        while self.now_us() < end {
            self.step();
        }
    }

    pub fn switch_log(&self) -> Vec<SwitchRecord> {
        self.state.lock().log.clone()
    }

    /// Notifications delivered to the task bound to `role`.
    pub fn notifications(&self, role: TaskRole) -> u32 {
        let Some(handle) = self.run.roles.handle_of(role) else {
            return 0;
        };
        let state = self.state.lock();
        state
            .index_of(handle)
            .map_or(0, |idx| state.tasks[idx].notifications)
    }

    fn with_executing(&self, f: impl FnOnce(&mut MachineState, usize)) {
        let mut state = self.state.lock();
        match state.executing {
            Some(idx) => f(&mut *state, idx),
            None => klog_warn!("SIM: task primitive called outside task context"),
        }
    }
}

impl SchedulerOps for Machine<'_> {
    fn core_count(&self) -> usize {
        MAX_CORES
    }

    /// `entry` is not run: the machine interprets the role's script. `arg`
    /// carries the role index.
    fn create_task(
        &self,
        spec: &TaskSpec,
        _entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, SchedError> {
        let role = TaskRole::from_index(arg);
        let script = role
            .and_then(|role| role_spec(self.run.scenario(), role))
            .map(|spec| spec.script)
            .unwrap_or(&[]);
        self.state.lock().create(spec, role, script)
    }

    fn start(&self) -> ! {
        klog_info!("SIM: running {}", self.run.scenario().name());
        let outcome = self.run_to_verdict();
        klog_info!(
            "SIM: {} after {} us, {} switches",
            outcome,
            self.now_us(),
            self.run.switch_count()
        );
        std::process::exit(if outcome.is_passed() { 0 } else { 1 })
    }

    fn system_state(&self, out: &mut [TaskSample]) -> usize {
        self.state.lock().sample(out)
    }

    fn current_task(&self) -> TaskHandle {
        let state = self.state.lock();
        state
            .executing
            .map_or(INVALID_TASK_HANDLE, |idx| state.tasks[idx].handle)
    }

    fn preemption_disable(&self, task: TaskHandle) {
        let mut state = self.state.lock();
        if let Some(idx) = state.index_of(task) {
            state.tasks[idx].preemption_disabled = true;
        }
    }

    fn preemption_enable(&self, task: TaskHandle) {
        let mut state = self.state.lock();
        if let Some(idx) = state.index_of(task) {
            state.tasks[idx].preemption_disabled = false;
        }
    }

    fn enter_critical(&self) {
        let broken = self.config.faults.broken_exclusion;
        self.with_executing(|state, idx| {
            if !state.try_acquire(idx, broken) {
                state.tasks[idx].pending = Pending::Acquire;
            }
        });
    }

    fn exit_critical(&self) {
        self.with_executing(|state, idx| state.release(idx));
    }

    fn notify(&self, task: TaskHandle) {
        self.state.lock().notify(task);
    }

    fn delay_ticks(&self, ticks: u32) {
        self.with_executing(|state, idx| {
            let until = state.now_us + ticks as u64 * TICK_US;
            state.block(idx, until);
        });
    }

    fn ms_to_ticks(&self, ms: u32) -> u32 {
        ms
    }
}
