//! Fakes for host unit tests: a scripted scheduler and a recording platform.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use std::boxed::Box;
use std::string::String;
use std::vec::Vec;

use spin::Mutex;

use smpv_abi::{
    CoreId, INVALID_TASK_HANDLE, MAX_CORES, RunState, TaskHandle, TaskRole, TaskSample, TaskSpec,
};
use smpv_lib::platform::{CoreEntry, PinId, Platform, PlatformError};
use smpv_lib::testing::Verbosity;

use crate::error::SchedError;
use crate::harness::HarnessContext;
use crate::run::ScenarioRun;
use crate::scenario::Scenario;
use crate::scheduler::{SchedulerOps, TaskEntry};

pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Bind A, B and C to fixed fake handles.
pub fn bind_roles(run: &ScenarioRun) {
    for role in TaskRole::ALL {
        run.roles
            .bind(role, TaskHandle(10 + role.index() as u32))
            .unwrap();
    }
}

// =============================================================================
// FakeScheduler
// =============================================================================

struct FakeState {
    samples: Vec<TaskSample>,
    created: Vec<(TaskSpec, usize)>,
    fail_create: Option<SchedError>,
    current: TaskHandle,
    critical_depth: u32,
    preemption_disabled: Vec<TaskHandle>,
    notified: Vec<TaskHandle>,
    delayed_ticks: u32,
}

pub struct FakeScheduler {
    cores: usize,
    state: Mutex<FakeState>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::with_cores(MAX_CORES)
    }

    pub fn with_cores(cores: usize) -> Self {
        Self {
            cores,
            state: Mutex::new(FakeState {
                samples: Vec::new(),
                created: Vec::new(),
                fail_create: None,
                current: INVALID_TASK_HANDLE,
                critical_depth: 0,
                preemption_disabled: Vec::new(),
                notified: Vec::new(),
                delayed_ticks: 0,
            }),
        }
    }

    pub fn set_samples(&self, samples: &[TaskSample]) {
        self.state.lock().samples = samples.to_vec();
    }

    /// Report every bound role, running where listed and ready otherwise.
    pub fn set_running(&self, run: &ScenarioRun, running: &[(TaskRole, CoreId)]) {
        let samples: Vec<TaskSample> = TaskRole::ALL
            .into_iter()
            .filter_map(|role| {
                let handle = run.roles.handle_of(role)?;
                Some(match running.iter().find(|(r, _)| *r == role) {
                    Some(&(_, core)) => TaskSample::running(handle, core),
                    None => TaskSample::with_state(handle, RunState::Ready),
                })
            })
            .collect();
        self.set_samples(&samples);
    }

    pub fn fail_create_with(&self, err: SchedError) {
        self.state.lock().fail_create = Some(err);
    }

    pub fn set_current(&self, task: TaskHandle) {
        self.state.lock().current = task;
    }

    pub fn created(&self) -> Vec<(TaskSpec, usize)> {
        self.state.lock().created.clone()
    }

    pub fn critical_depth(&self) -> u32 {
        self.state.lock().critical_depth
    }

    pub fn preemption_disabled(&self) -> Vec<TaskHandle> {
        self.state.lock().preemption_disabled.clone()
    }

    pub fn notified(&self) -> Vec<TaskHandle> {
        self.state.lock().notified.clone()
    }

    pub fn delayed_ticks(&self) -> u32 {
        self.state.lock().delayed_ticks
    }
}

impl SchedulerOps for FakeScheduler {
    fn core_count(&self) -> usize {
        self.cores
    }

    fn create_task(
        &self,
        spec: &TaskSpec,
        _entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, SchedError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_create {
            return Err(err);
        }
        state.created.push((*spec, arg));
        Ok(TaskHandle(100 + state.created.len() as u32))
    }

    fn start(&self) -> ! {
        panic!("fake scheduler cannot start");
    }

    fn system_state(&self, out: &mut [TaskSample]) -> usize {
        let state = self.state.lock();
        let n = state.samples.len().min(out.len());
        out[..n].copy_from_slice(&state.samples[..n]);
        n
    }

    fn current_task(&self) -> TaskHandle {
        self.state.lock().current
    }

    fn preemption_disable(&self, task: TaskHandle) {
        self.state.lock().preemption_disabled.push(task);
    }

    fn preemption_enable(&self, task: TaskHandle) {
        self.state.lock().preemption_disabled.retain(|&t| t != task);
    }

    fn enter_critical(&self) {
        self.state.lock().critical_depth += 1;
    }

    fn exit_critical(&self) {
        let mut state = self.state.lock();
        state.critical_depth = state.critical_depth.saturating_sub(1);
    }

    fn notify(&self, task: TaskHandle) {
        self.state.lock().notified.push(task);
    }

    fn delay_ticks(&self, ticks: u32) {
        self.state.lock().delayed_ticks += ticks;
    }

    fn ms_to_ticks(&self, ms: u32) -> u32 {
        ms
    }
}

// =============================================================================
// FakePlatform
// =============================================================================

pub struct FakePlatform {
    pins: AtomicU32,
    reports: Mutex<Vec<u8>>,
    flushes: AtomicU32,
    busy_us: AtomicU64,
    clock_us: AtomicU64,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            pins: AtomicU32::new(0),
            reports: Mutex::new(Vec::new()),
            flushes: AtomicU32::new(0),
            busy_us: AtomicU64::new(0),
            clock_us: AtomicU64::new(0),
        }
    }

    pub fn report_text(&self) -> String {
        String::from_utf8_lossy(&self.reports.lock()).into_owned()
    }

    pub fn pin_is_set(&self, pin: PinId) -> bool {
        self.pins.load(Ordering::Relaxed) & (1 << pin.0) != 0
    }

    pub fn flushes(&self) -> u32 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn busy_us(&self) -> u64 {
        self.busy_us.load(Ordering::Relaxed)
    }
}

impl Platform for FakePlatform {
    fn set_pin(&self, pin: PinId) {
        self.pins.fetch_or(1 << pin.0, Ordering::Relaxed);
    }

    fn clear_pin(&self, pin: PinId) {
        self.pins.fetch_and(!(1 << pin.0), Ordering::Relaxed);
    }

    fn delay_ms(&self, ms: u32) {
        self.clock_us.fetch_add(ms as u64 * 1000, Ordering::Relaxed);
    }

    fn busy_wait_us(&self, us: u32) {
        self.busy_us.fetch_add(us as u64, Ordering::Relaxed);
        self.clock_us.fetch_add(us as u64, Ordering::Relaxed);
    }

    fn monotonic_us(&self) -> u64 {
        self.clock_us.load(Ordering::Relaxed)
    }

    fn launch_on_core(&self, core: CoreId, _entry: CoreEntry) -> Result<(), PlatformError> {
        Err(PlatformError::CoreUnavailable(core))
    }

    fn report(&self, bytes: &[u8]) {
        self.reports.lock().extend_from_slice(bytes);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Rig
// =============================================================================

/// Leaked context over fresh fakes, roles already bound.
pub struct Rig {
    pub ctx: &'static HarnessContext,
    pub sched: &'static FakeScheduler,
    pub platform: &'static FakePlatform,
}

impl Rig {
    pub fn new(scenario: &'static dyn Scenario) -> Self {
        let sched = leak(FakeScheduler::new());
        let platform = leak(FakePlatform::new());
        let run = leak(ScenarioRun::with_defaults(scenario));
        bind_roles(run);
        let ctx = leak(HarnessContext {
            run,
            sched,
            platform,
            verbosity: Verbosity::Quiet,
        });
        Self {
            ctx,
            sched,
            platform,
        }
    }
}
