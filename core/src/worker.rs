//! Scripted workers.
//!
//! A worker is a fixed list of [`Step`]s. Each step is first resolved by
//! [`prepare_step`], which applies the harness-side effects (marks, phase,
//! reports) and hands back the [`Action`] the scheduler or the core still has
//! to carry out. [`perform`] carries actions out on a real port; a model can
//! interpret them against its own clock instead.

use smpv_abi::{TaskHandle, TaskRole};
use smpv_lib::platform::Platform;
use smpv_lib::{klog_debug, klog_warn};

use crate::harness::{self, HarnessContext};
use crate::observation::Mark;
use crate::run::ScenarioRun;
use crate::scenario::role_spec;

pub const IDLE_DELAY_MS: u32 = 10;
pub const IDLE_BUSY_US: u32 = 100_000;
/// Granularity of the phase guard spin.
pub const PHASE_POLL_US: u32 = 1;

/// One scripted instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Hold the core for `us` microseconds without yielding.
    BusyWait { us: u32 },
    /// Block for `ms` milliseconds.
    Delay { ms: u32 },
    EnterCritical,
    ExitCritical,
    /// Disable preemption of the calling task.
    DisablePreemption,
    EnablePreemption,
    Notify(TaskRole),
    AdvancePhase,
    /// Spin until the phase counter leaves zero.
    AwaitPhase,
    Mark(Mark),
    Report(&'static str),
    /// Poll the run until it settles, then report the verdict.
    Validate,
    /// Loop forever: delay, then hold the core.
    Idle { delay_ms: u32, busy_us: u32 },
}

impl Step {
    pub const IDLE: Step = Step::Idle {
        delay_ms: IDLE_DELAY_MS,
        busy_us: IDLE_BUSY_US,
    };
}

/// What remains to be done for a step once the harness side is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Spin { us: u32 },
    Sleep { ms: u32 },
    EnterCritical,
    ExitCritical,
    DisablePreemption,
    EnablePreemption,
    Notify(TaskHandle),
    AwaitPhase,
    Validate,
    Idle { delay_ms: u32, busy_us: u32 },
}

pub fn prepare_step(run: &ScenarioRun, platform: &dyn Platform, step: &Step) -> Action {
    match *step {
        Step::BusyWait { us } => Action::Spin { us },
        Step::Delay { ms } => Action::Sleep { ms },
        Step::EnterCritical => Action::EnterCritical,
        Step::ExitCritical => Action::ExitCritical,
        Step::DisablePreemption => Action::DisablePreemption,
        Step::EnablePreemption => Action::EnablePreemption,
        Step::Notify(role) => match run.roles.handle_of(role) {
            Some(handle) => Action::Notify(handle),
            None => {
                klog_warn!("WORKER: {} unbound, notification dropped", role);
                Action::Continue
            }
        },
        Step::AdvancePhase => {
            let phase = run.flags.advance_phase();
            klog_debug!("WORKER: phase -> {}", phase);
            Action::Continue
        }
        Step::AwaitPhase => Action::AwaitPhase,
        Step::Mark(mark) => {
            run.flags.stamp(mark);
            Action::Continue
        }
        Step::Report(text) => {
            platform.report(text.as_bytes());
            Action::Continue
        }
        Step::Validate => Action::Validate,
        Step::Idle { delay_ms, busy_us } => Action::Idle { delay_ms, busy_us },
    }
}

/// Carry out an action from task context. `Idle` never returns.
pub fn perform(ctx: &HarnessContext, action: Action) {
    let sched = ctx.sched;
    match action {
        Action::Continue => {}
        Action::Spin { us } => ctx.platform.busy_wait_us(us),
        Action::Sleep { ms } => sched.delay_ticks(sched.ms_to_ticks(ms)),
        Action::EnterCritical => sched.enter_critical(),
        Action::ExitCritical => sched.exit_critical(),
        Action::DisablePreemption => sched.preemption_disable(sched.current_task()),
        Action::EnablePreemption => sched.preemption_enable(sched.current_task()),
        Action::Notify(handle) => sched.notify(handle),
        Action::AwaitPhase => {
            while ctx.run.flags.phase() == 0 {
                ctx.platform.busy_wait_us(PHASE_POLL_US);
            }
        }
        Action::Validate => harness::validate_and_report(ctx),
        Action::Idle { delay_ms, busy_us } => idle_forever(ctx, delay_ms, busy_us),
    }
}

fn idle_forever(ctx: &HarnessContext, delay_ms: u32, busy_us: u32) -> ! {
    let ticks = ctx.sched.ms_to_ticks(delay_ms);
    loop {
        ctx.sched.delay_ticks(ticks);
        if busy_us != 0 {
            ctx.platform.busy_wait_us(busy_us);
        }
    }
}

pub fn run_script(ctx: &HarnessContext, script: &[Step]) -> ! {
    for step in script {
        let action = prepare_step(ctx.run, ctx.platform, step);
        perform(ctx, action);
    }
    idle_forever(ctx, IDLE_DELAY_MS, 0)
}

/// Task entry for every role. `arg` is the role index.
pub fn worker_entry(arg: usize) -> ! {
    let Some(ctx) = harness::context() else {
        loop {
            core::hint::spin_loop();
        }
    };
    let script = TaskRole::from_index(arg)
        .and_then(|role| role_spec(ctx.run.scenario(), role))
        .map(|spec| spec.script)
        .unwrap_or(&[]);
    if script.is_empty() {
        klog_warn!("WORKER: no script for role index {}", arg);
    }
    run_script(ctx, script)
}
