//! Harness entry: context installation, role spawning and the switch hook.

use spin::Once;

use smpv_abi::{MAX_CORES, TaskRole};
use smpv_lib::platform::Platform;
use smpv_lib::testing::Verbosity;
use smpv_lib::{klog_debug, klog_error, klog_info};

use crate::error::{HarnessError, HarnessResult};
use crate::observer;
use crate::reporter;
use crate::run::ScenarioRun;
use crate::scheduler::SchedulerOps;
use crate::validator;
use crate::worker;

/// Everything a worker or the switch hook needs, installed once per boot.
pub struct HarnessContext {
    pub run: &'static ScenarioRun,
    pub sched: &'static dyn SchedulerOps,
    pub platform: &'static dyn Platform,
    pub verbosity: Verbosity,
}

static CONTEXT: Once<HarnessContext> = Once::new();

pub fn install(ctx: HarnessContext) -> HarnessResult<&'static HarnessContext> {
    let mut fresh = false;
    let installed = CONTEXT.call_once(|| {
        fresh = true;
        ctx
    });
    if fresh {
        Ok(installed)
    } else {
        Err(HarnessError::AlreadyInstalled)
    }
}

#[inline]
pub fn context() -> Option<&'static HarnessContext> {
    CONTEXT.get()
}

/// Switch hook for the port's "task switched in" trace point.
pub fn task_switched_in() {
    if let Some(ctx) = CONTEXT.get() {
        observer::on_switch(ctx.run, ctx.sched);
    }
}

/// Create one task per role and bind the handles.
pub fn spawn_roles(run: &ScenarioRun, sched: &dyn SchedulerOps) -> HarnessResult<()> {
    let found = sched.core_count();
    if found != MAX_CORES {
        return Err(HarnessError::UnsupportedCoreCount {
            found,
            required: MAX_CORES,
        });
    }

    for role_spec in run.scenario().roles() {
        let handle = sched.create_task(&role_spec.spec, worker::worker_entry, role_spec.role.index())?;
        run.roles.bind(role_spec.role, handle)?;
        klog_debug!(
            "HARNESS: {} -> task {} prio {} affinity {:?}",
            role_spec.role,
            handle.as_u32(),
            role_spec.spec.priority,
            role_spec.spec.affinity
        );
    }

    match TaskRole::ALL.into_iter().find(|&role| run.roles.handle_of(role).is_none()) {
        Some(role) => Err(HarnessError::RoleUnbound(role)),
        None => Ok(()),
    }
}

/// Spawn the roles and install the context. A failure is logged and
/// reported as a failed run before it is returned.
///
/// Roles are spawned first: their tasks only run once the scheduler starts,
/// and a failed spawn leaves no context behind.
pub fn prepare(ctx: HarnessContext) -> HarnessResult<&'static HarnessContext> {
    let platform = ctx.platform;
    let name = ctx.run.scenario().name();
    let result = spawn_roles(ctx.run, ctx.sched).and_then(|()| install(ctx));
    if let Err(err) = &result {
        klog_error!("HARNESS: setup of {} failed: {}", name, err);
        reporter::report_setup_failure(platform);
    }
    result
}

/// Prepare the harness and hand over to the scheduler. On a setup failure
/// the board halts.
pub fn launch(ctx: HarnessContext) -> ! {
    let platform = ctx.platform;
    match prepare(ctx) {
        Ok(ctx) => {
            klog_info!("HARNESS: starting scheduler for {}", ctx.run.scenario().name());
            ctx.sched.start()
        }
        Err(_) => platform.halt(),
    }
}

/// Body of the validating role: poll until settled, then report.
pub fn validate_and_report(ctx: &HarnessContext) {
    validator::validate_blocking(ctx.run, ctx.sched);
    reporter::report_checks(ctx.run, ctx.platform, ctx.verbosity);
}
