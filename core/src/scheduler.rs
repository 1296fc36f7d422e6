//! Interface to the scheduler under test.
//!
//! The harness never schedules anything itself. Everything it needs from the
//! kernel goes through [`SchedulerOps`], implemented once by the port.

use smpv_abi::{TaskHandle, TaskSample, TaskSpec};

use crate::error::SchedError;

/// Task body. The argument is the opaque value passed at creation.
pub type TaskEntry = fn(usize) -> !;

pub trait SchedulerOps: Sync {
    /// Number of cores the scheduler dispatches onto.
    fn core_count(&self) -> usize;

    fn create_task(
        &self,
        spec: &TaskSpec,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, SchedError>;

    /// Hand the cores over to the scheduler. Never returns.
    fn start(&self) -> !;

    /// Fill `out` with one sample per live task and return how many were
    /// written. Must be callable from the switch hook.
    fn system_state(&self, out: &mut [TaskSample]) -> usize;

    fn current_task(&self) -> TaskHandle;

    // --- Task-context primitives ---

    fn preemption_disable(&self, task: TaskHandle);
    fn preemption_enable(&self, task: TaskHandle);
    /// Cross-core critical section. Spins until the section is free.
    fn enter_critical(&self);
    fn exit_critical(&self);
    /// One-shot direct notification.
    fn notify(&self, task: TaskHandle);
    fn delay_ticks(&self, ticks: u32);
    fn ms_to_ticks(&self, ms: u32) -> u32;
}
