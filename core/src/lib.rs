//! Scheduling-invariant observer, scenario state machine and verdict path.
//!
//! The harness runs next to the scheduler it checks. A switch hook feeds
//! [`observer::on_switch`], scripted workers race each other across the two
//! cores, and a low-priority validator polls the shared [`run::ScenarioRun`]
//! until it settles or a fail-safe ceiling trips.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod error;
pub mod harness;
pub mod observation;
pub mod observer;
pub mod reporter;
pub mod run;
pub mod scenario;
pub mod scheduler;
pub mod validator;
pub mod worker;

#[cfg(test)]
mod test_fixtures;

pub use error::{FailureCause, HarnessError, HarnessResult, SchedError};
pub use observation::{Mark, ObservationFlags, Outcome, RoleTable, Verdict};
pub use run::ScenarioRun;
pub use scenario::{Limits, RoleSpec, Scenario};
pub use scheduler::{SchedulerOps, TaskEntry};
pub use worker::{Action, Step};
