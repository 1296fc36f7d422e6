//! Host simulation board for the SMP verification harness.
//!
//! [`machine::Machine`] is a deterministic two-core model driven by a virtual
//! 1 kHz tick. It implements [`smpv_core::SchedulerOps`] and interprets the
//! worker scripts itself instead of running task entry points on host
//! threads. [`platform::SimPlatform`] records pins and report output against
//! the machine's virtual clock.

pub mod config;
pub mod machine;
pub mod platform;

pub use config::{Faults, SimConfig};
pub use machine::{Machine, SwitchRecord, TICK_US};
pub use platform::{HALT_EXIT_STATUS, SimPlatform};
