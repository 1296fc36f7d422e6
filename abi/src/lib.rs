//! SMP verification harness shared types.
//!
//! Plain data exchanged between the harness core, the platform shim and the
//! scheduler under test. Nothing here touches hardware or global state, so
//! every type can be built and inspected on the host.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod role;
pub mod task;

pub use role::*;
pub use task::*;
