//! Support library for the SMP verification harness: logging, the platform
//! shim interface and the minimal check runner.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod klog;
pub mod platform;
pub mod string;
pub mod testing;

pub use klog::{
    KlogLevel, klog_get_level, klog_init, klog_is_enabled, klog_register_backend, klog_set_level,
};
pub use platform::{CoreEntry, LED_PIN, PinId, Platform, PlatformError};
pub use string::LineBuf;
pub use testing::TestResult;
