//! Platform shim interface.
//!
//! The board implements [`Platform`] once during early bring-up; the harness
//! only ever talks to hardware through it. Initialisation stalls (for example
//! waiting for the report transport to connect) are the board's problem: by
//! the time a `&'static dyn Platform` reaches the harness it is ready.

use core::fmt;

use smpv_abi::CoreId;

/// Output pin identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinId(pub u8);

/// Pin driven high when a scenario passes.
pub const LED_PIN: PinId = PinId(25);

/// Entry point for a secondary core launched outside the scheduler.
pub type CoreEntry = fn();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    /// The core cannot be launched directly (it runs the boot path).
    CoreUnavailable(CoreId),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoreUnavailable(core) => write!(f, "{} cannot be launched", core),
        }
    }
}

pub trait Platform: Sync {
    // -- Pins -------------------------------------------------------------
    fn set_pin(&self, pin: PinId);
    fn clear_pin(&self, pin: PinId);

    // -- Timing -----------------------------------------------------------
    /// Sleep for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
    /// Spin for `us` microseconds without yielding the core.
    fn busy_wait_us(&self, us: u32);
    /// Microseconds since boot.
    fn monotonic_us(&self) -> u64;

    // -- Cores ------------------------------------------------------------
    fn launch_on_core(&self, core: CoreId, entry: CoreEntry) -> Result<(), PlatformError>;

    // -- Report -----------------------------------------------------------
    fn report(&self, bytes: &[u8]);
    /// Block until everything passed to [`Platform::report`] has left the
    /// device.
    fn flush(&self);

    // -- Power ------------------------------------------------------------
    /// Park the board for good. Used when the harness cannot start.
    fn halt(&self) -> ! {
        loop {
            self.delay_ms(1000);
        }
    }
}
