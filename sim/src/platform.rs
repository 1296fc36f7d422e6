//! Recording platform shim on the machine's virtual clock.

use std::io::Write;
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::vec::Vec;

use spin::Mutex;

use smpv_abi::CoreId;
use smpv_lib::klog_warn;
use smpv_lib::platform::{CoreEntry, PinId, Platform, PlatformError};

/// Process exit status of a board that halted before its scenario ran.
pub const HALT_EXIT_STATUS: i32 = 2;

pub struct SimPlatform {
    clock_us: AtomicU64,
    pins: AtomicU32,
    reports: Mutex<Vec<u8>>,
    flushes: AtomicU32,
    launched: Mutex<Vec<(CoreId, JoinHandle<()>)>>,
    echo: AtomicBool,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            clock_us: AtomicU64::new(0),
            pins: AtomicU32::new(0),
            reports: Mutex::new(Vec::new()),
            flushes: AtomicU32::new(0),
            launched: Mutex::new(Vec::new()),
            echo: AtomicBool::new(false),
        }
    }

    /// Also copy report bytes to stdout, as a serial console would.
    pub fn echoing() -> Self {
        let platform = Self::new();
        platform.echo.store(true, Ordering::Relaxed);
        platform
    }

    pub(crate) fn set_now(&self, now_us: u64) {
        self.clock_us.store(now_us, Ordering::Release);
    }

    pub fn report_text(&self) -> String {
        String::from_utf8_lossy(&self.reports.lock()).into_owned()
    }

    pub fn pin_is_set(&self, pin: PinId) -> bool {
        self.pins.load(Ordering::Acquire) & (1 << pin.0) != 0
    }

    pub fn flushes(&self) -> u32 {
        self.flushes.load(Ordering::Acquire)
    }

    /// Wait for every entry started through `launch_on_core` and return the
    /// cores they ran on.
    pub fn join_launched(&self) -> Vec<CoreId> {
        let launched: Vec<_> = self.launched.lock().drain(..).collect();
        launched
            .into_iter()
            .map(|(core, handle)| {
                let _ = handle.join();
                core
            })
            .collect()
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimPlatform {
    fn set_pin(&self, pin: PinId) {
        self.pins.fetch_or(1 << pin.0, Ordering::AcqRel);
    }

    fn clear_pin(&self, pin: PinId) {
        self.pins.fetch_and(!(1 << pin.0), Ordering::AcqRel);
    }

    fn delay_ms(&self, ms: u32) {
        self.clock_us.fetch_add(ms as u64 * 1000, Ordering::AcqRel);
    }

    fn busy_wait_us(&self, us: u32) {
        self.clock_us.fetch_add(us as u64, Ordering::AcqRel);
    }

    fn monotonic_us(&self) -> u64 {
        self.clock_us.load(Ordering::Acquire)
    }

    /// Core 0 runs the scheduler; only core 1 can be handed an entry.
    fn launch_on_core(&self, core: CoreId, entry: CoreEntry) -> Result<(), PlatformError> {
        if core != CoreId::CORE1 {
            return Err(PlatformError::CoreUnavailable(core));
        }
        let handle = std::thread::spawn(entry);
        self.launched.lock().push((core, handle));
        Ok(())
    }

    fn report(&self, bytes: &[u8]) {
        self.reports.lock().extend_from_slice(bytes);
        if self.echo.load(Ordering::Relaxed) {
            let _ = std::io::stdout().lock().write_all(bytes);
        }
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        if self.echo.load(Ordering::Relaxed) {
            let _ = std::io::stdout().lock().flush();
        }
    }

    /// The virtual clock never blocks, so a parked board would spin the host.
    fn halt(&self) -> ! {
        self.flush();
        klog_warn!("SIM: board halted");
        std::process::exit(HALT_EXIT_STATUS)
    }
}
