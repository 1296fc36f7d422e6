//! Simulation settings.
//!
//! Builder style: each method consumes and returns the config.
//!
//! ```ignore
//! let config = SimConfig::new().with_broken_exclusion().with_max_us(20_000_000);
//! ```

use smpv_lib::testing::Verbosity;

/// Virtual time budget of a run when nothing else is configured.
pub const DEFAULT_MAX_US: u64 = 60_000_000;

/// Deliberate scheduler defects used to check that the harness catches them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    /// Critical sections never exclude anyone.
    pub broken_exclusion: bool,
    /// Role tasks are dispatched regardless of their affinity mask.
    pub ignore_affinity: bool,
}

impl Faults {
    #[inline]
    pub fn any(&self) -> bool {
        self.broken_exclusion || self.ignore_affinity
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimConfig {
    pub faults: Faults,
    pub verbosity: Verbosity,
    /// Virtual microseconds after which a run gives up waiting for a report.
    pub max_us: u64,
}

impl SimConfig {
    pub fn new() -> Self {
        Self {
            faults: Faults::default(),
            verbosity: Verbosity::Quiet,
            max_us: DEFAULT_MAX_US,
        }
    }

    pub fn with_broken_exclusion(mut self) -> Self {
        self.faults.broken_exclusion = true;
        self
    }

    pub fn with_ignored_affinity(mut self) -> Self {
        self.faults.ignore_affinity = true;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_max_us(mut self, max_us: u64) -> Self {
        self.max_us = max_us;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}
