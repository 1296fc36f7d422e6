//! Simulated board: runs one built-in scenario on the two-core model and
//! exits with status 0 on a passed run.
//!
//! The scenario is chosen at build time (`scenario-affinity` by default,
//! `scenario-exclusion` otherwise). Harness options are read from the
//! `SMPV_CMDLINE` environment variable when the binary is built.

use std::boxed::Box;
use std::fmt;
use std::io::Write;

use smpv_core::harness::{self, HarnessContext};
use smpv_core::scenario::{AFFINITY, EXCLUSION, Scenario};
use smpv_core::ScenarioRun;
use smpv_lib::klog::{klog_init, klog_register_backend, klog_set_level};
use smpv_lib::testing::config_from_cmdline;
use smpv_sim::{Machine, SimConfig, SimPlatform};

fn stderr_backend(args: fmt::Arguments<'_>) {
    let mut err = std::io::stderr().lock();
    let _ = err.write_fmt(args);
    let _ = err.write_all(b"\n");
}

fn selected_scenario() -> &'static dyn Scenario {
    if cfg!(feature = "scenario-exclusion") {
        &EXCLUSION
    } else {
        &AFFINITY
    }
}

fn main() {
    let cfg = config_from_cmdline(option_env!("SMPV_CMDLINE"));
    klog_init();
    klog_register_backend(stderr_backend);
    klog_set_level(cfg.verbosity.log_level());

    let scenario = selected_scenario();
    let run: &'static ScenarioRun =
        Box::leak(Box::new(ScenarioRun::new(scenario, scenario.limits().with_config(&cfg))));
    let platform: &'static SimPlatform = Box::leak(Box::new(SimPlatform::echoing()));
    let machine: &'static Machine<'static> = Box::leak(Box::new(Machine::new(
        run,
        platform,
        SimConfig::new().with_verbosity(cfg.verbosity),
    )));

    harness::launch(HarnessContext {
        run,
        sched: machine,
        platform,
        verbosity: cfg.verbosity,
    })
}
