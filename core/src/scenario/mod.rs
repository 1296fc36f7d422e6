//! Scenario definitions: roles, scripts, predicates and limits.

mod affinity;
mod exclusion;

pub use affinity::AffinityScenario;
pub use exclusion::ExclusionScenario;

use smpv_abi::{TaskRole, TaskSpec};
use smpv_lib::testing::TestConfig;

use crate::observation::{Mark, ObservationFlags, Verdict};
use crate::observer::SwitchSample;
use crate::worker::Step;

pub const DEFAULT_ATTEMPTS: u32 = 25;
pub const DEFAULT_ATTEMPT_SPACING_MS: u32 = 10;

pub static AFFINITY: AffinityScenario = AffinityScenario;
pub static EXCLUSION: ExclusionScenario = ExclusionScenario;

/// Fail-safe ceilings and checking knobs of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Switch events allowed before the scenario has made progress.
    pub switch_ceiling: u32,
    /// Validator polls before a pending run fails.
    pub attempts: u32,
    pub attempt_spacing_ms: u32,
    /// Treat a role sampled running outside its affinity as a contradiction.
    pub strict_affinity: bool,
}

impl Limits {
    pub const fn new(switch_ceiling: u32) -> Self {
        Self {
            switch_ceiling,
            attempts: DEFAULT_ATTEMPTS,
            attempt_spacing_ms: DEFAULT_ATTEMPT_SPACING_MS,
            strict_affinity: true,
        }
    }

    pub const fn with_attempts(mut self, attempts: u32, spacing_ms: u32) -> Self {
        self.attempts = attempts;
        self.attempt_spacing_ms = spacing_ms;
        self
    }

    /// Overlay the overrides present in `cfg`.
    pub fn with_config(mut self, cfg: &TestConfig) -> Self {
        if let Some(attempts) = cfg.attempts {
            self.attempts = attempts;
        }
        if let Some(spacing) = cfg.attempt_spacing_ms {
            self.attempt_spacing_ms = spacing;
        }
        if let Some(ceiling) = cfg.switch_ceiling {
            self.switch_ceiling = ceiling;
        }
        if let Some(strict) = cfg.strict_affinity {
            self.strict_affinity = strict;
        }
        self
    }
}

/// One worker of a scenario.
#[derive(Clone, Copy, Debug)]
pub struct RoleSpec {
    pub role: TaskRole,
    pub spec: TaskSpec,
    pub script: &'static [Step],
}

pub trait Scenario: Sync {
    fn name(&self) -> &'static str;

    /// Name of the registered check that asserts the outcome.
    fn check_name(&self) -> &'static str;

    fn roles(&self) -> &'static [RoleSpec];

    fn limits(&self) -> Limits;

    /// Evaluated by the observer on every switch event while pending.
    /// Runs in the scheduler's switch context: no blocking, no logging.
    fn on_switch(&self, flags: &ObservationFlags, sample: &SwitchSample) -> Option<Verdict>;

    /// Evaluated by the validator on each poll.
    fn judge(&self, _flags: &ObservationFlags) -> Option<Verdict> {
        None
    }

    /// Once true, the switch ceiling no longer applies.
    fn progress_made(&self, _flags: &ObservationFlags) -> bool {
        false
    }

    /// Marks printed in the trace line, in column order.
    fn traced_marks(&self) -> &'static [Mark] {
        &[]
    }
}

pub fn role_spec(scenario: &dyn Scenario, role: TaskRole) -> Option<&'static RoleSpec> {
    scenario.roles().iter().find(|spec| spec.role == role)
}

#[cfg(test)]
mod tests {
    use smpv_abi::{MAX_SAMPLED_TASKS, ROLE_COUNT};
    use smpv_lib::testing::config_from_cmdline;

    use super::*;

    #[test]
    fn config_overrides_only_what_it_names() {
        let base = Limits::new(1500);
        assert_eq!(base.with_config(&TestConfig::default()), base);

        let cfg = config_from_cmdline(Some("smpv.attempts=3 smpv.strict_affinity=off"));
        let limits = base.with_config(&cfg);
        assert_eq!(limits.attempts, 3);
        assert!(!limits.strict_affinity);
        assert_eq!(limits.switch_ceiling, 1500);
        assert_eq!(limits.attempt_spacing_ms, DEFAULT_ATTEMPT_SPACING_MS);
    }

    #[test]
    fn built_in_scenarios_bind_every_role_once() {
        for scenario in [&AFFINITY as &dyn Scenario, &EXCLUSION] {
            assert_eq!(scenario.roles().len(), ROLE_COUNT);
            assert!(scenario.roles().len() <= MAX_SAMPLED_TASKS);
            for role in TaskRole::ALL {
                let spec = role_spec(scenario, role).unwrap();
                assert_eq!(spec.spec.name, role.label());
                assert!(!spec.script.is_empty());
            }
        }
    }

    #[test]
    fn exactly_one_role_validates() {
        for scenario in [&AFFINITY as &dyn Scenario, &EXCLUSION] {
            let validators = scenario
                .roles()
                .iter()
                .filter(|spec| spec.script.iter().any(|step| matches!(step, Step::Validate)))
                .count();
            assert_eq!(validators, 1, "{}", scenario.name());
        }
    }
}
