const DEFAULT_VERBOSITY: Verbosity = Verbosity::Summary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Summary,
    Verbose,
}

impl Verbosity {
    pub fn from_str(value: &str) -> Self {
        if value.eq_ignore_ascii_case("quiet") {
            Verbosity::Quiet
        } else if value.eq_ignore_ascii_case("verbose") {
            Verbosity::Verbose
        } else {
            Verbosity::Summary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Summary => "summary",
            Verbosity::Verbose => "verbose",
        }
    }

    /// Log level that matches this verbosity.
    pub fn log_level(&self) -> crate::klog::KlogLevel {
        match self {
            Verbosity::Quiet => crate::klog::KlogLevel::Warn,
            Verbosity::Summary => crate::klog::KlogLevel::Info,
            Verbosity::Verbose => crate::klog::KlogLevel::Debug,
        }
    }
}

impl core::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Harness tunables. `None` keeps the scenario's own default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestConfig {
    pub verbosity: Verbosity,
    pub attempts: Option<u32>,
    pub attempt_spacing_ms: Option<u32>,
    pub switch_ceiling: Option<u32>,
    pub strict_affinity: Option<bool>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            verbosity: DEFAULT_VERBOSITY,
            attempts: None,
            attempt_spacing_ms: None,
            switch_ceiling: None,
            strict_affinity: None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("enabled")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("disabled")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

/// Parse `smpv.*` tokens out of a whitespace-separated option string.
///
/// Unknown tokens and malformed values are ignored so a bad option never
/// keeps a scenario from running.
pub fn config_from_cmdline(cmdline: Option<&str>) -> TestConfig {
    let mut cfg = TestConfig::default();
    if let Some(cmdline) = cmdline {
        for token in cmdline.split_whitespace() {
            if let Some(value) = token.strip_prefix("smpv.verbosity=") {
                cfg.verbosity = Verbosity::from_str(value);
            } else if let Some(value) = token.strip_prefix("smpv.attempts=") {
                if let Ok(parsed) = value.parse::<u32>() {
                    if parsed != 0 {
                        cfg.attempts = Some(parsed);
                    }
                }
            } else if let Some(value) = token.strip_prefix("smpv.spacing=") {
                if let Ok(parsed) = value.trim_end_matches("ms").parse::<u32>() {
                    cfg.attempt_spacing_ms = Some(parsed);
                }
            } else if let Some(value) = token.strip_prefix("smpv.switch_ceiling=") {
                if let Ok(parsed) = value.parse::<u32>() {
                    cfg.switch_ceiling = Some(parsed);
                }
            } else if let Some(value) = token.strip_prefix("smpv.strict_affinity=") {
                if let Some(strict) = parse_bool(value) {
                    cfg.strict_affinity = Some(strict);
                }
            }
        }
    }
    cfg
}
