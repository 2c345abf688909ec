//! Inactivity modes and policy

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Coarsest granularity hosts accept for the idle signal
pub const MIN_IDLE_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InactivityMode {
    /// Never re-confirm on inactivity
    #[default]
    Off,
    /// Any inactive scope re-confirms
    All,
    /// Like `All`, but a scope playing audio is exempt
    AllExceptAudio,
}

impl InactivityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InactivityMode::Off => "off",
            InactivityMode::All => "all",
            InactivityMode::AllExceptAudio => "all-except-audio",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, InactivityMode::Off)
    }

    pub fn exempts_audio(&self) -> bool {
        matches!(self, InactivityMode::AllExceptAudio)
    }
}

impl std::fmt::Display for InactivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InactivityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(InactivityMode::Off),
            "all" => Ok(InactivityMode::All),
            "all-except-audio" => Ok(InactivityMode::AllExceptAudio),
            _ => Err(format!("Unknown inactivity mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    pub mode: InactivityMode,
    pub timeout: Duration,
}

impl InactivityPolicy {
    pub fn new(mode: InactivityMode, timeout: Duration) -> Self {
        Self { mode, timeout }
    }

    /// Interval to request from the host's idle signal: the timeout rounded
    /// up to whole seconds, never below the host minimum.
    pub fn idle_interval(&self) -> std::time::Duration {
        let millis = self.timeout.num_milliseconds().max(0) as u64;
        let secs = millis.div_ceil(1000).max(MIN_IDLE_INTERVAL_SECS);
        std::time::Duration::from_secs(secs)
    }
}

impl Default for InactivityPolicy {
    fn default() -> Self {
        Self::new(InactivityMode::Off, Duration::minutes(15))
    }
}
