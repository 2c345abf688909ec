//! Gate configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use mindgate_inactivity::{InactivityMode, InactivityPolicy};
use mindgate_navigation::{ConfirmationPage, DecisionTiming};
use mindgate_phrase::{MatchMode, PhraseMatcher, DEFAULT_MAX_DISTANCE};

use crate::Result;

/// Where the configuration store lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("mindgate.db"),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Mindgate"))
            .unwrap_or_else(|| PathBuf::from(".mindgate"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

/// User-facing policy, persisted by the configuration store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub phrase_mode: MatchMode,
    pub max_distance: usize,
    pub inactivity_mode: InactivityMode,
    pub inactivity_timeout_ms: u64,
    pub decision_debounce_ms: u64,
    pub redirect_cooldown_ms: u64,
    /// Address of the confirmation step page
    pub confirmation_page: String,
}

impl GateSettings {
    pub fn phrase_matcher(&self) -> PhraseMatcher {
        PhraseMatcher::new(self.phrase_mode, self.max_distance)
    }

    pub fn inactivity_policy(&self) -> InactivityPolicy {
        InactivityPolicy::new(self.inactivity_mode, millis(self.inactivity_timeout_ms))
    }

    pub fn decision_timing(&self) -> DecisionTiming {
        DecisionTiming {
            debounce: millis(self.decision_debounce_ms),
            cooldown: millis(self.redirect_cooldown_ms),
        }
    }

    pub fn confirmation(&self) -> Result<ConfirmationPage> {
        Ok(ConfirmationPage::new(&self.confirmation_page)?)
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            phrase_mode: MatchMode::Fuzzy,
            max_distance: DEFAULT_MAX_DISTANCE,
            inactivity_mode: InactivityMode::Off,
            inactivity_timeout_ms: 15 * 60 * 1000,
            decision_debounce_ms: 300,
            redirect_cooldown_ms: 500,
            confirmation_page: "chrome-extension://mindgate/confirm.html".to_string(),
        }
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

// Platform data directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
