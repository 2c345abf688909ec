//! Tracked entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mindgate_scope::ScopeId;

use crate::ids::{TabId, WindowId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTab {
    pub id: TabId,
    /// Window the tab was last seen in
    pub window_id: Option<WindowId>,
    /// Last address the main frame committed
    pub last_committed_address: Option<String>,
    /// Scope the tab was explicitly bound to
    pub bound_scope: Option<ScopeId>,
    /// Last redirect to the confirmation step
    pub last_redirect_at: Option<DateTime<Utc>>,
    /// Last navigation decision and the normalized target it was for
    pub last_decision_at: Option<DateTime<Utc>>,
    pub last_decision_key: Option<String>,
}

impl TrackedTab {
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            window_id: None,
            last_committed_address: None,
            bound_scope: None,
            last_redirect_at: None,
            last_decision_at: None,
            last_decision_key: None,
        }
    }

    /// Whether a redirect at `now` would fall inside the cooldown window
    pub fn redirect_cooling_down(&self, now: DateTime<Utc>, cooldown: chrono::Duration) -> bool {
        self.last_redirect_at
            .is_some_and(|at| now - at < cooldown)
    }

    /// Whether a decision for `key` at `now` duplicates the previous one
    pub fn decision_debounced(
        &self,
        key: &str,
        now: DateTime<Utc>,
        debounce: chrono::Duration,
    ) -> bool {
        match (self.last_decision_at, self.last_decision_key.as_deref()) {
            (Some(at), Some(last_key)) => last_key == key && now - at < debounce,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWindow {
    pub id: WindowId,
    pub last_active_tab: Option<TabId>,
}

impl TrackedWindow {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            last_active_tab: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeActivity {
    pub scope: ScopeId,
    pub last_active_at: DateTime<Utc>,
}

impl ScopeActivity {
    /// Move the activity mark forward; an older timestamp never rewinds it
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }
}
