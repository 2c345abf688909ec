//! Inactivity trigger check

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mindgate_scope::{ScopeId, ScopeResolver};
use mindgate_tabs::{SessionTracker, TabId};

use crate::audio::AudibleTab;
use crate::policy::InactivityPolicy;

/// Host idle signal states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

impl std::str::FromStr for IdleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(IdleState::Active),
            "idle" => Ok(IdleState::Idle),
            "locked" => Ok(IdleState::Locked),
            _ => Err(format!("Unknown idle state: {}", s)),
        }
    }
}

/// Result of a trigger check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Inactivity re-confirmation is off
    Disabled,
    /// The scope was active recently enough, or was never recorded
    NotDue,
    /// Re-confirm
    Due,
    /// Re-confirm unless a tab in the scope is audible and unmuted
    DueUnlessAudible,
}

pub struct InactivityMonitor {
    policy: InactivityPolicy,
}

impl InactivityMonitor {
    pub fn new(policy: InactivityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> InactivityPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: InactivityPolicy) {
        if policy != self.policy {
            tracing::info!(
                mode = %policy.mode,
                timeout_ms = policy.timeout.num_milliseconds(),
                "Inactivity policy changed"
            );
        }
        self.policy = policy;
    }

    /// Whether `scope` has been inactive for at least the timeout.
    ///
    /// A scope with no activity record is not due: it has not been entered
    /// since the process started.
    pub fn check(&self, scope: &ScopeId, tracker: &SessionTracker, now: DateTime<Utc>) -> Verdict {
        if !self.policy.mode.is_enabled() {
            return Verdict::Disabled;
        }

        let Some(last_active) = tracker.scope_activity(scope) else {
            return Verdict::NotDue;
        };

        if now - last_active < self.policy.timeout {
            return Verdict::NotDue;
        }

        tracing::debug!(
            scope = %scope,
            inactive_ms = (now - last_active).num_milliseconds(),
            "Scope inactivity timeout reached"
        );

        if self.policy.mode.exempts_audio() {
            Verdict::DueUnlessAudible
        } else {
            Verdict::Due
        }
    }

    /// Whether a freshly queried list of audible tabs exempts `scope`.
    ///
    /// Never cached: the exemption ends as soon as the last audible tab in
    /// the scope is closed or muted.
    pub fn exempted_by_audio(
        &self,
        scope: &ScopeId,
        audible: &[AudibleTab],
        tracker: &SessionTracker,
        resolver: &ScopeResolver,
    ) -> bool {
        audible.iter().filter(|tab| !tab.muted).any(|tab| {
            let tab_scope = tracker.scope_for_tab(tab.tab_id, resolver).or_else(|| {
                tab.address
                    .as_deref()
                    .and_then(|address| resolver.resolve(address))
            });
            tab_scope.as_ref() == Some(scope)
        })
    }

    /// React to the host idle signal.
    ///
    /// The host reports idle only after a full idle interval without input,
    /// so going idle or locked marks the focused tab's scope as last active
    /// one interval before `now`. A later record is kept. Coming back returns
    /// the focused tab, which the caller checks.
    pub fn on_idle_state(
        &self,
        state: IdleState,
        tracker: &SessionTracker,
        resolver: &ScopeResolver,
        now: DateTime<Utc>,
    ) -> Option<TabId> {
        if !self.policy.mode.is_enabled() {
            return None;
        }

        let focused = tracker.focused_tab()?;
        match state {
            IdleState::Idle | IdleState::Locked => {
                if let Some(scope) = tracker.scope_for_tab(focused, resolver) {
                    tracker.bump_scope_activity(&scope, now - self.idle_lag());
                }
                None
            }
            IdleState::Active => Some(focused),
        }
    }
}

impl InactivityMonitor {
    fn idle_lag(&self) -> Duration {
        Duration::from_std(self.policy.idle_interval()).unwrap_or(self.policy.timeout)
    }
}

impl Default for InactivityMonitor {
    fn default() -> Self {
        Self::new(InactivityPolicy::default())
    }
}
