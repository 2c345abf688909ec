//! Decision results

use serde::{Deserialize, Serialize};

use mindgate_scope::ScopeId;
use mindgate_tabs::TabId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow(AllowReason),
    Redirect(Redirect),
    Ignored(IgnoreReason),
}

impl Decision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Decision::Redirect(_))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Decision::Redirect(redirect) => Some(redirect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// Target matches no rule
    Unscoped,
    /// Target shares the scope of the address being left
    SameScope,
    /// Target is the address being left; nothing changed
    Churn,
    /// Leaving the confirmation step with the completion marker
    Confirmed,
    /// Navigation inside the confirmation step itself
    ConfirmationPage,
    /// Leaving the confirmation step for an unscoped address
    LeftConfirmation,
    /// Opened from the window's active tab, which is already in the scope
    CarriedOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Sub-frame navigation
    SubFrame,
    /// Duplicate of an intent decided moments ago
    Debounced,
    /// Redirect-worthy, but the tab was redirected moments ago
    CoolingDown,
}

/// Detour a tab to the confirmation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub tab_id: TabId,
    pub scope: ScopeId,
    /// Address the user was heading to
    pub target: String,
    /// Confirmation step address carrying `target` and `scope`
    pub address: String,
}
