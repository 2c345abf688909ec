//! Focus change description and outcome

use mindgate_scope::ScopeId;

use crate::ids::{TabId, WindowId};

/// One focus transition, as seen by the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    /// Tab that had focus before, if known
    pub from_tab: Option<TabId>,
    /// Tab that has focus now
    pub to_tab: TabId,
    /// Address the host reports for `to_tab`, used when the tracker has none
    pub to_address: Option<String>,
    pub window: WindowId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Both tabs share a scope; activity was bumped and nothing else is needed
    SameScope(ScopeId),
    /// Focus crossed a scope boundary; the new scope (if any) needs an
    /// inactivity check
    Switched {
        from_scope: Option<ScopeId>,
        to_scope: Option<ScopeId>,
    },
}

impl FocusOutcome {
    /// Scope the inactivity monitor should check, if any
    pub fn scope_to_check(&self) -> Option<&ScopeId> {
        match self {
            FocusOutcome::SameScope(_) => None,
            FocusOutcome::Switched { to_scope, .. } => to_scope.as_ref(),
        }
    }
}
