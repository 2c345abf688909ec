//! Session-state tracker
//!
//! The single owner of tab, window and scope-activity state. Engines read and
//! mutate it only through these methods. Every method takes the lock for a
//! short synchronous section, so callers must never hold a guard across an
//! `.await` (none is ever handed out).

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use mindgate_scope::{ScopeId, ScopeResolver};

use crate::focus::{FocusChange, FocusOutcome};
use crate::ids::{TabId, WindowId};
use crate::tab::{ScopeActivity, TrackedTab, TrackedWindow};

#[derive(Debug, Default)]
struct TrackerState {
    tabs: HashMap<TabId, TrackedTab>,
    windows: HashMap<WindowId, TrackedWindow>,
    activity: HashMap<ScopeId, ScopeActivity>,
    focused_window: Option<WindowId>,
}

impl TrackerState {
    fn tab_mut(&mut self, tab_id: TabId) -> &mut TrackedTab {
        self.tabs
            .entry(tab_id)
            .or_insert_with(|| TrackedTab::new(tab_id))
    }

    fn window_mut(&mut self, window_id: WindowId) -> &mut TrackedWindow {
        self.windows
            .entry(window_id)
            .or_insert_with(|| TrackedWindow::new(window_id))
    }

    /// Binding first, then the committed address, then nothing
    fn scope_for(&self, tab_id: TabId, resolver: &ScopeResolver) -> Option<ScopeId> {
        let tab = self.tabs.get(&tab_id)?;

        if let Some(scope) = tab.bound_scope.as_ref().filter(|s| resolver.contains(s)) {
            return Some(scope.clone());
        }

        tab.last_committed_address
            .as_deref()
            .and_then(|address| resolver.resolve(address))
    }

    fn bump(&mut self, scope: &ScopeId, at: DateTime<Utc>) {
        self.activity
            .entry(scope.clone())
            .and_modify(|a| a.touch(at))
            .or_insert_with(|| ScopeActivity {
                scope: scope.clone(),
                last_active_at: at,
            });
    }
}

pub struct SessionTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
        }
    }

    // === Tabs ===

    /// Note that a tab exists, optionally in a known window
    pub fn observe_tab(&self, tab_id: TabId, window_id: Option<WindowId>) {
        let mut state = self.state.write();
        let tab = state.tab_mut(tab_id);
        if window_id.is_some() {
            tab.window_id = window_id;
        }
    }

    pub fn tab(&self, tab_id: TabId) -> Option<TrackedTab> {
        self.state.read().tabs.get(&tab_id).cloned()
    }

    pub fn last_committed_address(&self, tab_id: TabId) -> Option<String> {
        self.state
            .read()
            .tabs
            .get(&tab_id)
            .and_then(|t| t.last_committed_address.clone())
    }

    /// Bind a tab to a scope. Rebinding to the same scope is a no-op.
    pub fn bind_tab_scope(&self, tab_id: TabId, scope: &ScopeId) {
        let mut state = self.state.write();
        let tab = state.tab_mut(tab_id);
        if tab.bound_scope.as_ref() != Some(scope) {
            tracing::debug!(tab_id = %tab_id, scope = %scope, "Bound tab to scope");
            tab.bound_scope = Some(scope.clone());
        }
    }

    /// Scope governing a tab: its binding (while the rule still exists),
    /// else the scope of its committed address, else none.
    pub fn scope_for_tab(&self, tab_id: TabId, resolver: &ScopeResolver) -> Option<ScopeId> {
        self.state.read().scope_for(tab_id, resolver)
    }

    /// Record a committed main-frame navigation.
    ///
    /// `scope` is the scope the address resolved to: the tab is bound to it
    /// and its activity bumped, or the binding is cleared when it is `None`.
    pub fn record_commit(
        &self,
        tab_id: TabId,
        address: &str,
        scope: Option<&ScopeId>,
        now: DateTime<Utc>,
    ) {
        let mut state = self.state.write();
        let tab = state.tab_mut(tab_id);
        tab.last_committed_address = Some(address.to_string());
        tab.bound_scope = scope.cloned();

        if let Some(scope) = scope {
            state.bump(scope, now);
        }
    }

    /// Record a committed address without touching the tab's binding
    pub fn record_address(&self, tab_id: TabId, address: &str) {
        let mut state = self.state.write();
        state.tab_mut(tab_id).last_committed_address = Some(address.to_string());
    }

    /// Forget a closed tab and any window pointer to it
    pub fn remove_tab(&self, tab_id: TabId) {
        let mut state = self.state.write();
        state.tabs.remove(&tab_id);

        for window in state.windows.values_mut() {
            if window.last_active_tab == Some(tab_id) {
                window.last_active_tab = None;
            }
        }

        tracing::debug!(tab_id = %tab_id, "Purged closed tab");
    }

    /// The host swapped `old_id` for `new_id` (prerender, discard/restore).
    ///
    /// The committed address and binding move to the new id; the redirect
    /// cooldown and decision debounce start fresh.
    pub fn replace_tab(&self, old_id: TabId, new_id: TabId) {
        if old_id == new_id {
            return;
        }

        let mut state = self.state.write();
        let Some(old) = state.tabs.remove(&old_id) else {
            // Nothing known about the old tab; the new one starts empty
            state.tab_mut(new_id);
            return;
        };

        let tab = state.tab_mut(new_id);
        if old.last_committed_address.is_some() {
            tab.last_committed_address = old.last_committed_address;
        }
        if old.bound_scope.is_some() {
            tab.bound_scope = old.bound_scope;
        }
        if tab.window_id.is_none() {
            tab.window_id = old.window_id;
        }
        tab.last_redirect_at = None;
        tab.last_decision_at = None;
        tab.last_decision_key = None;

        for window in state.windows.values_mut() {
            if window.last_active_tab == Some(old_id) {
                window.last_active_tab = Some(new_id);
            }
        }

        tracing::debug!(old_tab_id = %old_id, new_tab_id = %new_id, "Migrated replaced tab");
    }

    // === Debounce and cooldown ===

    /// Claim the right to decide on `key` for this tab.
    ///
    /// Returns false when the same target was decided within `debounce`.
    pub fn try_begin_decision(
        &self,
        tab_id: TabId,
        key: &str,
        now: DateTime<Utc>,
        debounce: Duration,
    ) -> bool {
        let mut state = self.state.write();
        let tab = state.tab_mut(tab_id);
        if tab.decision_debounced(key, now, debounce) {
            return false;
        }
        tab.last_decision_at = Some(now);
        tab.last_decision_key = Some(key.to_string());
        true
    }

    /// Claim the right to redirect this tab.
    ///
    /// Returns false while the previous redirect is inside `cooldown`.
    pub fn try_mark_redirect(&self, tab_id: TabId, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let mut state = self.state.write();
        let tab = state.tab_mut(tab_id);
        if tab.redirect_cooling_down(now, cooldown) {
            return false;
        }
        tab.last_redirect_at = Some(now);
        true
    }

    // === Scope activity ===

    pub fn bump_scope_activity(&self, scope: &ScopeId, now: DateTime<Utc>) {
        self.state.write().bump(scope, now);
    }

    pub fn scope_activity(&self, scope: &ScopeId) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .activity
            .get(scope)
            .map(|a| a.last_active_at)
    }

    // === Windows ===

    pub fn set_window_active_tab(&self, window_id: WindowId, tab_id: TabId) {
        let mut state = self.state.write();
        state.window_mut(window_id).last_active_tab = Some(tab_id);
        state.tab_mut(tab_id).window_id = Some(window_id);
    }

    pub fn active_tab(&self, window_id: WindowId) -> Option<TabId> {
        self.state
            .read()
            .windows
            .get(&window_id)
            .and_then(|w| w.last_active_tab)
    }

    pub fn window(&self, window_id: WindowId) -> Option<TrackedWindow> {
        self.state.read().windows.get(&window_id).cloned()
    }

    pub fn set_focused_window(&self, window_id: Option<WindowId>) {
        let mut state = self.state.write();
        state.focused_window = window_id;
        if let Some(window_id) = window_id {
            state.window_mut(window_id);
        }
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.state.read().focused_window
    }

    /// Active tab of the focused window
    pub fn focused_tab(&self) -> Option<TabId> {
        let state = self.state.read();
        state
            .focused_window
            .and_then(|w| state.windows.get(&w))
            .and_then(|w| w.last_active_tab)
    }

    /// Forget a closed window
    pub fn remove_window(&self, window_id: WindowId) {
        let mut state = self.state.write();
        state.windows.remove(&window_id);
        if state.focused_window == Some(window_id) {
            state.focused_window = None;
        }
        tracing::debug!(window_id = %window_id, "Purged closed window");
    }

    // === Focus ===

    /// Apply a focus transition.
    ///
    /// Updates the window's active tab and the focused window, then compares
    /// the scopes of both tabs. A switch inside one scope only bumps that
    /// scope's activity. Leaving a scope bumps the scope left behind; the
    /// caller then runs the inactivity check for the scope entered.
    pub fn focus_change(
        &self,
        change: &FocusChange,
        resolver: &ScopeResolver,
        now: DateTime<Utc>,
    ) -> FocusOutcome {
        let mut state = self.state.write();

        state.focused_window = Some(change.window);
        state.window_mut(change.window).last_active_tab = Some(change.to_tab);

        let to_tab = state.tab_mut(change.to_tab);
        to_tab.window_id = Some(change.window);
        if to_tab.last_committed_address.is_none() {
            to_tab.last_committed_address = change.to_address.clone();
        }

        let from_scope = change
            .from_tab
            .and_then(|tab_id| state.scope_for(tab_id, resolver));
        let to_scope = state.scope_for(change.to_tab, resolver);

        if let (Some(from), Some(to)) = (&from_scope, &to_scope) {
            if from == to {
                let scope = to.clone();
                state.bump(&scope, now);
                return FocusOutcome::SameScope(scope);
            }
        }

        if let Some(from) = &from_scope {
            state.bump(from, now);
        }

        FocusOutcome::Switched {
            from_scope,
            to_scope,
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionTracker {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}
