//! Gate coordinator
//!
//! Owns the resolver, tracker, decision engine, inactivity monitor and
//! phrase matcher, and routes host events through them. No lock is held
//! across a call into the host.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use mindgate_inactivity::{IdleState, InactivityMonitor, Verdict};
use mindgate_navigation::{
    ConfirmationRequest, Decision, DecisionEngine, NavigationIntent, Redirect, MAIN_FRAME,
};
use mindgate_phrase::PhraseMatcher;
use mindgate_scope::{Rule, ScopeId, ScopeResolver};
use mindgate_tabs::{FocusChange, SessionTracker, TabId, WindowId};

use crate::clock::{Clock, SystemClock};
use crate::config::GateSettings;
use crate::event::GateEvent;
use crate::host::Host;
use crate::store::ConfigStore;
use crate::Result;

pub struct Gate<H> {
    host: H,
    clock: Arc<dyn Clock>,
    /// Source for reloads; `None` when rules and settings are supplied directly
    store: Option<ConfigStore>,
    resolver: RwLock<ScopeResolver>,
    tracker: SessionTracker,
    engine: RwLock<DecisionEngine>,
    monitor: RwLock<InactivityMonitor>,
    matcher: RwLock<PhraseMatcher>,
}

impl<H: Host> Gate<H> {
    pub fn new(host: H, settings: &GateSettings, rules: &[Rule]) -> Result<Self> {
        let engine = DecisionEngine::new(settings.confirmation()?, settings.decision_timing());

        Ok(Self {
            host,
            clock: Arc::new(SystemClock),
            store: None,
            resolver: RwLock::new(ScopeResolver::from_rules(rules)),
            tracker: SessionTracker::new(),
            engine: RwLock::new(engine),
            monitor: RwLock::new(InactivityMonitor::new(settings.inactivity_policy())),
            matcher: RwLock::new(settings.phrase_matcher()),
        })
    }

    /// Gate loading rules and settings from `store`, reloading on change
    pub fn with_store(host: H, store: ConfigStore) -> Result<Self> {
        let settings = store.settings()?;
        let rules = store.rules()?;
        let mut gate = Self::new(host, &settings, &rules)?;
        gate.store = Some(store);

        tracing::info!(rules = rules.len(), "Gate initialized from store");
        Ok(gate)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn store(&self) -> Option<&ConfigStore> {
        self.store.as_ref()
    }

    // === Event dispatch ===

    /// Process host events until the sender side closes.
    ///
    /// Store changes are applied before pending events so that later events
    /// see the new rules.
    pub async fn run(&self, mut events: mpsc::Receiver<GateEvent>) {
        let mut config_changes = self.store.as_ref().map(ConfigStore::subscribe);
        self.sync_idle_interval().await;

        tracing::info!("Gate event loop started");

        loop {
            tokio::select! {
                biased;

                _ = next_config_change(&mut config_changes) => self.reload().await,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }

        tracing::info!("Gate event loop stopped");
    }

    pub async fn handle(&self, event: GateEvent) {
        match event {
            GateEvent::BeforeNavigate(intent) => {
                self.navigate(&intent).await;
            }
            GateEvent::Committed {
                tab_id,
                frame_id,
                address,
            } => {
                if frame_id == MAIN_FRAME {
                    self.commit(tab_id, &address);
                }
            }
            GateEvent::TabCreated { tab_id, window_id } => {
                self.tracker.observe_tab(tab_id, window_id);
            }
            GateEvent::TabRemoved { tab_id } => self.tracker.remove_tab(tab_id),
            GateEvent::TabReplaced {
                removed_tab_id,
                added_tab_id,
            } => self.tracker.replace_tab(removed_tab_id, added_tab_id),
            GateEvent::TabActivated { tab_id, window_id } => {
                self.tab_activated(tab_id, window_id).await;
            }
            GateEvent::TabUpdated {
                tab_id,
                audible,
                muted,
            } => {
                if audible.is_some() || muted.is_some() {
                    self.bump_tab_scope(tab_id);
                }
            }
            GateEvent::WindowFocusChanged { window_id } => {
                self.window_focused(window_id).await;
            }
            GateEvent::WindowRemoved { window_id } => self.tracker.remove_window(window_id),
            GateEvent::IdleStateChanged { state } => self.idle_state_changed(state).await,
            GateEvent::ConfigChanged => self.reload().await,
            GateEvent::RecheckFocused => {
                if let Some(tab_id) = self.tracker.focused_tab() {
                    self.check_tab(tab_id).await;
                }
            }
        }
    }

    // === Navigation ===

    /// Decide a navigation intent and deliver any redirect
    pub async fn navigate(&self, intent: &NavigationIntent) -> Decision {
        let decision = {
            let resolver = self.resolver.read();
            self.engine
                .read()
                .decide(intent, &self.tracker, &resolver, self.clock.now())
        };

        if let Decision::Redirect(redirect) = &decision {
            self.deliver(redirect).await;
        }
        decision
    }

    /// Record a committed main-frame navigation
    pub fn commit(&self, tab_id: TabId, address: &str) -> Option<ScopeId> {
        let resolver = self.resolver.read();
        self.engine
            .read()
            .record_commit(tab_id, address, &self.tracker, &resolver, self.clock.now())
    }

    async fn deliver(&self, redirect: &Redirect) {
        if let Err(e) = self
            .host
            .redirect(redirect.tab_id, redirect.address.clone())
            .await
        {
            tracing::debug!(tab_id = %redirect.tab_id, error = %e, "Redirect failed");
        }
    }

    // === Focus and inactivity ===

    async fn tab_activated(&self, tab_id: TabId, window_id: WindowId) {
        let from_tab = self.tracker.active_tab(window_id);
        let to_address = if self.tracker.last_committed_address(tab_id).is_some() {
            None
        } else {
            self.snapshot_address(window_id, tab_id).await
        };

        self.focus_changed(FocusChange {
            from_tab,
            to_tab: tab_id,
            to_address,
            window: window_id,
        })
        .await;
    }

    async fn window_focused(&self, window_id: Option<WindowId>) {
        let Some(window_id) = window_id else {
            // The browser lost focus; the focused scope was active until now
            if let Some(tab_id) = self.tracker.focused_tab() {
                self.bump_tab_scope(tab_id);
            }
            self.tracker.set_focused_window(None);
            return;
        };

        let from_tab = self.tracker.focused_tab();
        let to_tab = match self.tracker.active_tab(window_id) {
            Some(tab_id) => Some((tab_id, None)),
            None => match self.host.active_tab(window_id).await {
                Ok(snapshot) => snapshot.map(|s| (s.tab_id, s.address)),
                Err(e) => {
                    tracing::debug!(window_id = %window_id, error = %e, "Active tab query failed");
                    None
                }
            },
        };

        let Some((to_tab, to_address)) = to_tab else {
            self.tracker.set_focused_window(Some(window_id));
            return;
        };

        self.focus_changed(FocusChange {
            from_tab,
            to_tab,
            to_address,
            window: window_id,
        })
        .await;
    }

    async fn focus_changed(&self, change: FocusChange) {
        let outcome = {
            let resolver = self.resolver.read();
            self.tracker
                .focus_change(&change, &resolver, self.clock.now())
        };

        if outcome.scope_to_check().is_some() {
            self.check_tab(change.to_tab).await;
        }
    }

    async fn idle_state_changed(&self, state: IdleState) {
        let returned = {
            let resolver = self.resolver.read();
            self.monitor
                .read()
                .on_idle_state(state, &self.tracker, &resolver, self.clock.now())
        };

        tracing::debug!(state = ?state, "Idle state changed");

        if let Some(tab_id) = returned {
            self.check_tab(tab_id).await;
        }
    }

    /// Run the inactivity check for a tab's scope, redirecting it to the
    /// confirmation step when due. Returns whether a redirect was issued.
    pub async fn check_tab(&self, tab_id: TabId) -> bool {
        if self.engine.read().is_on_confirmation(tab_id, &self.tracker) {
            return false;
        }

        let Some(scope) = self.tab_scope(tab_id) else {
            return false;
        };

        match self.verdict(&scope) {
            Verdict::Disabled | Verdict::NotDue => return false,
            Verdict::Due => {}
            Verdict::DueUnlessAudible => {
                let audible = match self.host.audible_tabs().await {
                    Ok(audible) => audible,
                    Err(e) => {
                        tracing::debug!(error = %e, "Audible tab query failed");
                        Vec::new()
                    }
                };

                let exempt = {
                    let resolver = self.resolver.read();
                    self.monitor.read().exempted_by_audio(
                        &scope,
                        &audible,
                        &self.tracker,
                        &resolver,
                    )
                };
                if exempt {
                    tracing::debug!(scope = %scope, "Inactivity exempted by audio");
                    return false;
                }

                // State may have moved on while the host answered
                if !matches!(
                    self.verdict(&scope),
                    Verdict::Due | Verdict::DueUnlessAudible
                ) {
                    return false;
                }
            }
        }

        let Some(target) = self.tracker.last_committed_address(tab_id) else {
            return false;
        };

        let decision = self.engine.read().redirect(
            tab_id,
            scope.clone(),
            &target,
            &self.tracker,
            self.clock.now(),
        );

        match decision {
            Decision::Redirect(redirect) => {
                tracing::info!(tab_id = %tab_id, scope = %scope, "Inactivity re-confirmation");
                self.deliver(&redirect).await;
                true
            }
            _ => false,
        }
    }

    fn verdict(&self, scope: &ScopeId) -> Verdict {
        self.monitor
            .read()
            .check(scope, &self.tracker, self.clock.now())
    }

    fn tab_scope(&self, tab_id: TabId) -> Option<ScopeId> {
        self.tracker
            .scope_for_tab(tab_id, &self.resolver.read())
    }

    fn bump_tab_scope(&self, tab_id: TabId) {
        if let Some(scope) = self.tab_scope(tab_id) {
            self.tracker.bump_scope_activity(&scope, self.clock.now());
        }
    }

    async fn snapshot_address(&self, window_id: WindowId, tab_id: TabId) -> Option<String> {
        match self.host.active_tab(window_id).await {
            Ok(Some(snapshot)) if snapshot.tab_id == tab_id => snapshot.address,
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(tab_id = %tab_id, error = %e, "Active tab query failed");
                None
            }
        }
    }

    // === Configuration ===

    /// Reload rules and settings from the store. Failures keep the current
    /// configuration.
    pub async fn reload(&self) {
        let Some(store) = &self.store else {
            return;
        };

        match store.rules() {
            Ok(rules) => self.set_rules(&rules),
            Err(e) => tracing::warn!(error = %e, "Failed to load rules, keeping current index"),
        }

        match store.settings() {
            Ok(settings) => {
                if let Err(e) = self.apply_settings(&settings).await {
                    tracing::warn!(error = %e, "Rejected gate settings");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load settings"),
        }
    }

    pub fn set_rules(&self, rules: &[Rule]) {
        let mut resolver = self.resolver.write();
        resolver.rebuild(rules);
        tracing::info!(rules = resolver.len(), "Scope index rebuilt");
    }

    pub async fn apply_settings(&self, settings: &GateSettings) -> Result<()> {
        let confirmation = settings.confirmation()?;

        *self.engine.write() = DecisionEngine::new(confirmation, settings.decision_timing());
        self.monitor.write().set_policy(settings.inactivity_policy());
        *self.matcher.write() = settings.phrase_matcher();

        self.sync_idle_interval().await;
        Ok(())
    }

    async fn sync_idle_interval(&self) {
        let policy = self.monitor.read().policy();
        if !policy.mode.is_enabled() {
            return;
        }

        let interval = policy.idle_interval();
        match self.host.set_idle_interval(interval).await {
            Ok(true) => {
                tracing::debug!(interval_secs = interval.as_secs(), "Idle detection interval set");
            }
            Ok(false) => tracing::debug!("Host has no idle signal"),
            Err(e) => tracing::debug!(error = %e, "Failed to set idle interval"),
        }
    }

    // === Confirmation step ===

    /// Target and scope the confirmation step was opened for
    pub fn confirmation_for(&self, address: &str) -> Option<ConfirmationRequest> {
        self.engine.read().confirmation().parse(address)
    }

    pub fn phrase_for(&self, scope: &ScopeId) -> Option<String> {
        self.resolver
            .read()
            .rule(scope)
            .map(|rule| rule.phrase.clone())
    }

    /// Whether `input` is accepted for the scope's phrase. Unknown scopes
    /// accept nothing.
    pub fn check_phrase(&self, scope: &ScopeId, input: &str) -> bool {
        self.phrase_for(scope)
            .is_some_and(|phrase| self.matcher.read().accepts(input, &phrase))
    }

    pub fn check_partial_phrase(&self, scope: &ScopeId, input: &str) -> bool {
        self.phrase_for(scope)
            .is_some_and(|phrase| self.matcher.read().partially_accepts(input, &phrase))
    }

    /// Address the confirmation step navigates to once the phrase is accepted
    pub fn completion_address(&self, target: &str) -> String {
        self.engine.read().confirmation().completion_address(target)
    }
}

async fn next_config_change(changes: &mut Option<watch::Receiver<u64>>) {
    match changes {
        Some(rx) => {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::host::{HostError, HostResult, TabSnapshot};
    use chrono::{Duration, Utc};
    use mindgate_inactivity::{AudibleTab, InactivityMode};
    use mindgate_navigation::{AllowReason, IgnoreReason};
    use mindgate_storage::Database;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockHost {
        redirects: Mutex<Vec<(TabId, String)>>,
        audible: Mutex<Vec<AudibleTab>>,
        active: Mutex<HashMap<WindowId, TabSnapshot>>,
        idle_intervals: Mutex<Vec<std::time::Duration>>,
        fail_redirects: AtomicBool,
    }

    impl MockHost {
        fn redirects(&self) -> Vec<(TabId, String)> {
            self.redirects.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl Host for MockHost {
        async fn redirect(&self, tab_id: TabId, address: String) -> HostResult<()> {
            if self.fail_redirects.load(Ordering::SeqCst) {
                return Err(HostError::TabGone(tab_id));
            }
            self.redirects.lock().push((tab_id, address));
            Ok(())
        }

        async fn audible_tabs(&self) -> HostResult<Vec<AudibleTab>> {
            Ok(self.audible.lock().clone())
        }

        async fn active_tab(&self, window_id: WindowId) -> HostResult<Option<TabSnapshot>> {
            Ok(self.active.lock().get(&window_id).cloned())
        }

        async fn set_idle_interval(&self, interval: std::time::Duration) -> HostResult<bool> {
            self.idle_intervals.lock().push(interval);
            Ok(true)
        }
    }

    const W: WindowId = WindowId(1);

    fn fb() -> ScopeId {
        ScopeId::from_rule_id("fb")
    }

    fn rules() -> Vec<Rule> {
        vec![
            Rule::new("fb", "facebook.com", "I choose this"),
            Rule::new("yt", "youtube.com", "one video only"),
        ]
    }

    fn inactivity(mode: InactivityMode) -> GateSettings {
        GateSettings {
            inactivity_mode: mode,
            inactivity_timeout_ms: 3_000,
            ..GateSettings::default()
        }
    }

    fn gate(settings: GateSettings) -> (Gate<MockHost>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = Gate::new(MockHost::default(), &settings, &rules())
            .unwrap()
            .with_clock(clock.clone());
        (gate, clock)
    }

    async fn commit(gate: &Gate<MockHost>, tab: i64, address: &str) {
        gate.handle(GateEvent::Committed {
            tab_id: TabId(tab),
            frame_id: MAIN_FRAME,
            address: address.to_string(),
        })
        .await;
    }

    async fn activate(gate: &Gate<MockHost>, tab: i64) {
        gate.handle(GateEvent::TabActivated {
            tab_id: TabId(tab),
            window_id: W,
        })
        .await;
    }

    #[tokio::test]
    async fn test_scoped_navigation_redirects_once_per_cooldown() {
        let (gate, clock) = gate(GateSettings::default());

        let first = gate
            .navigate(
                &NavigationIntent::new(TabId(1), "https://facebook.com/")
                    .from_source("https://rust-lang.org/"),
            )
            .await;
        assert!(first.is_redirect());

        clock.advance(Duration::milliseconds(100));
        let second = gate
            .navigate(
                &NavigationIntent::new(TabId(1), "https://facebook.com/groups")
                    .from_source("https://rust-lang.org/"),
            )
            .await;
        assert_eq!(second, Decision::Ignored(IgnoreReason::CoolingDown));

        let redirects = gate.host().redirects();
        assert_eq!(redirects.len(), 1);
        let request = gate.confirmation_for(&redirects[0].1).unwrap();
        assert_eq!(request.target, "https://facebook.com/");
        assert_eq!(request.scope, fb());
    }

    #[tokio::test]
    async fn test_redirect_failure_is_swallowed() {
        let (gate, _clock) = gate(GateSettings::default());
        gate.host().fail_redirects.store(true, Ordering::SeqCst);

        let decision = gate
            .navigate(&NavigationIntent::new(TabId(1), "https://youtube.com/watch?v=1"))
            .await;
        assert!(decision.is_redirect());
        assert!(gate.host().redirects().is_empty());
    }

    #[tokio::test]
    async fn test_subframe_commits_ignored() {
        let (gate, _clock) = gate(GateSettings::default());
        gate.handle(GateEvent::Committed {
            tab_id: TabId(1),
            frame_id: 3,
            address: "https://facebook.com/plugins".to_string(),
        })
        .await;
        assert!(gate.tracker().tab(TabId(1)).is_none());
    }

    #[tokio::test]
    async fn test_inactivity_redirect_on_focus() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));

        commit(&gate, 1, "https://facebook.com/").await;
        commit(&gate, 2, "https://rust-lang.org/").await;
        activate(&gate, 1).await;
        activate(&gate, 2).await;
        assert!(gate.host().redirects().is_empty());

        clock.advance(Duration::milliseconds(3_500));
        activate(&gate, 1).await;

        let redirects = gate.host().redirects();
        assert_eq!(redirects.len(), 1);
        assert_eq!(redirects[0].0, TabId(1));
        let request = gate.confirmation_for(&redirects[0].1).unwrap();
        assert_eq!(request.target, "https://facebook.com/");
        assert_eq!(request.scope, fb());
    }

    #[tokio::test]
    async fn test_inactivity_off_never_redirects() {
        let (gate, clock) = gate(inactivity(InactivityMode::Off));

        commit(&gate, 1, "https://facebook.com/").await;
        commit(&gate, 2, "https://rust-lang.org/").await;
        activate(&gate, 1).await;
        activate(&gate, 2).await;
        clock.advance(Duration::seconds(60));
        activate(&gate, 1).await;

        assert!(gate.host().redirects().is_empty());
    }

    #[tokio::test]
    async fn test_same_scope_switch_only_bumps() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));

        commit(&gate, 1, "https://facebook.com/").await;
        commit(&gate, 3, "https://facebook.se/groups").await;
        activate(&gate, 1).await;

        clock.advance(Duration::milliseconds(3_500));
        activate(&gate, 3).await;

        assert!(gate.host().redirects().is_empty());
        assert_eq!(gate.tracker().scope_activity(&fb()), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_audio_exemption_lasts_while_audible() {
        let (gate, clock) = gate(inactivity(InactivityMode::AllExceptAudio));

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;
        gate.host()
            .audible
            .lock()
            .push(AudibleTab::new(TabId(4), "https://m.facebook.com/watch"));

        clock.advance(Duration::milliseconds(3_500));
        gate.handle(GateEvent::RecheckFocused).await;
        assert!(gate.host().redirects().is_empty());

        // The audible tab closed
        gate.host().audible.lock().clear();
        gate.handle(GateEvent::RecheckFocused).await;
        assert_eq!(gate.host().redirects().len(), 1);
    }

    #[tokio::test]
    async fn test_muted_tab_does_not_exempt() {
        let (gate, clock) = gate(inactivity(InactivityMode::AllExceptAudio));

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;
        gate.host()
            .audible
            .lock()
            .push(AudibleTab::new(TabId(4), "https://facebook.com/watch").muted());

        clock.advance(Duration::milliseconds(3_500));
        gate.handle(GateEvent::RecheckFocused).await;
        assert_eq!(gate.host().redirects().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_signal_round_trip() {
        let (gate, clock) = gate(GateSettings {
            inactivity_timeout_ms: 60_000,
            ..inactivity(InactivityMode::All)
        });
        let start = clock.now();

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;

        clock.advance(Duration::seconds(20));
        gate.handle(GateEvent::IdleStateChanged {
            state: IdleState::Active,
        })
        .await;
        assert!(gate.host().redirects().is_empty());

        // Reported a full 60 s interval after the last input at +20 s
        clock.advance(Duration::seconds(60));
        gate.handle(GateEvent::IdleStateChanged {
            state: IdleState::Idle,
        })
        .await;
        assert_eq!(
            gate.tracker().scope_activity(&fb()),
            Some(start + Duration::seconds(20))
        );

        // Away 90 s in total, past the 60 s timeout
        clock.advance(Duration::seconds(30));
        gate.handle(GateEvent::IdleStateChanged {
            state: IdleState::Active,
        })
        .await;
        assert_eq!(gate.host().redirects().len(), 1);
    }

    #[tokio::test]
    async fn test_short_lock_does_not_reconfirm() {
        let (gate, clock) = gate(GateSettings {
            inactivity_timeout_ms: 60_000,
            ..inactivity(InactivityMode::All)
        });

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;

        // Locking is reported at once, so the lag puts the estimate before
        // the commit and the record stays put
        clock.advance(Duration::seconds(5));
        gate.handle(GateEvent::IdleStateChanged {
            state: IdleState::Locked,
        })
        .await;
        clock.advance(Duration::seconds(10));
        gate.handle(GateEvent::IdleStateChanged {
            state: IdleState::Active,
        })
        .await;
        assert!(gate.host().redirects().is_empty());
    }

    #[tokio::test]
    async fn test_no_recheck_on_confirmation_page() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;
        clock.advance(Duration::milliseconds(3_500));
        gate.handle(GateEvent::RecheckFocused).await;

        let address = gate.host().redirects()[0].1.clone();
        commit(&gate, 1, &address).await;

        clock.advance(Duration::seconds(5));
        gate.handle(GateEvent::RecheckFocused).await;
        assert_eq!(gate.host().redirects().len(), 1);
        assert_eq!(gate.tracker().tab(TabId(1)).unwrap().bound_scope, Some(fb()));
    }

    #[tokio::test]
    async fn test_focus_lost_bumps_scope() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));

        commit(&gate, 1, "https://facebook.com/").await;
        activate(&gate, 1).await;

        clock.advance(Duration::seconds(30));
        gate.handle(GateEvent::WindowFocusChanged { window_id: None })
            .await;
        assert_eq!(gate.tracker().scope_activity(&fb()), Some(clock.now()));
        assert_eq!(gate.tracker().focused_window(), None);

        clock.advance(Duration::seconds(1));
        gate.handle(GateEvent::WindowFocusChanged { window_id: Some(W) })
            .await;
        assert!(gate.host().redirects().is_empty());
        assert_eq!(gate.tracker().focused_tab(), Some(TabId(1)));
    }

    #[tokio::test]
    async fn test_focus_uses_host_snapshot_for_unknown_tab() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));

        // Carried over from before a restart: no committed address known
        gate.host().active.lock().insert(
            W,
            TabSnapshot {
                tab_id: TabId(9),
                address: Some("https://youtube.com/".to_string()),
            },
        );
        gate.handle(GateEvent::WindowFocusChanged { window_id: Some(W) })
            .await;

        assert_eq!(
            gate.tracker().last_committed_address(TabId(9)).as_deref(),
            Some("https://youtube.com/")
        );
        assert_eq!(gate.tracker().focused_tab(), Some(TabId(9)));
        clock.advance(Duration::seconds(10));
        gate.handle(GateEvent::RecheckFocused).await;
        // Never entered since start, so not due
        assert!(gate.host().redirects().is_empty());
    }

    #[tokio::test]
    async fn test_audible_toggle_bumps_activity() {
        let (gate, clock) = gate(inactivity(InactivityMode::All));
        commit(&gate, 1, "https://facebook.com/").await;

        clock.advance(Duration::seconds(7));
        gate.handle(GateEvent::TabUpdated {
            tab_id: TabId(1),
            audible: Some(false),
            muted: None,
        })
        .await;
        assert_eq!(gate.tracker().scope_activity(&fb()), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_tab_replacement_preserves_scope() {
        let (gate, clock) = gate(GateSettings::default());

        let decision = gate
            .navigate(&NavigationIntent::new(TabId(5), "https://facebook.com/"))
            .await;
        assert!(decision.is_redirect());
        commit(&gate, 5, "https://facebook.com/").await;

        gate.handle(GateEvent::TabReplaced {
            removed_tab_id: TabId(5),
            added_tab_id: TabId(7),
        })
        .await;

        assert!(gate.tracker().tab(TabId(5)).is_none());
        let tab = gate.tracker().tab(TabId(7)).unwrap();
        assert_eq!(tab.bound_scope, Some(fb()));
        assert_eq!(
            tab.last_committed_address.as_deref(),
            Some("https://facebook.com/")
        );
        assert_eq!(tab.last_redirect_at, None);

        clock.advance(Duration::milliseconds(10));
        let decision = gate
            .navigate(
                &NavigationIntent::new(TabId(7), "https://facebook.com/marketplace")
                    .from_source("https://facebook.com/"),
            )
            .await;
        assert_eq!(decision, Decision::Allow(AllowReason::SameScope));
    }

    #[tokio::test]
    async fn test_phrase_checks() {
        let (gate, _clock) = gate(GateSettings::default());

        assert_eq!(gate.phrase_for(&fb()).as_deref(), Some("I choose this"));
        assert!(gate.check_phrase(&fb(), "i chose this"));
        assert!(gate.check_phrase(&fb(), "  I  choose this "));
        assert!(!gate.check_phrase(&fb(), "something else"));
        assert!(gate.check_partial_phrase(&fb(), "I cho"));
        assert!(!gate.check_partial_phrase(&fb(), "xyz"));
        assert!(!gate.check_phrase(&ScopeId::from_rule_id("gone"), "I choose this"));

        assert_eq!(
            gate.completion_address("https://facebook.com/"),
            "https://facebook.com/?mindgate_confirmed=1"
        );
    }

    #[tokio::test]
    async fn test_config_changed_reloads_from_store() {
        let store = ConfigStore::new(Database::open_in_memory().unwrap());
        let gate = Gate::with_store(MockHost::default(), store.clone()).unwrap();

        let before = gate
            .navigate(&NavigationIntent::new(TabId(1), "https://facebook.com/"))
            .await;
        assert_eq!(before, Decision::Allow(AllowReason::Unscoped));

        store.add_rule("facebook.com", "breathe").unwrap();
        store.save_settings(&inactivity(InactivityMode::All)).unwrap();
        gate.handle(GateEvent::ConfigChanged).await;

        let after = gate
            .navigate(&NavigationIntent::new(TabId(2), "https://facebook.com/"))
            .await;
        assert!(after.is_redirect());
        assert_eq!(
            *gate.host().idle_intervals.lock(),
            vec![std::time::Duration::from_secs(15)]
        );
    }

    #[tokio::test]
    async fn test_bad_settings_keep_current_engine() {
        let store = ConfigStore::new(Database::open_in_memory().unwrap());
        store.add_rule("facebook.com", "breathe").unwrap();
        let gate = Gate::with_store(MockHost::default(), store.clone()).unwrap();

        store
            .save_settings(&GateSettings {
                confirmation_page: "not a page".to_string(),
                ..GateSettings::default()
            })
            .unwrap();
        gate.reload().await;

        let decision = gate
            .navigate(&NavigationIntent::new(TabId(1), "https://facebook.com/"))
            .await;
        let redirect = decision.redirect().unwrap();
        assert!(redirect
            .address
            .starts_with("chrome-extension://mindgate/confirm.html?"));
    }

    #[tokio::test]
    async fn test_run_applies_store_changes_and_stops() {
        let store = ConfigStore::new(Database::open_in_memory().unwrap());
        let gate = Gate::with_store(MockHost::default(), store.clone()).unwrap();
        let (tx, rx) = mpsc::channel(8);

        let edit = async {
            tokio::task::yield_now().await;
            store.add_rule("youtube.com", "one video only").unwrap();
            drop(tx);
        };
        tokio::join!(gate.run(rx), edit);

        let decision = gate
            .navigate(&NavigationIntent::new(TabId(1), "https://youtube.com/"))
            .await;
        assert!(decision.is_redirect());
    }

    #[tokio::test]
    async fn test_run_dispatches_events() {
        let (gate, _clock) = gate(GateSettings::default());
        let (tx, rx) = mpsc::channel(8);

        tx.send(GateEvent::BeforeNavigate(NavigationIntent::new(
            TabId(1),
            "https://facebook.com/",
        )))
        .await
        .unwrap();
        tx.send(GateEvent::TabRemoved { tab_id: TabId(1) })
            .await
            .unwrap();
        drop(tx);

        gate.run(rx).await;

        assert_eq!(gate.host().redirects().len(), 1);
        assert!(gate.tracker().tab(TabId(1)).is_none());
    }
}
