//! Navigation decision engine

use chrono::{DateTime, Duration, Utc};

use mindgate_scope::{normalize, ScopeId, ScopeResolver};
use mindgate_tabs::{SessionTracker, TabId};

use crate::confirmation::{has_completion_marker, strip_completion_marker, ConfirmationPage};
use crate::decision::{AllowReason, Decision, IgnoreReason, Redirect};
use crate::intent::NavigationIntent;

/// Debounce and cooldown windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionTiming {
    /// Repeated intents for the same tab and target inside this window are dropped
    pub debounce: Duration,
    /// Minimum spacing between two redirects of one tab
    pub cooldown: Duration,
}

impl Default for DecisionTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::milliseconds(300),
            cooldown: Duration::milliseconds(500),
        }
    }
}

pub struct DecisionEngine {
    confirmation: ConfirmationPage,
    timing: DecisionTiming,
}

impl DecisionEngine {
    pub fn new(confirmation: ConfirmationPage, timing: DecisionTiming) -> Self {
        Self {
            confirmation,
            timing,
        }
    }

    pub fn confirmation(&self) -> &ConfirmationPage {
        &self.confirmation
    }

    pub fn timing(&self) -> DecisionTiming {
        self.timing
    }

    /// Decide one navigation intent.
    ///
    /// Only the tracker is mutated; delivering a redirect to the host is the
    /// caller's job.
    pub fn decide(
        &self,
        intent: &NavigationIntent,
        tracker: &SessionTracker,
        resolver: &ScopeResolver,
        now: DateTime<Utc>,
    ) -> Decision {
        if !intent.is_main_frame() {
            return Decision::Ignored(IgnoreReason::SubFrame);
        }

        let tab_id = intent.tab_id;
        tracker.observe_tab(tab_id, intent.window_id);

        let marked = has_completion_marker(&intent.target);
        let target = strip_completion_marker(&intent.target);
        let target_key = normalize(&target).unwrap_or_else(|| target.clone());
        let debounce_key = if marked {
            format!("{}#{}", target_key, crate::COMPLETION_MARKER)
        } else {
            target_key.clone()
        };

        if !tracker.try_begin_decision(tab_id, &debounce_key, now, self.timing.debounce) {
            tracing::debug!(tab_id = %tab_id, target = %target, "Debounced duplicate intent");
            return Decision::Ignored(IgnoreReason::Debounced);
        }

        let target_scope = resolver.resolve(&target);

        let previous = intent
            .source
            .clone()
            .or_else(|| tracker.last_committed_address(tab_id))
            .map(|address| strip_completion_marker(&address));

        // 1. Same-scope continuation
        if let (Some(scope), Some(previous)) = (&target_scope, &previous) {
            if resolver.resolve(previous).as_ref() == Some(scope) {
                if normalize(previous).as_deref() == Some(target_key.as_str()) {
                    tracker.bump_scope_activity(scope, now);
                    return self.allow(tab_id, AllowReason::Churn);
                }
                return self.allow(tab_id, AllowReason::SameScope);
            }
        }

        // 2. Leaving the confirmation step
        if let Some(source) = previous.as_deref() {
            if self.confirmation.is_confirmation(source) {
                if self.confirmation.is_confirmation(&target) {
                    return self.allow(tab_id, AllowReason::ConfirmationPage);
                }
                return match target_scope {
                    Some(scope) if marked => {
                        tracker.bind_tab_scope(tab_id, &scope);
                        tracker.bump_scope_activity(&scope, now);
                        self.allow(tab_id, AllowReason::Confirmed)
                    }
                    Some(scope) => self.redirect(tab_id, scope, &target, tracker, now),
                    None => self.allow(tab_id, AllowReason::LeftConfirmation),
                };
            }
        }

        let Some(scope) = target_scope else {
            return self.allow(tab_id, AllowReason::Unscoped);
        };

        // 3. Carry-over from the window's active tab
        let window = intent
            .window_id
            .or_else(|| tracker.tab(tab_id).and_then(|t| t.window_id))
            .or_else(|| tracker.focused_window());
        if let Some(active) = window.and_then(|w| tracker.active_tab(w)) {
            if active != tab_id
                && self.committed_scope(active, tracker, resolver).as_ref() == Some(&scope)
            {
                tracker.bind_tab_scope(tab_id, &scope);
                return self.allow(tab_id, AllowReason::CarriedOver);
            }
        }

        // 4. Default
        self.redirect(tab_id, scope, &target, tracker, now)
    }

    /// Send a tab to the confirmation step for `scope`.
    ///
    /// Shared by navigation decisions and inactivity triggers so both honour
    /// the same per-tab cooldown. The tab is bound to the scope either way.
    pub fn redirect(
        &self,
        tab_id: TabId,
        scope: ScopeId,
        target: &str,
        tracker: &SessionTracker,
        now: DateTime<Utc>,
    ) -> Decision {
        tracker.bind_tab_scope(tab_id, &scope);

        if !tracker.try_mark_redirect(tab_id, now, self.timing.cooldown) {
            tracing::debug!(tab_id = %tab_id, scope = %scope, "Redirect suppressed by cooldown");
            return Decision::Ignored(IgnoreReason::CoolingDown);
        }

        let target = strip_completion_marker(target);
        let address = self.confirmation.address_for(&target, &scope);

        tracing::info!(tab_id = %tab_id, scope = %scope, target = %target, "Redirecting to confirmation");

        Decision::Redirect(Redirect {
            tab_id,
            scope,
            target,
            address,
        })
    }

    /// Record a committed main-frame navigation.
    ///
    /// The confirmation step's own address is recorded without touching the
    /// tab's binding, so the tab stays in the scope it is being asked about.
    pub fn record_commit(
        &self,
        tab_id: TabId,
        address: &str,
        tracker: &SessionTracker,
        resolver: &ScopeResolver,
        now: DateTime<Utc>,
    ) -> Option<ScopeId> {
        if self.confirmation.is_confirmation(address) {
            tracker.record_address(tab_id, address);
            return None;
        }

        let address = strip_completion_marker(address);
        let scope = resolver.resolve(&address);
        tracker.record_commit(tab_id, &address, scope.as_ref(), now);
        scope
    }

    /// Whether the tab is currently showing the confirmation step
    pub fn is_on_confirmation(&self, tab_id: TabId, tracker: &SessionTracker) -> bool {
        tracker
            .last_committed_address(tab_id)
            .is_some_and(|address| self.confirmation.is_confirmation(&address))
    }

    fn committed_scope(
        &self,
        tab_id: TabId,
        tracker: &SessionTracker,
        resolver: &ScopeResolver,
    ) -> Option<ScopeId> {
        tracker
            .last_committed_address(tab_id)
            .and_then(|address| resolver.resolve(&strip_completion_marker(&address)))
    }

    fn allow(&self, tab_id: TabId, reason: AllowReason) -> Decision {
        tracing::debug!(tab_id = %tab_id, reason = ?reason, "Allowing navigation");
        Decision::Allow(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgate_scope::Rule;
    use mindgate_tabs::WindowId;

    const PAGE: &str = "chrome-extension://mindgate/confirm.html";

    struct Fixture {
        engine: DecisionEngine,
        tracker: SessionTracker,
        resolver: ScopeResolver,
        start: DateTime<Utc>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                engine: DecisionEngine::new(
                    ConfirmationPage::new(PAGE).unwrap(),
                    DecisionTiming::default(),
                ),
                tracker: SessionTracker::new(),
                resolver: ScopeResolver::from_rules(&[
                    Rule::new("fb", "facebook.com", "breathe"),
                    Rule::new("ex", "a.example", "breathe"),
                ]),
                start: Utc::now(),
            }
        }

        fn at(&self, ms: i64) -> DateTime<Utc> {
            self.start + Duration::milliseconds(ms)
        }

        fn decide(&self, intent: NavigationIntent, ms: i64) -> Decision {
            self.engine
                .decide(&intent, &self.tracker, &self.resolver, self.at(ms))
        }

        fn commit(&self, tab: TabId, address: &str, ms: i64) {
            self.engine
                .record_commit(tab, address, &self.tracker, &self.resolver, self.at(ms));
        }
    }

    fn fb() -> ScopeId {
        ScopeId::from_rule_id("fb")
    }

    #[test]
    fn test_unscoped_target_allowed() {
        let f = Fixture::new();
        let decision = f.decide(NavigationIntent::new(TabId(1), "https://rust-lang.org/"), 0);
        assert_eq!(decision, Decision::Allow(AllowReason::Unscoped));
    }

    #[test]
    fn test_scoped_target_redirects() {
        let f = Fixture::new();
        let decision = f.decide(
            NavigationIntent::new(TabId(1), "https://www.facebook.com/").from_source("https://rust-lang.org/"),
            0,
        );

        let redirect = decision.redirect().unwrap();
        assert_eq!(redirect.tab_id, TabId(1));
        assert_eq!(redirect.scope, fb());
        assert_eq!(redirect.target, "https://www.facebook.com/");

        let request = f.engine.confirmation().parse(&redirect.address).unwrap();
        assert_eq!(request.target, "https://www.facebook.com/");
        assert_eq!(request.scope, fb());
        assert_eq!(f.tracker.tab(TabId(1)).unwrap().bound_scope, Some(fb()));
    }

    #[test]
    fn test_subframes_ignored() {
        let f = Fixture::new();
        let decision = f.decide(
            NavigationIntent::new(TabId(1), "https://facebook.com/plugin").in_frame(4),
            0,
        );
        assert_eq!(decision, Decision::Ignored(IgnoreReason::SubFrame));
        assert!(f.tracker.tab(TabId(1)).is_none());
    }

    #[test]
    fn test_churn_never_redirects() {
        let f = Fixture::new();
        f.commit(TabId(1), "https://a.example/x", 0);

        let decision = f.decide(
            NavigationIntent::new(TabId(1), "https://a.example/x").from_source("https://a.example/x"),
            1_000,
        );
        assert_eq!(decision, Decision::Allow(AllowReason::Churn));
        assert_eq!(
            f.tracker.scope_activity(&ScopeId::from_rule_id("ex")),
            Some(f.at(1_000))
        );
    }

    #[test]
    fn test_same_scope_wins_over_default() {
        let f = Fixture::new();
        f.commit(TabId(1), "https://facebook.com/", 0);

        // Without a source the tracker's committed address is used
        let decision = f.decide(NavigationIntent::new(TabId(1), "https://facebook.se/groups"), 1_000);
        assert_eq!(decision, Decision::Allow(AllowReason::SameScope));
    }

    #[test]
    fn test_debounce_yields_one_decision() {
        let f = Fixture::new();
        let intent = NavigationIntent::new(TabId(1), "https://facebook.com/");

        assert!(f.decide(intent.clone(), 0).is_redirect());
        assert_eq!(
            f.decide(intent.clone(), 200),
            Decision::Ignored(IgnoreReason::Debounced)
        );

        // A different target in the same window is still decided
        assert_eq!(
            f.decide(NavigationIntent::new(TabId(1), "https://rust-lang.org/"), 250),
            Decision::Allow(AllowReason::Unscoped)
        );
    }

    #[test]
    fn test_cooldown_yields_one_redirect() {
        let f = Fixture::new();

        let first = f.decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 0);
        // Past the debounce, inside the cooldown
        let second = f.decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 350);
        let third = f.decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 900);

        assert!(first.is_redirect());
        assert_eq!(second, Decision::Ignored(IgnoreReason::CoolingDown));
        assert!(third.is_redirect());
    }

    #[test]
    fn test_confirmation_escape_requires_marker() {
        let f = Fixture::new();
        let redirect = f
            .decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 0)
            .redirect()
            .cloned()
            .unwrap();
        f.commit(TabId(1), &redirect.address, 50);

        // Racing past the page without completing it re-asserts the gate
        let bypass = f.decide(
            NavigationIntent::new(TabId(1), "https://facebook.com/").from_source(&redirect.address),
            1_000,
        );
        assert!(bypass.is_redirect());

        // Leaving for somewhere ungated is fine
        let leave = f.decide(
            NavigationIntent::new(TabId(1), "https://rust-lang.org/").from_source(&redirect.address),
            2_000,
        );
        assert_eq!(leave, Decision::Allow(AllowReason::LeftConfirmation));

        // Completing the step lets the target through and marks the scope active
        let completed = f.engine.confirmation().completion_address("https://facebook.com/");
        let done = f.decide(
            NavigationIntent::new(TabId(1), completed.clone()).from_source(&redirect.address),
            3_000,
        );
        assert_eq!(done, Decision::Allow(AllowReason::Confirmed));
        assert_eq!(f.tracker.scope_activity(&fb()), Some(f.at(3_000)));

        f.commit(TabId(1), &completed, 3_100);
        assert_eq!(
            f.tracker.last_committed_address(TabId(1)).as_deref(),
            Some("https://facebook.com/")
        );
    }

    #[test]
    fn test_confirmation_escape_without_source() {
        let f = Fixture::new();
        let redirect = f
            .decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 0)
            .redirect()
            .cloned()
            .unwrap();
        f.commit(TabId(1), &redirect.address, 50);

        // The host left out the source; the committed confirmation page stands in
        let completed = f.engine.confirmation().completion_address("https://facebook.com/");
        let done = f.decide(NavigationIntent::new(TabId(1), completed), 5_000);
        assert_eq!(done, Decision::Allow(AllowReason::Confirmed));
        assert_eq!(f.tracker.scope_activity(&fb()), Some(f.at(5_000)));

        // Skipping the step is still sent back
        let bypass = f.decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 6_000);
        assert!(bypass.is_redirect());
    }

    #[test]
    fn test_marker_outside_confirmation_is_not_trusted() {
        let f = Fixture::new();
        let forged = f.engine.confirmation().completion_address("https://facebook.com/");
        let decision = f.decide(
            NavigationIntent::new(TabId(1), forged).from_source("https://rust-lang.org/"),
            0,
        );
        let redirect = decision.redirect().unwrap();
        assert_eq!(redirect.target, "https://facebook.com/");
    }

    #[test]
    fn test_confirmation_commit_keeps_binding() {
        let f = Fixture::new();
        let redirect = f
            .decide(NavigationIntent::new(TabId(1), "https://facebook.com/"), 0)
            .redirect()
            .cloned()
            .unwrap();
        f.commit(TabId(1), &redirect.address, 10);

        assert!(f.engine.is_on_confirmation(TabId(1), &f.tracker));
        assert_eq!(f.tracker.scope_for_tab(TabId(1), &f.resolver), Some(fb()));
    }

    #[test]
    fn test_active_tab_carry_over() {
        let f = Fixture::new();
        f.commit(TabId(1), "https://facebook.com/feed", 0);
        f.tracker.set_window_active_tab(WindowId(1), TabId(1));

        // Middle-click from the confirmed tab opens tab 2 in the background
        let decision = f.decide(
            NavigationIntent::new(TabId(2), "https://facebook.com/photo/1").in_window(WindowId(1)),
            100,
        );
        assert_eq!(decision, Decision::Allow(AllowReason::CarriedOver));
        assert_eq!(f.tracker.scope_for_tab(TabId(2), &f.resolver), Some(fb()));

        // The active tab itself gets no carry-over
        let own = f.decide(
            NavigationIntent::new(TabId(1), "https://a.example/").in_window(WindowId(1)),
            200,
        );
        assert!(own.is_redirect());
    }

    #[test]
    fn test_works_on_empty_tracker_after_restart() {
        let f = Fixture::new();
        // Cold start: the host still reports the address being left
        let decision = f.decide(
            NavigationIntent::new(TabId(42), "https://facebook.com/b").from_source("https://facebook.com/a"),
            0,
        );
        assert_eq!(decision, Decision::Allow(AllowReason::SameScope));
    }
}
