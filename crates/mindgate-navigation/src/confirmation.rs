//! Confirmation step addressing
//!
//! The gate sends a tab to `<page>?target=<address>&scope=<scope id>`. Once
//! the phrase is accepted, the page navigates to the target with the
//! completion marker appended, which the decision engine lets through.

use serde::{Deserialize, Serialize};
use url::Url;

use mindgate_scope::ScopeId;

use crate::error::NavigationError;
use crate::Result;

/// Query key appended to a target once the confirmation step is satisfied
pub const COMPLETION_MARKER: &str = "mindgate_confirmed";

const TARGET_PARAM: &str = "target";
const SCOPE_PARAM: &str = "scope";

/// Parameters the confirmation step reads back from its own address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub target: String,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPage {
    base: Url,
}

impl ConfirmationPage {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(NavigationError::InvalidConfirmationPage(base.to_string()));
        }
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// Confirmation step address for a blocked `target`
    pub fn address_for(&self, target: &str, scope: &ScopeId) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair(TARGET_PARAM, target)
            .append_pair(SCOPE_PARAM, scope.as_str());
        url.to_string()
    }

    /// Whether `address` is the confirmation step (any parameters)
    pub fn is_confirmation(&self, address: &str) -> bool {
        let Ok(url) = Url::parse(address) else {
            return false;
        };
        url.scheme() == self.base.scheme()
            && url.host_str() == self.base.host_str()
            && url.port() == self.base.port()
            && url.path() == self.base.path()
    }

    /// Address the confirmation step navigates to after acceptance
    pub fn completion_address(&self, target: &str) -> String {
        mark_completed(target)
    }

    /// Read target and scope back from a confirmation step address
    pub fn parse(&self, address: &str) -> Option<ConfirmationRequest> {
        if !self.is_confirmation(address) {
            return None;
        }

        let url = Url::parse(address).ok()?;
        let mut target = None;
        let mut scope = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                TARGET_PARAM => target = Some(value.into_owned()),
                SCOPE_PARAM => scope = value.parse::<ScopeId>().ok(),
                _ => {}
            }
        }

        Some(ConfirmationRequest {
            target: target.filter(|t| !t.is_empty())?,
            scope: scope?,
        })
    }
}

/// `target` annotated with the completion marker
pub fn mark_completed(target: &str) -> String {
    let Ok(mut url) = Url::parse(target) else {
        return target.to_string();
    };

    let marker = format!("{}=1", COMPLETION_MARKER);
    let query = match url.query().filter(|q| !q.is_empty()) {
        Some(existing) => format!("{}&{}", existing, marker),
        None => marker,
    };
    url.set_query(Some(&query));
    url.to_string()
}

pub fn has_completion_marker(address: &str) -> bool {
    let Ok(url) = Url::parse(address) else {
        return false;
    };
    url.query()
        .is_some_and(|q| q.split('&').any(is_marker_segment))
}

/// `address` without the completion marker; other query segments keep
/// their original encoding.
pub fn strip_completion_marker(address: &str) -> String {
    let Ok(mut url) = Url::parse(address) else {
        return address.to_string();
    };
    let Some(query) = url.query() else {
        return address.to_string();
    };
    if !query.split('&').any(is_marker_segment) {
        return address.to_string();
    }

    let kept: Vec<&str> = query
        .split('&')
        .filter(|segment| !segment.is_empty() && !is_marker_segment(segment))
        .collect();
    let kept = kept.join("&");

    url.set_query(if kept.is_empty() { None } else { Some(&kept) });
    url.to_string()
}

fn is_marker_segment(segment: &str) -> bool {
    segment == COMPLETION_MARKER
        || segment
            .strip_prefix(COMPLETION_MARKER)
            .is_some_and(|rest| rest.starts_with('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ConfirmationPage {
        ConfirmationPage::new("chrome-extension://abcdef/confirm.html").unwrap()
    }

    #[test]
    fn test_address_roundtrip() {
        let page = page();
        let scope = ScopeId::from_rule_id("rule-1");
        let target = "https://facebook.com/groups?id=5&x=a b";

        let address = page.address_for(target, &scope);
        assert!(address.starts_with("chrome-extension://abcdef/confirm.html?"));
        assert!(page.is_confirmation(&address));

        let request = page.parse(&address).unwrap();
        assert_eq!(request.target, target);
        assert_eq!(request.scope, scope);
    }

    #[test]
    fn test_not_confirmation() {
        let page = page();
        assert!(!page.is_confirmation("https://facebook.com/"));
        assert!(!page.is_confirmation("chrome-extension://other/confirm.html"));
        assert!(!page.is_confirmation("chrome-extension://abcdef/options.html"));
        assert!(page.parse("chrome-extension://abcdef/confirm.html").is_none());
        assert!(page.parse("garbage").is_none());
    }

    #[test]
    fn test_invalid_base() {
        assert!(ConfirmationPage::new("not a url").is_err());
        assert!(ConfirmationPage::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_completion_marker() {
        let marked = mark_completed("https://facebook.com/");
        assert_eq!(marked, "https://facebook.com/?mindgate_confirmed=1");
        assert!(has_completion_marker(&marked));
        assert_eq!(strip_completion_marker(&marked), "https://facebook.com/");

        let marked = mark_completed("https://example.com/search?q=a+b#top");
        assert_eq!(
            marked,
            "https://example.com/search?q=a+b&mindgate_confirmed=1#top"
        );
        assert_eq!(
            strip_completion_marker(&marked),
            "https://example.com/search?q=a+b#top"
        );

        assert!(!has_completion_marker("https://example.com/?mindgate_confirmedx=1"));
        assert!(!has_completion_marker("https://example.com/"));
        assert_eq!(
            strip_completion_marker("https://example.com/?a=1"),
            "https://example.com/?a=1"
        );
    }
}
