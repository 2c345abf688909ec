//! Scope resolver
//!
//! Compiles the configured rules into an index keyed by folded host and
//! answers "which scope governs this address?". Lookup is exact or
//! path-prefix; there is no fuzzy matching at this layer.

use std::collections::{HashMap, HashSet};

use crate::normalize::{canonical_host, fold_suffix, parse_address};
use crate::rule::{Rule, ScopeId};

#[derive(Debug, Clone)]
struct CompiledRule {
    scope: ScopeId,
    /// Path prefix without trailing slash; empty matches every path
    path: String,
}

impl CompiledRule {
    fn matches_path(&self, path: &str) -> bool {
        if self.path.is_empty() || path == self.path {
            return true;
        }
        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScopeResolver {
    /// Folded host -> rules in configuration order
    index: HashMap<String, Vec<CompiledRule>>,
    /// Rules that made it into the index
    rules: HashMap<ScopeId, Rule>,
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut resolver = Self::new();
        resolver.rebuild(rules);
        resolver
    }

    /// Replace the index with one compiled from `rules`.
    ///
    /// Rules with a duplicate id, an unparseable pattern or a pattern that
    /// compiles to an already-registered key are left out; the rest are kept.
    pub fn rebuild(&mut self, rules: &[Rule]) {
        let mut index: HashMap<String, Vec<CompiledRule>> = HashMap::new();
        let mut by_scope = HashMap::new();
        let mut seen_keys = HashSet::new();

        for rule in rules {
            let scope = rule.scope();
            if rule.id.trim().is_empty() || by_scope.contains_key(&scope) {
                tracing::warn!(rule_id = %rule.id, "Skipping rule with duplicate or empty id");
                continue;
            }

            let Some((host, path)) = compile_pattern(&rule.pattern) else {
                tracing::warn!(
                    rule_id = %rule.id,
                    pattern = %rule.pattern,
                    "Skipping rule with unparseable pattern"
                );
                continue;
            };

            if !seen_keys.insert((host.clone(), path.clone())) {
                tracing::warn!(
                    rule_id = %rule.id,
                    pattern = %rule.pattern,
                    "Skipping rule shadowed by an earlier rule with the same key"
                );
                continue;
            }

            index.entry(host).or_default().push(CompiledRule {
                scope: scope.clone(),
                path,
            });
            by_scope.insert(scope, rule.clone());
        }

        tracing::debug!(
            rules = by_scope.len(),
            skipped = rules.len() - by_scope.len(),
            "Rebuilt scope index"
        );

        self.index = index;
        self.rules = by_scope;
    }

    /// Scope governing `address`, or `None` if no rule matches or the
    /// address cannot be parsed.
    pub fn resolve(&self, address: &str) -> Option<ScopeId> {
        if self.index.is_empty() {
            return None;
        }

        let url = parse_address(address)?;
        let host = fold_suffix(&canonical_host(&url)?);
        let path = url.path().trim_end_matches('/');

        // Most specific host first, then parent labels
        for candidate in host_candidates(&host) {
            if let Some(rules) = self.index.get(&candidate) {
                if let Some(rule) = rules.iter().find(|r| r.matches_path(path)) {
                    return Some(rule.scope.clone());
                }
            }
        }

        None
    }

    pub fn rule(&self, scope: &ScopeId) -> Option<&Rule> {
        self.rules.get(scope)
    }

    pub fn contains(&self, scope: &ScopeId) -> bool {
        self.rules.contains_key(scope)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_pattern(pattern: &str) -> Option<(String, String)> {
    let pattern = pattern.trim();
    let pattern = pattern.strip_prefix("*.").unwrap_or(pattern);
    let url = parse_address(pattern)?;
    let host = fold_suffix(&canonical_host(&url)?);
    let path = url.path().trim_end_matches('/').to_string();
    Some((host, path))
}

/// `m.facebook:8080` -> [`m.facebook:8080`, `facebook:8080`]
fn host_candidates(host: &str) -> Vec<String> {
    if host.starts_with('[') {
        return vec![host.to_string()];
    }

    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };

    let parts: Vec<&str> = name.split('.').collect();
    (0..parts.len())
        .map(|i| {
            let parent = parts[i..].join(".");
            match port {
                Some(port) => format!("{}:{}", parent, port),
                None => parent,
            }
        })
        .collect()
}
