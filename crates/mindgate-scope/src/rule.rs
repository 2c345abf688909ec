//! Rule and scope identity

use serde::{Deserialize, Serialize};

/// A configured destination rule, loaded read-only from the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub pattern: String,
    pub phrase: String,
}

impl Rule {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            phrase: phrase.into(),
        }
    }

    pub fn scope(&self) -> ScopeId {
        ScopeId::from_rule_id(&self.id)
    }
}

/// Scope identity is the governing rule's id, so editing a rule's pattern
/// keeps every tab already bound to it in the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn from_rule_id(rule_id: &str) -> Self {
        Self(rule_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ScopeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Scope id cannot be empty".to_string());
        }
        Ok(Self(s.to_string()))
    }
}
