//! Mindgate Phrase Matching
//!
//! Decides whether what the user typed on the confirmation step reproduces
//! the rule's phrase. Comparison policy (fixed, it sets how much friction the
//! step adds):
//! - surrounding whitespace is ignored and inner whitespace runs count as one space
//! - case-insensitive
//! - distance counts characters, not bytes

mod matcher;

pub use matcher::{accepts, edit_distance, partially_accepts, MatchMode, PhraseMatcher};

/// Default bound on insertions, deletions and substitutions in fuzzy mode
pub const DEFAULT_MAX_DISTANCE: usize = 2;
