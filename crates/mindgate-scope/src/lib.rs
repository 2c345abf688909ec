//! Mindgate Scope Resolution
//!
//! Maps a destination address to the configured rule that governs it.
//! Addresses are compared on a canonical key: scheme and a leading `www.`
//! are dropped, and regional suffix variants of one name (`facebook.com`,
//! `facebook.se`, `facebook.co.uk`) fold together.

mod normalize;
mod resolver;
mod rule;

pub use normalize::{canonical_host, fold_suffix, normalize, parse_address};
pub use resolver::ScopeResolver;
pub use rule::{Rule, ScopeId};
