//! Mindgate Inactivity Monitor
//!
//! Asks for re-confirmation when a scope has gone unused for longer than the
//! configured timeout. Two sources feed the same check:
//! - focus changes into a scope (no minimum granularity)
//! - the host's idle signal returning to active (coarse, at least 15 s)
//!
//! In `all-except-audio` mode a scope with an audible, unmuted tab is exempt.

mod audio;
mod monitor;
mod policy;

pub use audio::AudibleTab;
pub use monitor::{IdleState, InactivityMonitor, Verdict};
pub use policy::{InactivityMode, InactivityPolicy, MIN_IDLE_INTERVAL_SECS};
