//! Mindgate Session-State Tracking
//!
//! Owns every piece of runtime state the gate needs: what each tab last
//! committed, which scope it is bound to, when it was last redirected, which
//! tab each window shows, and when each scope was last active.
//!
//! Nothing here is persisted. The host may restart the process between any
//! two events, so every operation works against an empty tracker and is safe
//! to repeat.

mod focus;
mod ids;
mod tab;
mod tracker;

pub use focus::{FocusChange, FocusOutcome};
pub use ids::{TabId, WindowId};
pub use tab::{ScopeActivity, TrackedTab, TrackedWindow};
pub use tracker::SessionTracker;
