//! Mindgate Core
//!
//! Ties the scope resolver, session tracker, decision engine, inactivity
//! monitor and phrase matcher together behind one [`Gate`]. Host events go
//! in, redirects come out through the [`Host`] trait.

mod clock;
mod config;
mod error;
mod event;
mod gate;
mod host;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, GateSettings};
pub use error::CoreError;
pub use event::GateEvent;
pub use gate::Gate;
pub use host::{Host, HostError, HostResult, TabSnapshot};
pub use store::ConfigStore;

// Re-export core components
pub use mindgate_inactivity::{AudibleTab, IdleState, InactivityMode, InactivityPolicy};
pub use mindgate_navigation::{
    AllowReason, ConfirmationPage, ConfirmationRequest, Decision, IgnoreReason,
    NavigationIntent, Redirect, MAIN_FRAME,
};
pub use mindgate_phrase::{MatchMode, PhraseMatcher};
pub use mindgate_scope::{Rule, ScopeId, ScopeResolver};
pub use mindgate_storage::{Database, StorageError};
pub use mindgate_tabs::{SessionTracker, TabId, WindowId};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
