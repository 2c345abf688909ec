//! Mindgate Navigation Decisions
//!
//! Decides, for each main-frame navigation intent, whether the navigation
//! proceeds or is detoured to the confirmation step. Rules are evaluated in
//! order and the first that applies wins:
//!
//! 1. Same-scope continuation
//! 2. Confirmation-step escape (only with the completion marker)
//! 3. Scope carry-over from the window's active tab
//! 4. Default: redirect if the target is scoped, otherwise allow

mod confirmation;
mod decision;
mod engine;
mod error;
mod intent;

pub use confirmation::{
    has_completion_marker, mark_completed, strip_completion_marker, ConfirmationPage,
    ConfirmationRequest, COMPLETION_MARKER,
};
pub use decision::{AllowReason, Decision, IgnoreReason, Redirect};
pub use engine::{DecisionEngine, DecisionTiming};
pub use error::NavigationError;
pub use intent::{NavigationIntent, MAIN_FRAME};

pub type Result<T> = std::result::Result<T, NavigationError>;
