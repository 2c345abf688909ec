//! Host interface
//!
//! Everything the gate needs from the browser. Calls are fire-and-forget
//! from the gate's point of view: failures are logged and dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mindgate_inactivity::AudibleTab;
use mindgate_tabs::{TabId, WindowId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Tab not found: {0}")]
    TabGone(TabId),

    #[error("Unsupported by host: {0}")]
    Unsupported(String),

    #[error("Host call failed: {0}")]
    Failed(String),
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// A tab as the host currently reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub tab_id: TabId,
    pub address: Option<String>,
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Navigate a tab to `address`
    async fn redirect(&self, tab_id: TabId, address: String) -> HostResult<()>;

    /// Tabs currently producing sound, muted or not
    async fn audible_tabs(&self) -> HostResult<Vec<AudibleTab>>;

    /// The window's active tab
    async fn active_tab(&self, window_id: WindowId) -> HostResult<Option<TabSnapshot>>;

    /// Set the idle detection interval. `Ok(false)` when the host has no idle
    /// signal.
    async fn set_idle_interval(&self, interval: std::time::Duration) -> HostResult<bool>;
}
