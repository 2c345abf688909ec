//! Audible tab snapshots

use serde::{Deserialize, Serialize};

use mindgate_tabs::TabId;

/// A tab the host reports as currently producing sound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudibleTab {
    pub tab_id: TabId,
    /// Address the host reports for the tab, if any
    pub address: Option<String>,
    pub muted: bool,
}

impl AudibleTab {
    pub fn new(tab_id: TabId, address: impl Into<String>) -> Self {
        Self {
            tab_id,
            address: Some(address.into()),
            muted: false,
        }
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }
}
