//! Navigation intents delivered by the host

use serde::{Deserialize, Serialize};

use mindgate_tabs::{TabId, WindowId};

/// Frame id the host uses for a tab's top-level document
pub const MAIN_FRAME: i64 = 0;

/// A frame is about to load a new address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationIntent {
    pub tab_id: TabId,
    pub window_id: Option<WindowId>,
    pub frame_id: i64,
    /// Address the frame is leaving, when the host knows it
    pub source: Option<String>,
    pub target: String,
}

impl NavigationIntent {
    /// Main-frame intent with no known source or window
    pub fn new(tab_id: TabId, target: impl Into<String>) -> Self {
        Self {
            tab_id,
            window_id: None,
            frame_id: MAIN_FRAME,
            source: None,
            target: target.into(),
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn in_window(mut self, window_id: WindowId) -> Self {
        self.window_id = Some(window_id);
        self
    }

    pub fn in_frame(mut self, frame_id: i64) -> Self {
        self.frame_id = frame_id;
        self
    }

    pub fn is_main_frame(&self) -> bool {
        self.frame_id == MAIN_FRAME
    }
}
