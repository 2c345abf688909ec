//! Events delivered by the host

use serde::{Deserialize, Serialize};

use mindgate_inactivity::IdleState;
use mindgate_navigation::NavigationIntent;
use mindgate_tabs::{TabId, WindowId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    /// A frame is about to navigate
    BeforeNavigate(NavigationIntent),
    /// A navigation committed
    Committed {
        tab_id: TabId,
        frame_id: i64,
        address: String,
    },
    TabCreated {
        tab_id: TabId,
        window_id: Option<WindowId>,
    },
    TabRemoved {
        tab_id: TabId,
    },
    /// The host swapped one tab for another (prerender, discard restore)
    TabReplaced {
        removed_tab_id: TabId,
        added_tab_id: TabId,
    },
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    /// Audible or muted state changed; other tab updates carry neither
    TabUpdated {
        tab_id: TabId,
        audible: Option<bool>,
        muted: Option<bool>,
    },
    /// `None` when no browser window has focus
    WindowFocusChanged {
        window_id: Option<WindowId>,
    },
    WindowRemoved {
        window_id: WindowId,
    },
    IdleStateChanged {
        state: IdleState,
    },
    /// Rules or settings were edited
    ConfigChanged,
    /// Run the inactivity check for the focused tab now
    RecheckFocused,
}
