//! Panel and panel-folder models

use serde::{Deserialize, Serialize};

use super::{LocalId, RemoteId};

/// A named panel grouping shortcut folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub local_id: LocalId,
    pub remote_id: Option<RemoteId>,
    pub panel_name: String,
    /// Last modification (Unix seconds)
    pub last_modified: i64,
}

impl Panel {
    #[must_use]
    pub fn new(panel_name: impl Into<String>) -> Self {
        Self {
            local_id: 0,
            remote_id: None,
            panel_name: panel_name.into(),
            last_modified: crate::util::unix_timestamp_now(),
        }
    }
}

/// Membership of a folder in a panel.
///
/// Both `connected_panel_id` and `folder_id` are local ids and must resolve
/// before the row is inserted. A panel-folder is never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelFolder {
    pub local_id: LocalId,
    pub remote_id: Option<RemoteId>,
    pub connected_panel_id: LocalId,
    pub folder_id: LocalId,
    /// Denormalized copy of the folder's name
    pub folder_name: String,
    pub panel_position: i64,
}

impl PanelFolder {
    #[must_use]
    pub fn new(
        connected_panel_id: LocalId,
        folder_id: LocalId,
        folder_name: impl Into<String>,
        panel_position: i64,
    ) -> Self {
        Self {
            local_id: 0,
            remote_id: None,
            connected_panel_id,
            folder_id,
            folder_name: folder_name.into(),
            panel_position,
        }
    }
}
