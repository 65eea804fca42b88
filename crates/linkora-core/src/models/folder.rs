//! Folder model

use serde::{Deserialize, Serialize};

use super::{LocalId, RemoteId};

/// A folder of links, optionally nested under another folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Local row id (0 until inserted)
    pub local_id: LocalId,
    /// Server id once the folder is known to the server
    pub remote_id: Option<RemoteId>,
    pub name: String,
    pub note: String,
    /// Local id of the parent folder; `None` for root folders
    pub parent_folder_id: Option<LocalId>,
    pub is_archived: bool,
    /// Last modification (Unix seconds)
    pub last_modified: i64,
}

impl Folder {
    /// Create an unsaved root folder with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            local_id: 0,
            remote_id: None,
            name: name.into(),
            note: String::new(),
            parent_folder_id: None,
            is_archived: false,
            last_modified: crate::util::unix_timestamp_now(),
        }
    }

    #[must_use]
    pub const fn with_parent(mut self, parent: Option<LocalId>) -> Self {
        self.parent_folder_id = parent;
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Root folders have no parent
    pub const fn is_root(&self) -> bool {
        self.parent_folder_id.is_none()
    }
}
