//! Pending (not yet acknowledged) local mutations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Correlation, LocalId, RemoteId};

/// Kinds of entity that carry a remote id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    Link,
    Panel,
    PanelFolder,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Link => "link",
            Self::Panel => "panel",
            Self::PanelFolder => "panel_folder",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(Self::Folder),
            "link" => Ok(Self::Link),
            "panel" => Ok(Self::Panel),
            "panel_folder" => Ok(Self::PanelFolder),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// A local change waiting to be forwarded to the server.
///
/// Creates and updates reference the local row; the request body is built
/// from the row's state at flush time. Deletes carry the remote id captured
/// before the row was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalMutation {
    CreateFolder { folder_id: LocalId },
    UpdateFolder { folder_id: LocalId },
    DeleteFolder { remote_id: RemoteId },
    CreateLink { link_id: LocalId },
    UpdateLink { link_id: LocalId },
    DeleteLink { remote_id: RemoteId },
    CreatePanel { panel_id: LocalId },
    RenamePanel { panel_id: LocalId },
    DeletePanel { remote_id: RemoteId },
    AddFolderToPanel { panel_folder_id: LocalId },
    RemoveFolderFromPanel {
        panel_remote_id: RemoteId,
        folder_remote_id: RemoteId,
    },
}

impl LocalMutation {
    /// Local row this mutation reads at flush time, if any
    pub const fn target(&self) -> Option<(EntityKind, LocalId)> {
        match *self {
            Self::CreateFolder { folder_id } | Self::UpdateFolder { folder_id } => {
                Some((EntityKind::Folder, folder_id))
            }
            Self::CreateLink { link_id } | Self::UpdateLink { link_id } => {
                Some((EntityKind::Link, link_id))
            }
            Self::CreatePanel { panel_id } | Self::RenamePanel { panel_id } => {
                Some((EntityKind::Panel, panel_id))
            }
            Self::AddFolderToPanel { panel_folder_id } => {
                Some((EntityKind::PanelFolder, panel_folder_id))
            }
            Self::DeleteFolder { .. }
            | Self::DeleteLink { .. }
            | Self::DeletePanel { .. }
            | Self::RemoveFolderFromPanel { .. } => None,
        }
    }

    /// Short name used in logs and the queue table
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateFolder { .. } => "create_folder",
            Self::UpdateFolder { .. } => "update_folder",
            Self::DeleteFolder { .. } => "delete_folder",
            Self::CreateLink { .. } => "create_link",
            Self::UpdateLink { .. } => "update_link",
            Self::DeleteLink { .. } => "delete_link",
            Self::CreatePanel { .. } => "create_panel",
            Self::RenamePanel { .. } => "rename_panel",
            Self::DeletePanel { .. } => "delete_panel",
            Self::AddFolderToPanel { .. } => "add_folder_to_panel",
            Self::RemoveFolderFromPanel { .. } => "remove_folder_from_panel",
        }
    }
}

/// A queued mutation as stored in the pending queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Queue position (monotonic)
    pub id: i64,
    pub mutation: LocalMutation,
    /// Tag stamped when the mutation was enqueued
    pub correlation: Correlation,
    /// Enqueue time (Unix seconds)
    pub created_at: i64,
}
