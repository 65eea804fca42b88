//! Inbound change events.
//!
//! Live frames and tombstones share the `{operation, payload}` envelope and
//! decode into the same closed [`SyncEvent`] sum type, so dispatch in the
//! reconciler is exhaustive.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::dto::{
    Envelope, FolderDto, IdBasedDto, LinkDto, MoveFoldersDto, PanelDto, PanelFolderDto,
    RemoveFolderFromPanelDto, RenameDto, UpdateNoteDto,
};
use crate::error::Result;
use crate::models::Correlation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum SyncEvent {
    #[serde(rename = "CREATE_FOLDER")]
    CreateFolder(FolderDto),
    #[serde(rename = "UPDATE_FOLDER")]
    UpdateFolder(FolderDto),
    #[serde(rename = "DELETE_FOLDER")]
    DeleteFolder(IdBasedDto),
    #[serde(rename = "MARK_FOLDER_AS_ARCHIVE")]
    MarkFolderAsArchive(IdBasedDto),
    #[serde(rename = "MARK_AS_REGULAR_FOLDER")]
    MarkAsRegularFolder(IdBasedDto),
    #[serde(rename = "RENAME_FOLDER")]
    RenameFolder(RenameDto),
    #[serde(rename = "UPDATE_FOLDER_NOTE")]
    UpdateFolderNote(UpdateNoteDto),
    #[serde(rename = "MOVE_FOLDERS")]
    MoveFolders(MoveFoldersDto),

    #[serde(rename = "CREATE_A_NEW_LINK")]
    CreateLink(LinkDto),
    #[serde(rename = "UPDATE_LINK")]
    UpdateLink(LinkDto),
    #[serde(rename = "DELETE_A_LINK")]
    DeleteLink(IdBasedDto),
    #[serde(rename = "ARCHIVE_LINK")]
    ArchiveLink(IdBasedDto),
    #[serde(rename = "UNARCHIVE_LINK")]
    UnarchiveLink(IdBasedDto),
    #[serde(rename = "MARK_AS_IMP")]
    MarkAsImportant(IdBasedDto),
    #[serde(rename = "UNMARK_AS_IMP")]
    UnmarkAsImportant(IdBasedDto),
    #[serde(rename = "UPDATE_LINK_TITLE")]
    UpdateLinkTitle(RenameDto),
    #[serde(rename = "UPDATE_LINK_NOTE")]
    UpdateLinkNote(UpdateNoteDto),

    #[serde(rename = "ADD_A_NEW_PANEL")]
    AddPanel(PanelDto),
    #[serde(rename = "UPDATE_A_PANEL_NAME")]
    RenamePanel(RenameDto),
    #[serde(rename = "DELETE_A_PANEL")]
    DeletePanel(IdBasedDto),
    #[serde(rename = "ADD_A_NEW_FOLDER_IN_A_PANEL")]
    AddFolderToPanel(PanelFolderDto),
    #[serde(rename = "DELETE_A_FOLDER_FROM_A_PANEL")]
    RemoveFolderFromPanel(RemoveFolderFromPanelDto),
    #[serde(rename = "DELETE_A_FOLDER_FROM_ALL_PANELS")]
    RemoveFolderFromAllPanels(IdBasedDto),
}

impl SyncEvent {
    /// Decode one text frame from the live channel.
    pub fn decode(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Decode an event whose operation and payload arrived separately, as
    /// tombstones do.
    pub fn from_parts(operation: &str, payload: Value) -> Result<Self> {
        Ok(serde_json::from_value(
            json!({ "operation": operation, "payload": payload }),
        )?)
    }

    /// Wire name of the operation
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::CreateFolder(_) => "CREATE_FOLDER",
            Self::UpdateFolder(_) => "UPDATE_FOLDER",
            Self::DeleteFolder(_) => "DELETE_FOLDER",
            Self::MarkFolderAsArchive(_) => "MARK_FOLDER_AS_ARCHIVE",
            Self::MarkAsRegularFolder(_) => "MARK_AS_REGULAR_FOLDER",
            Self::RenameFolder(_) => "RENAME_FOLDER",
            Self::UpdateFolderNote(_) => "UPDATE_FOLDER_NOTE",
            Self::MoveFolders(_) => "MOVE_FOLDERS",
            Self::CreateLink(_) => "CREATE_A_NEW_LINK",
            Self::UpdateLink(_) => "UPDATE_LINK",
            Self::DeleteLink(_) => "DELETE_A_LINK",
            Self::ArchiveLink(_) => "ARCHIVE_LINK",
            Self::UnarchiveLink(_) => "UNARCHIVE_LINK",
            Self::MarkAsImportant(_) => "MARK_AS_IMP",
            Self::UnmarkAsImportant(_) => "UNMARK_AS_IMP",
            Self::UpdateLinkTitle(_) => "UPDATE_LINK_TITLE",
            Self::UpdateLinkNote(_) => "UPDATE_LINK_NOTE",
            Self::AddPanel(_) => "ADD_A_NEW_PANEL",
            Self::RenamePanel(_) => "UPDATE_A_PANEL_NAME",
            Self::DeletePanel(_) => "DELETE_A_PANEL",
            Self::AddFolderToPanel(_) => "ADD_A_NEW_FOLDER_IN_A_PANEL",
            Self::RemoveFolderFromPanel(_) => "DELETE_A_FOLDER_FROM_A_PANEL",
            Self::RemoveFolderFromAllPanels(_) => "DELETE_A_FOLDER_FROM_ALL_PANELS",
        }
    }

    fn payload(&self) -> &dyn Envelope {
        match self {
            Self::CreateFolder(dto) | Self::UpdateFolder(dto) => dto,
            Self::CreateLink(dto) | Self::UpdateLink(dto) => dto,
            Self::DeleteFolder(dto)
            | Self::MarkFolderAsArchive(dto)
            | Self::MarkAsRegularFolder(dto)
            | Self::DeleteLink(dto)
            | Self::ArchiveLink(dto)
            | Self::UnarchiveLink(dto)
            | Self::MarkAsImportant(dto)
            | Self::UnmarkAsImportant(dto)
            | Self::DeletePanel(dto)
            | Self::RemoveFolderFromAllPanels(dto) => dto,
            Self::RenameFolder(dto) | Self::UpdateLinkTitle(dto) | Self::RenamePanel(dto) => dto,
            Self::UpdateFolderNote(dto) | Self::UpdateLinkNote(dto) => dto,
            Self::MoveFolders(dto) => dto,
            Self::AddPanel(dto) => dto,
            Self::AddFolderToPanel(dto) => dto,
            Self::RemoveFolderFromPanel(dto) => dto,
        }
    }

    /// Tag of the operation that caused this event, if it decoded
    pub fn correlation(&self) -> Option<&Correlation> {
        self.payload().correlation()
    }

    pub fn event_timestamp(&self) -> i64 {
        self.payload().event_timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_live_frame() {
        let event = SyncEvent::decode(
            r#"{
                "operation": "CREATE_FOLDER",
                "payload": {
                    "id": 42,
                    "name": "Dev",
                    "eventTimestamp": 1700000000,
                    "correlation": {"id": "op-1", "clientName": "phone"}
                }
            }"#,
        )
        .unwrap();

        let SyncEvent::CreateFolder(dto) = &event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(dto.id, 42);
        assert_eq!(event.operation(), "CREATE_FOLDER");
        assert_eq!(event.event_timestamp(), 1_700_000_000);
        assert_eq!(
            event.correlation().map(|c| c.client_name.as_str()),
            Some("phone")
        );
    }

    #[test]
    fn tombstone_parts_decode_like_live_events() {
        let event = SyncEvent::from_parts("DELETE_A_LINK", json!({"id": 9})).unwrap();
        assert_eq!(
            event,
            SyncEvent::DeleteLink(IdBasedDto {
                id: 9,
                event_timestamp: 0,
                correlation: None,
            })
        );
    }

    #[test]
    fn unknown_operation_is_an_error() {
        assert!(SyncEvent::from_parts("SHRED_EVERYTHING", json!({"id": 1})).is_err());
        assert!(SyncEvent::decode("not json").is_err());
    }

    #[test]
    fn operation_names_roundtrip() {
        let event = SyncEvent::RemoveFolderFromPanel(RemoveFolderFromPanelDto {
            panel_id: 1,
            folder_id: 2,
            event_timestamp: 3,
            correlation: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], event.operation());
        assert_eq!(json["payload"]["panelId"], 1);
    }
}
