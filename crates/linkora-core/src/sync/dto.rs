//! Wire DTOs exchanged with the sync server.
//!
//! Every inbound payload carries an `eventTimestamp` and an optional
//! `correlation`. A correlation that is missing or does not decode is read as
//! `None`, which the reconciler treats as a foreign event.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{Correlation, LinkType, MediaType, RemoteId};

/// Fields shared by every event payload.
pub trait Envelope {
    fn correlation(&self) -> Option<&Correlation>;

    /// Server time of the change (Unix seconds), 0 when absent
    fn event_timestamp(&self) -> i64;
}

macro_rules! impl_envelope {
    ($($dto:ty),+ $(,)?) => {
        $(
            impl Envelope for $dto {
                fn correlation(&self) -> Option<&Correlation> {
                    self.correlation.as_ref()
                }

                fn event_timestamp(&self) -> i64 {
                    self.event_timestamp
                }
            }
        )+
    };
}

fn lenient_correlation<'de, D>(deserializer: D) -> Result<Option<Correlation>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// Full folder state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDto {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub parent_folder_id: Option<RemoteId>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

/// Full link state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub id: RemoteId,
    pub link_type: LinkType,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default, rename = "imgURL")]
    pub img_url: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub id_of_linked_folder: Option<RemoteId>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub marked_as_important: bool,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

/// Payload naming a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdBasedDto {
    pub id: RemoteId,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameDto {
    pub id: RemoteId,
    pub new_name: String,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteDto {
    pub id: RemoteId,
    #[serde(default)]
    pub new_note: String,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

/// Reparent several folders; no parent means the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFoldersDto {
    pub folder_ids: Vec<RemoteId>,
    #[serde(default)]
    pub new_parent_folder_id: Option<RemoteId>,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDto {
    pub panel_id: RemoteId,
    pub panel_name: String,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

/// Folder shortcut inside a panel; all ids are remote ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelFolderDto {
    pub id: RemoteId,
    pub folder_id: RemoteId,
    #[serde(default)]
    pub panel_position: i64,
    #[serde(default)]
    pub folder_name: String,
    pub connected_panel_id: RemoteId,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFolderFromPanelDto {
    pub panel_id: RemoteId,
    pub folder_id: RemoteId,
    #[serde(default)]
    pub event_timestamp: i64,
    #[serde(
        default,
        deserialize_with = "lenient_correlation",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation: Option<Correlation>,
}

impl_envelope!(
    FolderDto,
    LinkDto,
    IdBasedDto,
    RenameDto,
    UpdateNoteDto,
    MoveFoldersDto,
    PanelDto,
    PanelFolderDto,
    RemoveFolderFromPanelDto,
);

// ---- outbound create bodies ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFolderDto {
    pub name: String,
    pub note: String,
    pub parent_folder_id: Option<RemoteId>,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLinkDto {
    pub link_type: LinkType,
    pub title: String,
    pub url: String,
    #[serde(rename = "imgURL")]
    pub img_url: String,
    pub note: String,
    pub id_of_linked_folder: Option<RemoteId>,
    pub user_agent: Option<String>,
    pub marked_as_important: bool,
    pub media_type: MediaType,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPanelDto {
    pub panel_name: String,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPanelFolderDto {
    pub folder_id: RemoteId,
    pub panel_position: i64,
    pub folder_name: String,
    pub connected_panel_id: RemoteId,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Answer to every create route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemResponseDto {
    pub id: RemoteId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub event_timestamp: Option<i64>,
}

// ---- pull responses ----

/// Everything created or changed after a watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesDto {
    #[serde(default)]
    pub folders: Vec<FolderDto>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
    #[serde(default)]
    pub panels: Vec<PanelDto>,
    #[serde(default)]
    pub panel_folders: Vec<PanelFolderDto>,
}

impl UpdatesDto {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
            && self.links.is_empty()
            && self.panels.is_empty()
            && self.panel_folders.is_empty()
    }

    /// Highest event timestamp in the batch, 0 when empty
    pub fn max_event_timestamp(&self) -> i64 {
        let folders = self.folders.iter().map(Envelope::event_timestamp);
        let links = self.links.iter().map(Envelope::event_timestamp);
        let panels = self.panels.iter().map(Envelope::event_timestamp);
        let panel_folders = self.panel_folders.iter().map(Envelope::event_timestamp);
        folders
            .chain(links)
            .chain(panels)
            .chain(panel_folders)
            .max()
            .unwrap_or(0)
    }
}

/// A deletion retained by the server for clients that were offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TombstoneDto {
    pub operation: String,
    pub payload: Value,
    #[serde(default)]
    pub deleted_at: i64,
}
