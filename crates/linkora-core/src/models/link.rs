//! Link model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{LocalId, RemoteId};

/// Logical container of a link.
///
/// Only `FolderLink` uses `Link::id_of_linked_folder`; every other type
/// implies its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    #[default]
    SavedLink,
    ImportantLink,
    ArchiveLink,
    HistoryLink,
    FolderLink,
}

impl LinkType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SavedLink => "SAVED_LINK",
            Self::ImportantLink => "IMPORTANT_LINK",
            Self::ArchiveLink => "ARCHIVE_LINK",
            Self::HistoryLink => "HISTORY_LINK",
            Self::FolderLink => "FOLDER_LINK",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAVED_LINK" => Ok(Self::SavedLink),
            "IMPORTANT_LINK" => Ok(Self::ImportantLink),
            "ARCHIVE_LINK" => Ok(Self::ArchiveLink),
            "HISTORY_LINK" => Ok(Self::HistoryLink),
            "FOLDER_LINK" => Ok(Self::FolderLink),
            other => Err(format!("unknown link type: {other}")),
        }
    }
}

/// Preview media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMAGE" => Ok(Self::Image),
            "VIDEO" => Ok(Self::Video),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// A saved link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Local row id (0 until inserted)
    pub local_id: LocalId,
    pub remote_id: Option<RemoteId>,
    pub link_type: LinkType,
    pub title: String,
    pub url: String,
    pub img_url: String,
    pub note: String,
    /// Local id of the containing folder when `link_type` is `FolderLink`
    pub id_of_linked_folder: Option<LocalId>,
    pub user_agent: Option<String>,
    pub marked_as_important: bool,
    pub media_type: MediaType,
    /// Last modification (Unix seconds)
    pub last_modified: i64,
}

impl Link {
    /// Create an unsaved link of the given type
    #[must_use]
    pub fn new(link_type: LinkType, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            local_id: 0,
            remote_id: None,
            link_type,
            title: title.into(),
            url: url.into(),
            img_url: String::new(),
            note: String::new(),
            id_of_linked_folder: None,
            user_agent: None,
            marked_as_important: false,
            media_type: MediaType::Image,
            last_modified: crate::util::unix_timestamp_now(),
        }
    }

    /// Create an unsaved link stored inside a folder
    #[must_use]
    pub fn in_folder(folder: LocalId, title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut link = Self::new(LinkType::FolderLink, title, url);
        link.id_of_linked_folder = Some(folder);
        link
    }

    /// Folder reference, ignored unless this is a folder link
    pub const fn linked_folder(&self) -> Option<LocalId> {
        match self.link_type {
            LinkType::FolderLink => self.id_of_linked_folder,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_type_wire_names_roundtrip() {
        for link_type in [
            LinkType::SavedLink,
            LinkType::ImportantLink,
            LinkType::ArchiveLink,
            LinkType::HistoryLink,
            LinkType::FolderLink,
        ] {
            let json = serde_json::to_string(&link_type).unwrap();
            assert_eq!(json, format!("\"{}\"", link_type.as_str()));
            assert_eq!(link_type.as_str().parse::<LinkType>().unwrap(), link_type);
        }
    }

    #[test]
    fn unknown_link_type_is_rejected() {
        assert!("BOOKMARK".parse::<LinkType>().is_err());
        assert!("AUDIO".parse::<MediaType>().is_err());
    }

    #[test]
    fn linked_folder_only_for_folder_links() {
        let link = Link::in_folder(3, "Rust", "https://rust-lang.org");
        assert_eq!(link.linked_folder(), Some(3));

        let mut saved = Link::new(LinkType::SavedLink, "Rust", "https://rust-lang.org");
        saved.id_of_linked_folder = Some(3);
        assert_eq!(saved.linked_folder(), None);
    }
}
