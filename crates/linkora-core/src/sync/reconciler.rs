//! Applies inbound change events to the local store.
//!
//! [`Reconciler::reconcile`] is the live path: it drops self-echoes before
//! dispatching. [`Reconciler::apply`] is the authoritative path used for
//! tombstones and backlog pulls, where server state wins regardless of who
//! caused it.
//!
//! Every write goes through the store with [`WriteOptions::REMOTE`], so nothing
//! applied here is queued back to the server.

use std::collections::HashSet;
use std::sync::Arc;

use super::dto::{FolderDto, LinkDto, PanelDto, PanelFolderDto};
use super::event::SyncEvent;
use super::materialize::{ensure_folder, materialize_folder, FolderBatch};
use super::transport::Transport;
use crate::error::Result;
use crate::models::{Folder, Link, LinkType, Panel, PanelFolder, RemoteId};
use crate::services::{LocalStore, WriteOptions};
use crate::util::timestamp_or_now;

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The store now reflects the event
    Applied,
    /// This client caused the event and already holds its effect
    Discarded,
    /// A referenced entity could not be resolved; nothing was written
    Skipped,
}

impl Outcome {
    const fn from_written(written: usize) -> Self {
        if written > 0 {
            Self::Applied
        } else {
            Self::Skipped
        }
    }
}

pub struct Reconciler<T: Transport> {
    store: LocalStore,
    transport: Arc<T>,
}

impl<T: Transport> Clone for Reconciler<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Reconciler<T> {
    pub const fn new(store: LocalStore, transport: Arc<T>) -> Self {
        Self { store, transport }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply a live event unless this client originated it.
    ///
    /// A missing or malformed correlation counts as foreign.
    pub async fn reconcile(&self, event: &SyncEvent) -> Result<Outcome> {
        if let Some(correlation) = event.correlation() {
            if self.store.identity().originated(correlation) {
                tracing::debug!(
                    "Discarding self-echo of {} ({})",
                    event.operation(),
                    correlation.id
                );
                return Ok(Outcome::Discarded);
            }
        }

        self.apply(event).await
    }

    /// Apply an event as server truth, without echo suppression.
    pub async fn apply(&self, event: &SyncEvent) -> Result<Outcome> {
        let outcome = self.dispatch(event).await?;
        if outcome == Outcome::Skipped {
            tracing::debug!(
                "Skipped {}: referenced entity is not available locally",
                event.operation()
            );
        }
        Ok(outcome)
    }

    async fn dispatch(&self, event: &SyncEvent) -> Result<Outcome> {
        let timestamp = event.event_timestamp();
        match event {
            SyncEvent::CreateFolder(dto) | SyncEvent::UpdateFolder(dto) => {
                self.upsert_folder(dto).await
            }
            SyncEvent::DeleteFolder(dto) => {
                let Some(local_id) = self.store.folder_local_id(dto.id).await? else {
                    return Ok(Outcome::Skipped);
                };
                self.store
                    .delete_folder(local_id, WriteOptions::REMOTE)
                    .await?;
                Ok(Outcome::Applied)
            }
            SyncEvent::MarkFolderAsArchive(dto) => {
                self.edit_folder(dto.id, timestamp, |folder| folder.is_archived = true)
                    .await
            }
            SyncEvent::MarkAsRegularFolder(dto) => {
                self.edit_folder(dto.id, timestamp, |folder| folder.is_archived = false)
                    .await
            }
            SyncEvent::RenameFolder(dto) => {
                let name = dto.new_name.clone();
                self.edit_folder(dto.id, timestamp, |folder| folder.name = name)
                    .await
            }
            SyncEvent::UpdateFolderNote(dto) => {
                let note = dto.new_note.clone();
                self.edit_folder(dto.id, timestamp, |folder| folder.note = note)
                    .await
            }
            SyncEvent::MoveFolders(dto) => {
                self.move_folders(&dto.folder_ids, dto.new_parent_folder_id, timestamp)
                    .await
            }

            SyncEvent::CreateLink(dto) | SyncEvent::UpdateLink(dto) => self.upsert_link(dto).await,
            SyncEvent::DeleteLink(dto) => {
                let Some(local_id) = self.store.link_local_id(dto.id).await? else {
                    return Ok(Outcome::Skipped);
                };
                self.store.delete_link(local_id, WriteOptions::REMOTE).await?;
                Ok(Outcome::Applied)
            }
            SyncEvent::ArchiveLink(dto) => {
                self.edit_link(dto.id, timestamp, |link| {
                    link.link_type = LinkType::ArchiveLink;
                })
                .await
            }
            SyncEvent::UnarchiveLink(dto) => {
                self.edit_link(dto.id, timestamp, |link| {
                    link.link_type = LinkType::SavedLink;
                })
                .await
            }
            SyncEvent::MarkAsImportant(dto) => {
                self.edit_link(dto.id, timestamp, |link| link.marked_as_important = true)
                    .await
            }
            SyncEvent::UnmarkAsImportant(dto) => {
                self.edit_link(dto.id, timestamp, |link| link.marked_as_important = false)
                    .await
            }
            SyncEvent::UpdateLinkTitle(dto) => {
                let title = dto.new_name.clone();
                self.edit_link(dto.id, timestamp, |link| link.title = title)
                    .await
            }
            SyncEvent::UpdateLinkNote(dto) => {
                let note = dto.new_note.clone();
                self.edit_link(dto.id, timestamp, |link| link.note = note)
                    .await
            }

            SyncEvent::AddPanel(dto) => self.upsert_panel(dto).await,
            SyncEvent::RenamePanel(dto) => {
                let Some(local_id) = self.store.panel_local_id(dto.id).await? else {
                    return Ok(Outcome::Skipped);
                };
                let Some(mut panel) = self.store.get_panel(local_id).await? else {
                    return Ok(Outcome::Skipped);
                };
                panel.panel_name.clone_from(&dto.new_name);
                panel.last_modified = timestamp_or_now(timestamp);
                self.store
                    .update_panel(&panel, WriteOptions::REMOTE)
                    .await?;
                Ok(Outcome::Applied)
            }
            SyncEvent::DeletePanel(dto) => {
                let Some(local_id) = self.store.panel_local_id(dto.id).await? else {
                    return Ok(Outcome::Skipped);
                };
                self.store
                    .delete_panel(local_id, WriteOptions::REMOTE)
                    .await?;
                Ok(Outcome::Applied)
            }
            SyncEvent::AddFolderToPanel(dto) => self.add_panel_folder(dto).await,
            SyncEvent::RemoveFolderFromPanel(dto) => {
                let panel = self.store.panel_local_id(dto.panel_id).await?;
                let folder = self.store.folder_local_id(dto.folder_id).await?;
                let (Some(panel), Some(folder)) = (panel, folder) else {
                    return Ok(Outcome::Skipped);
                };
                let removed = self
                    .store
                    .remove_folder_from_panel(panel, folder, WriteOptions::REMOTE)
                    .await?;
                Ok(Outcome::from_written(usize::from(removed > 0)))
            }
            SyncEvent::RemoveFolderFromAllPanels(dto) => {
                let Some(folder) = self.store.folder_local_id(dto.id).await? else {
                    return Ok(Outcome::Skipped);
                };
                self.store.remove_folder_from_all_panels(folder).await?;
                Ok(Outcome::Applied)
            }
        }
    }

    async fn upsert_folder(&self, dto: &FolderDto) -> Result<Outcome> {
        let written = materialize_folder(
            &self.store,
            self.transport(),
            dto,
            &FolderBatch::new(),
            &mut HashSet::new(),
        )
        .await?;
        Ok(Outcome::from_written(written))
    }

    async fn edit_folder(
        &self,
        remote_id: RemoteId,
        timestamp: i64,
        edit: impl FnOnce(&mut Folder),
    ) -> Result<Outcome> {
        let Some(local_id) = self.store.folder_local_id(remote_id).await? else {
            return Ok(Outcome::Skipped);
        };
        let Some(mut folder) = self.store.get_folder(local_id).await? else {
            return Ok(Outcome::Skipped);
        };

        edit(&mut folder);
        folder.last_modified = timestamp_or_now(timestamp);
        self.store
            .update_folder(&folder, WriteOptions::REMOTE)
            .await?;
        Ok(Outcome::Applied)
    }

    async fn move_folders(
        &self,
        folder_ids: &[RemoteId],
        new_parent: Option<RemoteId>,
        timestamp: i64,
    ) -> Result<Outcome> {
        let parent = match new_parent {
            None => None,
            Some(remote_id) => {
                match ensure_folder(&self.store, self.transport(), remote_id).await? {
                    Some(local_id) => Some(local_id),
                    None => return Ok(Outcome::Skipped),
                }
            }
        };

        let mut moved = 0;
        for &folder_id in folder_ids {
            if Some(folder_id) == new_parent {
                continue;
            }
            let outcome = self
                .edit_folder(folder_id, timestamp, |folder| {
                    folder.parent_folder_id = parent;
                })
                .await?;
            if outcome == Outcome::Applied {
                moved += 1;
            }
        }
        Ok(Outcome::from_written(moved))
    }

    /// Insert or overwrite a link from its full server state.
    pub(crate) async fn upsert_link(&self, dto: &LinkDto) -> Result<Outcome> {
        let id_of_linked_folder = match (dto.link_type, dto.id_of_linked_folder) {
            (LinkType::FolderLink, Some(folder_id)) => {
                match ensure_folder(&self.store, self.transport(), folder_id).await? {
                    Some(local_id) => Some(local_id),
                    None => return Ok(Outcome::Skipped),
                }
            }
            (LinkType::FolderLink, None) => return Ok(Outcome::Skipped),
            _ => None,
        };

        let existing = self.store.link_local_id(dto.id).await?;
        let link = Link {
            local_id: existing.unwrap_or_default(),
            remote_id: Some(dto.id),
            link_type: dto.link_type,
            title: dto.title.clone(),
            url: dto.url.clone(),
            img_url: dto.img_url.clone(),
            note: dto.note.clone(),
            id_of_linked_folder,
            user_agent: dto.user_agent.clone(),
            marked_as_important: dto.marked_as_important,
            media_type: dto.media_type,
            last_modified: timestamp_or_now(dto.event_timestamp),
        };

        match existing {
            Some(_) => self.store.update_link(&link, WriteOptions::REMOTE).await?,
            None => {
                self.store
                    .insert_link(&link, WriteOptions::REMOTE)
                    .await?;
            }
        }
        Ok(Outcome::Applied)
    }

    async fn edit_link(
        &self,
        remote_id: RemoteId,
        timestamp: i64,
        edit: impl FnOnce(&mut Link),
    ) -> Result<Outcome> {
        let Some(local_id) = self.store.link_local_id(remote_id).await? else {
            return Ok(Outcome::Skipped);
        };
        let Some(mut link) = self.store.get_link(local_id).await? else {
            return Ok(Outcome::Skipped);
        };

        edit(&mut link);
        link.last_modified = timestamp_or_now(timestamp);
        self.store.update_link(&link, WriteOptions::REMOTE).await?;
        Ok(Outcome::Applied)
    }

    /// Insert or rename a panel from its server state.
    pub(crate) async fn upsert_panel(&self, dto: &PanelDto) -> Result<Outcome> {
        let existing = self.store.panel_local_id(dto.panel_id).await?;
        let panel = Panel {
            local_id: existing.unwrap_or_default(),
            remote_id: Some(dto.panel_id),
            panel_name: dto.panel_name.clone(),
            last_modified: timestamp_or_now(dto.event_timestamp),
        };

        match existing {
            Some(_) => {
                self.store
                    .update_panel(&panel, WriteOptions::REMOTE)
                    .await?;
            }
            None => {
                self.store
                    .insert_panel(&panel, WriteOptions::REMOTE)
                    .await?;
            }
        }
        Ok(Outcome::Applied)
    }

    /// Insert a panel membership once both its panel and folder resolve.
    pub(crate) async fn add_panel_folder(&self, dto: &PanelFolderDto) -> Result<Outcome> {
        if self.store.panel_folder_local_id(dto.id).await?.is_some() {
            return Ok(Outcome::Applied);
        }

        let Some(panel) = self.store.panel_local_id(dto.connected_panel_id).await? else {
            return Ok(Outcome::Skipped);
        };
        let Some(folder) = ensure_folder(&self.store, self.transport(), dto.folder_id).await?
        else {
            return Ok(Outcome::Skipped);
        };

        let mut panel_folder =
            PanelFolder::new(panel, folder, dto.folder_name.clone(), dto.panel_position);
        panel_folder.remote_id = Some(dto.id);
        self.store
            .insert_panel_folder(&panel_folder, WriteOptions::REMOTE)
            .await?;
        Ok(Outcome::Applied)
    }
}
