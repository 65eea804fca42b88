//! Outbound flush of the pending queue.
//!
//! Items are sent strictly in enqueue order. Request bodies are built from the
//! row's current state, so several queued updates to one row all carry the
//! latest values. A transport failure stops the flush and keeps the failed
//! item and everything after it.

use serde::Serialize;
use serde_json::Value;

use super::dto::{
    FolderDto, IdBasedDto, LinkDto, NewFolderDto, NewItemResponseDto, NewLinkDto, NewPanelDto,
    NewPanelFolderDto, RemoveFolderFromPanelDto, RenameDto,
};
use super::routes;
use super::transport::Transport;
use crate::error::{Error, Result};
use crate::models::{EntityKind, LocalId, LocalMutation, PendingOperation, RemoteId};
use crate::services::LocalStore;

/// One HTTP call derived from a pending item.
#[derive(Debug)]
struct OutboundRequest {
    route: &'static str,
    body: Value,
    /// Row that receives the id from a create response
    assigns: Option<(EntityKind, LocalId)>,
}

impl OutboundRequest {
    fn new(route: &'static str, body: &impl Serialize) -> Result<Self> {
        Ok(Self {
            route,
            body: serde_json::to_value(body)?,
            assigns: None,
        })
    }

    const fn assigning(mut self, kind: EntityKind, local_id: LocalId) -> Self {
        self.assigns = Some((kind, local_id));
        self
    }
}

enum Prepared {
    Send(OutboundRequest),
    /// The row is gone or already synced; the item has nothing left to say
    Obsolete,
}

/// Send every pending item to the server, returning how many were removed.
pub async fn flush<T: Transport>(store: &LocalStore, transport: &T) -> Result<usize> {
    let pending = store.pending_operations().await?;
    if pending.is_empty() {
        return Ok(0);
    }
    tracing::info!("Flushing {} pending operations", pending.len());

    let mut flushed = 0;
    for operation in &pending {
        match prepare(store, operation).await? {
            Prepared::Obsolete => {
                tracing::debug!(
                    "Dropping obsolete {} at position {}",
                    operation.mutation.name(),
                    operation.id
                );
            }
            Prepared::Send(request) => {
                let response = transport.post(request.route, &request.body).await?;
                if let Some((kind, local_id)) = request.assigns {
                    record_remote_id(store, kind, local_id, response).await?;
                }
                tracing::debug!(
                    "Sent {} at position {}",
                    operation.mutation.name(),
                    operation.id
                );
            }
        }

        store.remove_pending(operation.id).await?;
        flushed += 1;
    }
    Ok(flushed)
}

async fn record_remote_id(
    store: &LocalStore,
    kind: EntityKind,
    local_id: LocalId,
    response: Value,
) -> Result<()> {
    let response: NewItemResponseDto = serde_json::from_value(response)?;
    match store.assign_remote_id(kind, local_id, response.id).await {
        Ok(()) => Ok(()),
        // deleted locally while the create was in flight
        Err(error) if error.is_not_found() => {
            tracing::debug!("{kind} {local_id} vanished before its id {} arrived", response.id);
            Ok(())
        }
        Err(error) => Err(error),
    }
}

async fn prepare(store: &LocalStore, operation: &PendingOperation) -> Result<Prepared> {
    let correlation = operation.correlation.clone();

    let request = match operation.mutation {
        LocalMutation::CreateFolder { folder_id } => {
            let Some(folder) = store.get_folder(folder_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            if folder.remote_id.is_some() {
                return Ok(Prepared::Obsolete);
            }
            let parent_folder_id = resolve(store, EntityKind::Folder, folder.parent_folder_id).await?;
            OutboundRequest::new(
                routes::CREATE_FOLDER,
                &NewFolderDto {
                    name: folder.name,
                    note: folder.note,
                    parent_folder_id,
                    is_archived: folder.is_archived,
                    event_timestamp: folder.last_modified,
                    correlation,
                },
            )?
            .assigning(EntityKind::Folder, folder_id)
        }
        LocalMutation::UpdateFolder { folder_id } => {
            let Some(folder) = store.get_folder(folder_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            let id = require(EntityKind::Folder, folder_id, folder.remote_id)?;
            let parent_folder_id = resolve(store, EntityKind::Folder, folder.parent_folder_id).await?;
            OutboundRequest::new(
                routes::UPDATE_FOLDER,
                &FolderDto {
                    id,
                    name: folder.name,
                    note: folder.note,
                    parent_folder_id,
                    is_archived: folder.is_archived,
                    event_timestamp: folder.last_modified,
                    correlation: Some(correlation),
                },
            )?
        }
        LocalMutation::DeleteFolder { remote_id } => OutboundRequest::new(
            routes::DELETE_FOLDER,
            &deletion(remote_id, operation),
        )?,

        LocalMutation::CreateLink { link_id } => {
            let Some(link) = store.get_link(link_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            if link.remote_id.is_some() {
                return Ok(Prepared::Obsolete);
            }
            let id_of_linked_folder = resolve(store, EntityKind::Folder, link.linked_folder()).await?;
            OutboundRequest::new(
                routes::CREATE_LINK,
                &NewLinkDto {
                    link_type: link.link_type,
                    title: link.title,
                    url: link.url,
                    img_url: link.img_url,
                    note: link.note,
                    id_of_linked_folder,
                    user_agent: link.user_agent,
                    marked_as_important: link.marked_as_important,
                    media_type: link.media_type,
                    event_timestamp: link.last_modified,
                    correlation,
                },
            )?
            .assigning(EntityKind::Link, link_id)
        }
        LocalMutation::UpdateLink { link_id } => {
            let Some(link) = store.get_link(link_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            let id = require(EntityKind::Link, link_id, link.remote_id)?;
            let id_of_linked_folder = resolve(store, EntityKind::Folder, link.linked_folder()).await?;
            OutboundRequest::new(
                routes::UPDATE_LINK,
                &LinkDto {
                    id,
                    link_type: link.link_type,
                    title: link.title,
                    url: link.url,
                    img_url: link.img_url,
                    note: link.note,
                    id_of_linked_folder,
                    user_agent: link.user_agent,
                    marked_as_important: link.marked_as_important,
                    media_type: link.media_type,
                    event_timestamp: link.last_modified,
                    correlation: Some(correlation),
                },
            )?
        }
        LocalMutation::DeleteLink { remote_id } => {
            OutboundRequest::new(routes::DELETE_LINK, &deletion(remote_id, operation))?
        }

        LocalMutation::CreatePanel { panel_id } => {
            let Some(panel) = store.get_panel(panel_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            if panel.remote_id.is_some() {
                return Ok(Prepared::Obsolete);
            }
            OutboundRequest::new(
                routes::CREATE_PANEL,
                &NewPanelDto {
                    panel_name: panel.panel_name,
                    event_timestamp: panel.last_modified,
                    correlation,
                },
            )?
            .assigning(EntityKind::Panel, panel_id)
        }
        LocalMutation::RenamePanel { panel_id } => {
            let Some(panel) = store.get_panel(panel_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            let id = require(EntityKind::Panel, panel_id, panel.remote_id)?;
            OutboundRequest::new(
                routes::RENAME_PANEL,
                &RenameDto {
                    id,
                    new_name: panel.panel_name,
                    event_timestamp: panel.last_modified,
                    correlation: Some(correlation),
                },
            )?
        }
        LocalMutation::DeletePanel { remote_id } => {
            OutboundRequest::new(routes::DELETE_PANEL, &deletion(remote_id, operation))?
        }

        LocalMutation::AddFolderToPanel { panel_folder_id } => {
            let Some(panel_folder) = store.get_panel_folder(panel_folder_id).await? else {
                return Ok(Prepared::Obsolete);
            };
            if panel_folder.remote_id.is_some() {
                return Ok(Prepared::Obsolete);
            }
            let connected_panel_id = store
                .remote_id(EntityKind::Panel, panel_folder.connected_panel_id)
                .await?;
            let connected_panel_id = require(
                EntityKind::Panel,
                panel_folder.connected_panel_id,
                connected_panel_id,
            )?;
            let folder_id = store
                .remote_id(EntityKind::Folder, panel_folder.folder_id)
                .await?;
            let folder_id = require(EntityKind::Folder, panel_folder.folder_id, folder_id)?;
            OutboundRequest::new(
                routes::ADD_FOLDER_TO_PANEL,
                &NewPanelFolderDto {
                    folder_id,
                    panel_position: panel_folder.panel_position,
                    folder_name: panel_folder.folder_name,
                    connected_panel_id,
                    event_timestamp: operation.created_at,
                    correlation,
                },
            )?
            .assigning(EntityKind::PanelFolder, panel_folder_id)
        }
        LocalMutation::RemoveFolderFromPanel {
            panel_remote_id,
            folder_remote_id,
        } => OutboundRequest::new(
            routes::REMOVE_FOLDER_FROM_PANEL,
            &RemoveFolderFromPanelDto {
                panel_id: panel_remote_id,
                folder_id: folder_remote_id,
                event_timestamp: operation.created_at,
                correlation: Some(correlation),
            },
        )?,
    };

    Ok(Prepared::Send(request))
}

fn deletion(remote_id: RemoteId, operation: &PendingOperation) -> IdBasedDto {
    IdBasedDto {
        id: remote_id,
        event_timestamp: operation.created_at,
        correlation: Some(operation.correlation.clone()),
    }
}

/// Remote id of an optional local reference.
async fn resolve(
    store: &LocalStore,
    kind: EntityKind,
    local_id: Option<LocalId>,
) -> Result<Option<RemoteId>> {
    let Some(local_id) = local_id else {
        return Ok(None);
    };
    let remote_id = store.remote_id(kind, local_id).await?;
    require(kind, local_id, remote_id).map(Some)
}

fn require(kind: EntityKind, local_id: LocalId, remote_id: Option<RemoteId>) -> Result<RemoteId> {
    remote_id.ok_or_else(|| {
        Error::UnresolvedReference(format!("{kind} {local_id} has no server id yet"))
    })
}
