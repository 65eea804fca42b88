//! Dependency-ordered folder materialization.
//!
//! The server does not sort folders parent-first, and a live create can name a
//! parent this client has never seen. Before a folder is written, its chain of
//! unresolved ancestors is collected (from the current batch, or fetched from
//! the server) and written top-down.

use std::collections::{HashMap, HashSet};

use super::dto::FolderDto;
use super::routes;
use super::transport::Transport;
use crate::error::Result;
use crate::models::{Folder, LocalId, RemoteId};
use crate::services::{LocalStore, WriteOptions};
use crate::util::timestamp_or_now;

/// Folders of one pull, indexed by remote id.
pub type FolderBatch<'a> = HashMap<RemoteId, &'a FolderDto>;

/// Write `folder` and any missing ancestors, returning how many folders were
/// written.
///
/// `processed` accumulates the remote ids handled during one pass; a folder
/// already in it is not visited again, which also stops cyclic parent chains.
pub async fn materialize_folder<T: Transport>(
    store: &LocalStore,
    transport: &T,
    folder: &FolderDto,
    batch: &FolderBatch<'_>,
    processed: &mut HashSet<RemoteId>,
) -> Result<usize> {
    if processed.contains(&folder.id) {
        return Ok(0);
    }

    let chain = collect_chain(store, transport, folder, batch, processed).await?;

    let mut written = 0;
    for dto in chain.iter().rev() {
        if !processed.insert(dto.id) {
            continue;
        }

        let parent = match dto.parent_folder_id {
            None => None,
            Some(parent_id) => match store.folder_local_id(parent_id).await? {
                Some(local_id) => Some(local_id),
                None => {
                    tracing::debug!(
                        "Skipping folder {} because parent {parent_id} is unavailable",
                        dto.id
                    );
                    continue;
                }
            },
        };

        upsert_folder(store, dto, parent).await?;
        written += 1;
    }

    Ok(written)
}

/// Local id for a remote folder, materializing it from the server if needed.
pub async fn ensure_folder<T: Transport>(
    store: &LocalStore,
    transport: &T,
    remote_id: RemoteId,
) -> Result<Option<LocalId>> {
    if let Some(local_id) = store.folder_local_id(remote_id).await? {
        return Ok(Some(local_id));
    }

    let Some(dto) = fetch_folder(transport, remote_id).await? else {
        return Ok(None);
    };
    materialize_folder(store, transport, &dto, &FolderBatch::new(), &mut HashSet::new()).await?;
    store.folder_local_id(remote_id).await
}

/// `folder` followed by each unresolved ancestor, nearest first.
async fn collect_chain<T: Transport>(
    store: &LocalStore,
    transport: &T,
    folder: &FolderDto,
    batch: &FolderBatch<'_>,
    processed: &HashSet<RemoteId>,
) -> Result<Vec<FolderDto>> {
    let mut chain = vec![folder.clone()];
    let mut visiting = HashSet::from([folder.id]);

    while let Some(parent_id) = chain.last().and_then(|dto| dto.parent_folder_id) {
        if processed.contains(&parent_id) || store.folder_local_id(parent_id).await?.is_some() {
            break;
        }
        if !visiting.insert(parent_id) {
            tracing::warn!("Folder {} has a cyclic parent chain", folder.id);
            break;
        }

        let parent = match batch.get(&parent_id) {
            Some(dto) => Some((*dto).clone()),
            None => fetch_folder(transport, parent_id).await?,
        };
        match parent {
            Some(parent) => chain.push(parent),
            None => break,
        }
    }

    Ok(chain)
}

/// Fetch one folder by remote id; `None` when the server no longer has it.
async fn fetch_folder<T: Transport>(transport: &T, remote_id: RemoteId) -> Result<Option<FolderDto>> {
    match transport
        .get(routes::GET_FOLDER, &[("id", remote_id.to_string())])
        .await
    {
        Ok(value) => Ok(Some(serde_json::from_value(value)?)),
        Err(error) if error.is_not_found() => {
            tracing::debug!("Folder {remote_id} no longer exists on the server");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Insert the folder if no local row maps to its remote id, update otherwise.
async fn upsert_folder(
    store: &LocalStore,
    dto: &FolderDto,
    parent_folder_id: Option<LocalId>,
) -> Result<()> {
    let existing = store.folder_local_id(dto.id).await?;
    let folder = Folder {
        local_id: existing.unwrap_or_default(),
        remote_id: Some(dto.id),
        name: dto.name.clone(),
        note: dto.note.clone(),
        parent_folder_id,
        is_archived: dto.is_archived,
        last_modified: timestamp_or_now(dto.event_timestamp),
    };

    match existing {
        Some(_) => store.update_folder(&folder, WriteOptions::REMOTE).await,
        None => store
            .insert_folder(&folder, WriteOptions::REMOTE)
            .await
            .map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{folder_dto, FakeTransport};
    use pretty_assertions::assert_eq;

    async fn setup() -> (LocalStore, FakeTransport) {
        (LocalStore::open_in_memory().await.unwrap(), FakeTransport::new())
    }

    async fn parent_of(store: &LocalStore, remote_id: RemoteId) -> Option<LocalId> {
        let local_id = store.folder_local_id(remote_id).await.unwrap().unwrap();
        store
            .get_folder(local_id)
            .await
            .unwrap()
            .unwrap()
            .parent_folder_id
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn child_before_parent_in_batch() {
        let (store, transport) = setup().await;
        let child = folder_dto(2, "Rust", Some(1));
        let parent = folder_dto(1, "Dev", None);
        let folders = [child, parent];
        let batch: FolderBatch<'_> = folders.iter().map(|dto| (dto.id, dto)).collect();

        let mut processed = HashSet::new();
        let mut written = 0;
        for dto in &folders {
            written += materialize_folder(&store, &transport, dto, &batch, &mut processed)
                .await
                .unwrap();
        }

        assert_eq!(written, 2);
        let parent_local = store.folder_local_id(1).await.unwrap();
        assert!(parent_local.is_some());
        assert_eq!(parent_of(&store, 2).await, parent_local);
        assert!(transport.gets().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_ancestors_are_fetched() {
        let (store, transport) = setup().await;
        transport.serve_folder(folder_dto(1, "Root", None));
        transport.serve_folder(folder_dto(2, "Middle", Some(1)));

        let leaf = folder_dto(3, "Leaf", Some(2));
        let written = materialize_folder(
            &store,
            &transport,
            &leaf,
            &FolderBatch::new(),
            &mut HashSet::new(),
        )
        .await
        .unwrap();

        assert_eq!(written, 3);
        assert_eq!(parent_of(&store, 3).await, store.folder_local_id(2).await.unwrap());
        assert_eq!(parent_of(&store, 2).await, store.folder_local_id(1).await.unwrap());
        assert_eq!(parent_of(&store, 1).await, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vanished_parent_skips_child() {
        let (store, transport) = setup().await;

        let orphan = folder_dto(5, "Orphan", Some(404));
        let written = materialize_folder(
            &store,
            &transport,
            &orphan,
            &FolderBatch::new(),
            &mut HashSet::new(),
        )
        .await
        .unwrap();

        assert_eq!(written, 0);
        assert_eq!(store.folder_local_id(5).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cyclic_batch_terminates() {
        let (store, transport) = setup().await;
        let folders = [folder_dto(1, "A", Some(2)), folder_dto(2, "B", Some(1))];
        let batch: FolderBatch<'_> = folders.iter().map(|dto| (dto.id, dto)).collect();

        let mut processed = HashSet::new();
        for dto in &folders {
            materialize_folder(&store, &transport, dto, &batch, &mut processed)
                .await
                .unwrap();
        }

        assert_eq!(store.list_folders().await.unwrap().len(), 0);
        assert_eq!(processed.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ensure_folder_resolves_or_fetches() {
        let (store, transport) = setup().await;
        transport.serve_folder(folder_dto(8, "Fetched", None));

        let fetched = ensure_folder(&store, &transport, 8).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(ensure_folder(&store, &transport, 8).await.unwrap(), fetched);
        assert_eq!(transport.gets().len(), 1);
        assert_eq!(ensure_folder(&store, &transport, 9).await.unwrap(), None);
    }
}
