//! Shared local store used by the reconciler, the outbound flush and clients.
//!
//! Every write takes [`WriteOptions`]. Writes with `via_socket = false` are
//! user changes: they land locally and are queued for the server in the same
//! step. Writes with `via_socket = true` come from the server and are never
//! queued again.

use std::path::PathBuf;
use std::sync::Arc;

use libsql::Connection;
use serde::Serialize;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify};

use crate::db::{
    begin_transaction, finish_transaction, Database, FolderRepository, LibSqlFolderRepository,
    LibSqlLinkRepository, LibSqlPanelRepository, LibSqlPendingRepository,
    LibSqlPreferencesRepository, LinkRepository, PanelRepository, PendingRepository,
    PreferencesRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    ClientIdentity, EntityKind, Folder, Link, LinkType, LocalId, LocalMutation, Panel,
    PanelFolder, PendingOperation, RemoteId,
};
use crate::util::{normalize_text_option, unix_timestamp_now};

/// How a write reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Treat an insert for an already-mapped remote id as a no-op
    pub ignore_duplicate: bool,
    /// The change came from the server and must not be queued
    pub via_socket: bool,
}

impl WriteOptions {
    /// A user change made on this device
    pub const LOCAL: Self = Self {
        ignore_duplicate: false,
        via_socket: false,
    };

    /// A change applied from the server
    pub const REMOTE: Self = Self {
        ignore_duplicate: true,
        via_socket: true,
    };
}

/// Row counts shown by status commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreSummary {
    pub folders: usize,
    pub links: usize,
    pub panels: usize,
    pub panel_folders: usize,
    pub pending: usize,
}

/// Thread-safe handle to the local database and this client's identity.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    identity: ClientIdentity,
    db_path: Option<PathBuf>,
    queued: Arc<Notify>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        let identity = Self::load_identity(&db).await?;
        tracing::info!("Opened local store at {}", db_path.display());

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            identity,
            db_path: Some(db_path),
            queued: Arc::new(Notify::new()),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        let identity = Self::load_identity(&db).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            identity,
            db_path: None,
            queued: Arc::new(Notify::new()),
        })
    }

    async fn load_identity(db: &Database) -> Result<ClientIdentity> {
        let preferences = LibSqlPreferencesRepository::new(db.connection());
        if let Some(client_name) = preferences.client_name().await? {
            return Ok(ClientIdentity::new(client_name));
        }

        let identity = ClientIdentity::generate();
        preferences.set_client_name(identity.client_name()).await?;
        tracing::info!("Generated client identity {identity}");
        Ok(identity)
    }

    /// Identity stamped on every queued mutation.
    pub const fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn db_path(&self) -> Option<&std::path::Path> {
        self.db_path.as_deref()
    }

    async fn enqueue(&self, conn: &Connection, mutation: LocalMutation) -> Result<()> {
        let correlation = self.identity.tag();
        let position = LibSqlPendingRepository::new(conn)
            .enqueue(&mutation, &correlation, unix_timestamp_now())
            .await?;
        tracing::debug!("Queued {} at position {position}", mutation.name());
        self.queued.notify_one();
        Ok(())
    }

    /// Resolves once a local change has been queued since the last wakeup.
    ///
    /// Fires while the writer still holds the store lock, so a flush started
    /// from it runs after the write has finished.
    pub fn pending_notified(&self) -> Notified<'_> {
        self.queued.notified()
    }

    async fn discard_pending(conn: &Connection, kind: EntityKind, local_id: LocalId) -> Result<()> {
        let discarded = LibSqlPendingRepository::new(conn)
            .discard_for_target(kind, local_id)
            .await?;
        if discarded > 0 {
            tracing::debug!("Discarded {discarded} queued operations for unsynced {kind} {local_id}");
        }
        Ok(())
    }

    // ---- remote-id mapping ----

    pub async fn folder_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        LibSqlFolderRepository::new(db.connection())
            .local_id(remote_id)
            .await
    }

    pub async fn link_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        LibSqlLinkRepository::new(db.connection())
            .local_id(remote_id)
            .await
    }

    pub async fn panel_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .panel_local_id(remote_id)
            .await
    }

    pub async fn panel_folder_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .panel_folder_local_id(remote_id)
            .await
    }

    /// Remote id of a local row, `None` until the server has acknowledged it.
    pub async fn remote_id(&self, kind: EntityKind, local_id: LocalId) -> Result<Option<RemoteId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        match kind {
            EntityKind::Folder => LibSqlFolderRepository::new(conn).remote_id(local_id).await,
            EntityKind::Link => LibSqlLinkRepository::new(conn).remote_id(local_id).await,
            EntityKind::Panel => LibSqlPanelRepository::new(conn).panel_remote_id(local_id).await,
            EntityKind::PanelFolder => Ok(LibSqlPanelRepository::new(conn)
                .get_panel_folder(local_id)
                .await?
                .and_then(|panel_folder| panel_folder.remote_id)),
        }
    }

    /// Record the server id of a local row.
    ///
    /// A different row already holding `remote_id` was materialized from the
    /// server before the acknowledgement arrived. Its children and panel
    /// memberships move to `local_id`, then it is removed.
    pub async fn assign_remote_id(
        &self,
        kind: EntityKind,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result = match kind {
            EntityKind::Folder => {
                LibSqlFolderRepository::new(conn)
                    .assign_remote_id(local_id, remote_id)
                    .await
            }
            EntityKind::Link => {
                LibSqlLinkRepository::new(conn)
                    .assign_remote_id(local_id, remote_id)
                    .await
            }
            EntityKind::Panel => {
                LibSqlPanelRepository::new(conn)
                    .assign_panel_remote_id(local_id, remote_id)
                    .await
            }
            EntityKind::PanelFolder => {
                LibSqlPanelRepository::new(conn)
                    .assign_panel_folder_remote_id(local_id, remote_id)
                    .await
            }
        };
        let displaced = finish_transaction(conn, result).await?;

        if displaced > 0 {
            tracing::debug!("Removed duplicate {kind} row holding remote id {remote_id}");
        }
        Ok(())
    }

    // ---- folders ----

    pub async fn get_folder(&self, local_id: LocalId) -> Result<Option<Folder>> {
        let db = self.db.lock().await;
        LibSqlFolderRepository::new(db.connection())
            .get(local_id)
            .await
    }

    pub async fn insert_folder(
        &self,
        folder: &Folder,
        options: WriteOptions,
    ) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<Option<LocalId>> = async {
            let inserted = LibSqlFolderRepository::new(conn)
                .insert(folder, options.ignore_duplicate)
                .await?;

            if let Some(folder_id) = inserted {
                if !options.via_socket {
                    self.enqueue(conn, LocalMutation::CreateFolder { folder_id })
                        .await?;
                }
            }
            Ok(inserted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    /// Overwrite a folder row and refresh the name copied into its panel
    /// memberships.
    pub async fn update_folder(&self, folder: &Folder, options: WriteOptions) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<()> = async {
            LibSqlFolderRepository::new(conn).update(folder).await?;
            LibSqlPanelRepository::new(conn)
                .rename_folder_shortcuts(folder.local_id, &folder.name)
                .await?;

            if !options.via_socket {
                self.enqueue(
                    conn,
                    LocalMutation::UpdateFolder {
                        folder_id: folder.local_id,
                    },
                )
                .await?;
            }
            Ok(())
        }
        .await;
        finish_transaction(conn, result).await
    }

    /// Delete a folder with its subtree, links and panel memberships.
    pub async fn delete_folder(&self, local_id: LocalId, options: WriteOptions) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<bool> = async {
            let repo = LibSqlFolderRepository::new(conn);
            let remote_id = repo.remote_id(local_id).await?;
            let deleted = repo.delete(local_id).await?;

            if deleted && !options.via_socket {
                match remote_id {
                    Some(remote_id) => {
                        self.enqueue(conn, LocalMutation::DeleteFolder { remote_id })
                            .await?;
                    }
                    None => Self::discard_pending(conn, EntityKind::Folder, local_id).await?,
                }
            }
            Ok(deleted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        let db = self.db.lock().await;
        LibSqlFolderRepository::new(db.connection()).list().await
    }

    pub async fn list_child_folders(&self, parent: Option<LocalId>) -> Result<Vec<Folder>> {
        let db = self.db.lock().await;
        LibSqlFolderRepository::new(db.connection())
            .list_children(parent)
            .await
    }

    // ---- links ----

    pub async fn get_link(&self, local_id: LocalId) -> Result<Option<Link>> {
        let db = self.db.lock().await;
        LibSqlLinkRepository::new(db.connection())
            .get(local_id)
            .await
    }

    pub async fn insert_link(&self, link: &Link, options: WriteOptions) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<Option<LocalId>> = async {
            let inserted = LibSqlLinkRepository::new(conn)
                .insert(link, options.ignore_duplicate)
                .await?;

            if let Some(link_id) = inserted {
                if !options.via_socket {
                    self.enqueue(conn, LocalMutation::CreateLink { link_id })
                        .await?;
                }
            }
            Ok(inserted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn update_link(&self, link: &Link, options: WriteOptions) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<()> = async {
            LibSqlLinkRepository::new(conn).update(link).await?;

            if !options.via_socket {
                self.enqueue(
                    conn,
                    LocalMutation::UpdateLink {
                        link_id: link.local_id,
                    },
                )
                .await?;
            }
            Ok(())
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn delete_link(&self, local_id: LocalId, options: WriteOptions) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<bool> = async {
            let repo = LibSqlLinkRepository::new(conn);
            let remote_id = repo.remote_id(local_id).await?;
            let deleted = repo.delete(local_id).await?;

            if deleted && !options.via_socket {
                match remote_id {
                    Some(remote_id) => {
                        self.enqueue(conn, LocalMutation::DeleteLink { remote_id })
                            .await?;
                    }
                    None => Self::discard_pending(conn, EntityKind::Link, local_id).await?,
                }
            }
            Ok(deleted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn list_links(&self, link_type: LinkType) -> Result<Vec<Link>> {
        let db = self.db.lock().await;
        LibSqlLinkRepository::new(db.connection())
            .list_by_type(link_type)
            .await
    }

    pub async fn list_links_in_folder(&self, folder_id: LocalId) -> Result<Vec<Link>> {
        let db = self.db.lock().await;
        LibSqlLinkRepository::new(db.connection())
            .list_in_folder(folder_id)
            .await
    }

    // ---- panels ----

    pub async fn get_panel(&self, local_id: LocalId) -> Result<Option<Panel>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .get_panel(local_id)
            .await
    }

    pub async fn insert_panel(
        &self,
        panel: &Panel,
        options: WriteOptions,
    ) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<Option<LocalId>> = async {
            let inserted = LibSqlPanelRepository::new(conn)
                .insert_panel(panel, options.ignore_duplicate)
                .await?;

            if let Some(panel_id) = inserted {
                if !options.via_socket {
                    self.enqueue(conn, LocalMutation::CreatePanel { panel_id })
                        .await?;
                }
            }
            Ok(inserted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn update_panel(&self, panel: &Panel, options: WriteOptions) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<()> = async {
            LibSqlPanelRepository::new(conn).update_panel(panel).await?;

            if !options.via_socket {
                self.enqueue(
                    conn,
                    LocalMutation::RenamePanel {
                        panel_id: panel.local_id,
                    },
                )
                .await?;
            }
            Ok(())
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn delete_panel(&self, local_id: LocalId, options: WriteOptions) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<bool> = async {
            let repo = LibSqlPanelRepository::new(conn);
            let remote_id = repo.panel_remote_id(local_id).await?;
            let deleted = repo.delete_panel(local_id).await?;

            if deleted && !options.via_socket {
                match remote_id {
                    Some(remote_id) => {
                        self.enqueue(conn, LocalMutation::DeletePanel { remote_id })
                            .await?;
                    }
                    None => Self::discard_pending(conn, EntityKind::Panel, local_id).await?,
                }
            }
            Ok(deleted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    pub async fn list_panels(&self) -> Result<Vec<Panel>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .list_panels()
            .await
    }

    // ---- panel folders ----

    pub async fn get_panel_folder(&self, local_id: LocalId) -> Result<Option<PanelFolder>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .get_panel_folder(local_id)
            .await
    }

    pub async fn insert_panel_folder(
        &self,
        panel_folder: &PanelFolder,
        options: WriteOptions,
    ) -> Result<Option<LocalId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<Option<LocalId>> = async {
            let inserted = LibSqlPanelRepository::new(conn)
                .insert_panel_folder(panel_folder, options.ignore_duplicate)
                .await?;

            if let Some(panel_folder_id) = inserted {
                if !options.via_socket {
                    self.enqueue(conn, LocalMutation::AddFolderToPanel { panel_folder_id })
                        .await?;
                }
            }
            Ok(inserted)
        }
        .await;
        finish_transaction(conn, result).await
    }

    /// Remove the shortcut to `folder_id` from one panel.
    pub async fn remove_folder_from_panel(
        &self,
        panel_id: LocalId,
        folder_id: LocalId,
        options: WriteOptions,
    ) -> Result<u64> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin_transaction(conn).await?;
        let result: Result<u64> = async {
            let repo = LibSqlPanelRepository::new(conn);

            let memberships: Vec<PanelFolder> = repo
                .list_panel_folders(panel_id)
                .await?
                .into_iter()
                .filter(|panel_folder| panel_folder.folder_id == folder_id)
                .collect();
            let panel_remote_id = repo.panel_remote_id(panel_id).await?;
            let folder_remote_id = LibSqlFolderRepository::new(conn)
                .remote_id(folder_id)
                .await?;

            let removed = repo.remove_folder_from_panel(panel_id, folder_id).await?;
            if removed == 0 || options.via_socket {
                return Ok(removed);
            }

            let mut any_synced = false;
            for membership in &memberships {
                if membership.remote_id.is_some() {
                    any_synced = true;
                } else {
                    Self::discard_pending(conn, EntityKind::PanelFolder, membership.local_id)
                        .await?;
                }
            }

            if let (true, Some(panel_remote_id), Some(folder_remote_id)) =
                (any_synced, panel_remote_id, folder_remote_id)
            {
                self.enqueue(
                    conn,
                    LocalMutation::RemoveFolderFromPanel {
                        panel_remote_id,
                        folder_remote_id,
                    },
                )
                .await?;
            }
            Ok(removed)
        }
        .await;
        finish_transaction(conn, result).await
    }

    /// Remove every shortcut to `folder_id`. Only the server issues this.
    pub async fn remove_folder_from_all_panels(&self, folder_id: LocalId) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .remove_folder_from_all_panels(folder_id)
            .await
    }

    pub async fn list_panel_folders(&self, panel_id: LocalId) -> Result<Vec<PanelFolder>> {
        let db = self.db.lock().await;
        LibSqlPanelRepository::new(db.connection())
            .list_panel_folders(panel_id)
            .await
    }

    // ---- pending queue and preferences ----

    /// Queued mutations in enqueue order.
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        let db = self.db.lock().await;
        LibSqlPendingRepository::new(db.connection()).list().await
    }

    pub async fn remove_pending(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlPendingRepository::new(db.connection())
            .remove(id)
            .await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlPendingRepository::new(db.connection()).count().await
    }

    /// Timestamp up to which server changes have been applied.
    pub async fn last_synced_timestamp(&self) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlPreferencesRepository::new(db.connection())
            .last_synced_timestamp()
            .await
    }

    /// Raise the watermark, never lowering it. Returns the stored value.
    pub async fn advance_watermark(&self, timestamp: i64) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlPreferencesRepository::new(db.connection())
            .advance_last_synced_timestamp(timestamp)
            .await
    }

    pub async fn summary(&self) -> Result<StoreSummary> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let panels = LibSqlPanelRepository::new(conn);
        Ok(StoreSummary {
            folders: LibSqlFolderRepository::new(conn).count().await?,
            links: LibSqlLinkRepository::new(conn).count().await?,
            panels: panels.count_panels().await?,
            panel_folders: panels.count_panel_folders().await?,
            pending: LibSqlPendingRepository::new(conn).count().await?,
        })
    }

    // ---- user operations ----

    /// Create a folder on this device.
    pub async fn create_folder(&self, name: &str, parent: Option<LocalId>) -> Result<Folder> {
        let name = required(name, "folder name")?;
        if let Some(parent) = parent {
            self.require_folder(parent).await?;
        }

        let folder = Folder::new(name).with_parent(parent);
        let local_id = self
            .insert_folder(&folder, WriteOptions::LOCAL)
            .await?
            .ok_or_else(|| Error::Database("folder insert was ignored".to_string()))?;
        Ok(Folder { local_id, ..folder })
    }

    pub async fn rename_folder(&self, folder_id: LocalId, new_name: &str) -> Result<Folder> {
        let new_name = required(new_name, "folder name")?;
        self.edit_folder(folder_id, |folder| folder.name = new_name)
            .await
    }

    pub async fn update_folder_note(&self, folder_id: LocalId, note: &str) -> Result<Folder> {
        let note = note.trim().to_string();
        self.edit_folder(folder_id, |folder| folder.note = note).await
    }

    pub async fn archive_folder(&self, folder_id: LocalId) -> Result<Folder> {
        self.edit_folder(folder_id, |folder| folder.is_archived = true)
            .await
    }

    pub async fn unarchive_folder(&self, folder_id: LocalId) -> Result<Folder> {
        self.edit_folder(folder_id, |folder| folder.is_archived = false)
            .await
    }

    /// Move folders under `new_parent`, or to the root for `None`.
    ///
    /// Rejects moves that would put a folder inside its own subtree.
    pub async fn move_folders(
        &self,
        folder_ids: &[LocalId],
        new_parent: Option<LocalId>,
    ) -> Result<Vec<Folder>> {
        let mut ancestor = new_parent;
        while let Some(current) = ancestor {
            if folder_ids.contains(&current) {
                return Err(Error::InvalidInput(
                    "cannot move a folder into itself or one of its subfolders".to_string(),
                ));
            }
            ancestor = self.require_folder(current).await?.parent_folder_id;
        }

        let mut moved = Vec::with_capacity(folder_ids.len());
        for &folder_id in folder_ids {
            moved.push(
                self.edit_folder(folder_id, |folder| folder.parent_folder_id = new_parent)
                    .await?,
            );
        }
        Ok(moved)
    }

    /// Save a new link on this device.
    pub async fn create_link(&self, link: Link) -> Result<Link> {
        let url = required(&link.url, "link url")?;
        if let Some(folder_id) = link.linked_folder() {
            self.require_folder(folder_id).await?;
        } else if link.link_type == LinkType::FolderLink {
            return Err(Error::InvalidInput(
                "folder links need a folder".to_string(),
            ));
        }

        let link = Link {
            url,
            last_modified: unix_timestamp_now(),
            ..link
        };
        let local_id = self
            .insert_link(&link, WriteOptions::LOCAL)
            .await?
            .ok_or_else(|| Error::Database("link insert was ignored".to_string()))?;
        Ok(Link { local_id, ..link })
    }

    /// Apply `edit` to a stored link and queue the new state.
    pub async fn edit_link(&self, link_id: LocalId, edit: impl FnOnce(&mut Link)) -> Result<Link> {
        let mut link = self
            .get_link(link_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("link {link_id}")))?;
        edit(&mut link);
        link.last_modified = unix_timestamp_now();
        self.update_link(&link, WriteOptions::LOCAL).await?;
        Ok(link)
    }

    pub async fn archive_link(&self, link_id: LocalId) -> Result<Link> {
        self.edit_link(link_id, |link| link.link_type = LinkType::ArchiveLink)
            .await
    }

    pub async fn unarchive_link(&self, link_id: LocalId) -> Result<Link> {
        self.edit_link(link_id, |link| link.link_type = LinkType::SavedLink)
            .await
    }

    pub async fn set_link_important(&self, link_id: LocalId, important: bool) -> Result<Link> {
        self.edit_link(link_id, |link| link.marked_as_important = important)
            .await
    }

    pub async fn create_panel(&self, name: &str) -> Result<Panel> {
        let panel = Panel::new(required(name, "panel name")?);
        let local_id = self
            .insert_panel(&panel, WriteOptions::LOCAL)
            .await?
            .ok_or_else(|| Error::Database("panel insert was ignored".to_string()))?;
        Ok(Panel { local_id, ..panel })
    }

    pub async fn rename_panel(&self, panel_id: LocalId, new_name: &str) -> Result<Panel> {
        let mut panel = self
            .get_panel(panel_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("panel {panel_id}")))?;
        panel.panel_name = required(new_name, "panel name")?;
        panel.last_modified = unix_timestamp_now();
        self.update_panel(&panel, WriteOptions::LOCAL).await?;
        Ok(panel)
    }

    /// Pin a folder at the end of a panel.
    pub async fn add_folder_to_panel(
        &self,
        panel_id: LocalId,
        folder_id: LocalId,
    ) -> Result<PanelFolder> {
        if self.get_panel(panel_id).await?.is_none() {
            return Err(Error::NotFound(format!("panel {panel_id}")));
        }
        let folder = self.require_folder(folder_id).await?;

        let existing = self.list_panel_folders(panel_id).await?;
        if existing.iter().any(|entry| entry.folder_id == folder_id) {
            return Err(Error::InvalidInput(format!(
                "folder {folder_id} is already in panel {panel_id}"
            )));
        }

        let position = i64::try_from(existing.len()).unwrap_or(i64::MAX);
        let panel_folder = PanelFolder::new(panel_id, folder_id, folder.name, position);
        let local_id = self
            .insert_panel_folder(&panel_folder, WriteOptions::LOCAL)
            .await?
            .ok_or_else(|| Error::Database("panel folder insert was ignored".to_string()))?;
        Ok(PanelFolder {
            local_id,
            ..panel_folder
        })
    }

    async fn require_folder(&self, folder_id: LocalId) -> Result<Folder> {
        self.get_folder(folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))
    }

    async fn edit_folder(
        &self,
        folder_id: LocalId,
        edit: impl FnOnce(&mut Folder),
    ) -> Result<Folder> {
        let mut folder = self.require_folder(folder_id).await?;
        edit(&mut folder);
        folder.last_modified = unix_timestamp_now();
        self.update_folder(&folder, WriteOptions::LOCAL).await?;
        Ok(folder)
    }
}

fn required(value: &str, what: &str) -> Result<String> {
    normalize_text_option(Some(value.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{what} must not be empty")))
}
