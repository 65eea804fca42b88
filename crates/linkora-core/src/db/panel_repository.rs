//! Panel and panel-folder repository implementation

use libsql::{params, Connection, Row};

use super::columns::{self, opt_int, read_opt_int};
use crate::error::{Error, Result};
use crate::models::{LocalId, Panel, PanelFolder, RemoteId};

const PANELS: &str = "panels";
const PANEL_FOLDERS: &str = "panel_folders";

const PANEL_FOLDER_COLUMNS: &str =
    "local_id, remote_id, connected_panel_id, folder_id, folder_name, panel_position";

/// Trait for panel storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PanelRepository {
    async fn insert_panel(&self, panel: &Panel, ignore_duplicate: bool)
        -> Result<Option<LocalId>>;

    async fn get_panel(&self, local_id: LocalId) -> Result<Option<Panel>>;

    async fn panel_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>>;

    async fn panel_remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>>;

    async fn update_panel(&self, panel: &Panel) -> Result<()>;

    /// Delete a panel and, through cascades, its folder shortcuts
    async fn delete_panel(&self, local_id: LocalId) -> Result<bool>;

    async fn assign_panel_remote_id(&self, local_id: LocalId, remote_id: RemoteId)
        -> Result<u64>;

    async fn list_panels(&self) -> Result<Vec<Panel>>;

    async fn insert_panel_folder(
        &self,
        panel_folder: &PanelFolder,
        ignore_duplicate: bool,
    ) -> Result<Option<LocalId>>;

    async fn get_panel_folder(&self, local_id: LocalId) -> Result<Option<PanelFolder>>;

    async fn panel_folder_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>>;

    async fn assign_panel_folder_remote_id(
        &self,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<u64>;

    /// Shortcuts of a panel ordered by position
    async fn list_panel_folders(&self, panel_id: LocalId) -> Result<Vec<PanelFolder>>;

    /// Remove the shortcut to `folder_id` from one panel
    async fn remove_folder_from_panel(&self, panel_id: LocalId, folder_id: LocalId)
        -> Result<u64>;

    /// Remove every shortcut to `folder_id`
    async fn remove_folder_from_all_panels(&self, folder_id: LocalId) -> Result<u64>;

    /// Keep the denormalized folder name of every shortcut in step
    async fn rename_folder_shortcuts(&self, folder_id: LocalId, folder_name: &str)
        -> Result<u64>;

    async fn count_panels(&self) -> Result<usize>;

    async fn count_panel_folders(&self) -> Result<usize>;
}

/// libSQL implementation of `PanelRepository`
pub struct LibSqlPanelRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPanelRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_panel(row: &Row) -> Result<Panel> {
        Ok(Panel {
            local_id: row.get(0)?,
            remote_id: read_opt_int(row, 1)?,
            panel_name: row.get(2)?,
            last_modified: row.get(3)?,
        })
    }

    fn parse_panel_folder(row: &Row) -> Result<PanelFolder> {
        Ok(PanelFolder {
            local_id: row.get(0)?,
            remote_id: read_opt_int(row, 1)?,
            connected_panel_id: row.get(2)?,
            folder_id: row.get(3)?,
            folder_name: row.get(4)?,
            panel_position: row.get(5)?,
        })
    }

    async fn collect_panel_folders(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<PanelFolder>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut panel_folders = Vec::new();
        while let Some(row) = rows.next().await? {
            panel_folders.push(Self::parse_panel_folder(&row)?);
        }
        Ok(panel_folders)
    }

    const fn on_conflict(ignore_duplicate: bool) -> &'static str {
        if ignore_duplicate {
            " ON CONFLICT(remote_id) DO NOTHING"
        } else {
            ""
        }
    }
}

impl PanelRepository for LibSqlPanelRepository<'_> {
    async fn insert_panel(
        &self,
        panel: &Panel,
        ignore_duplicate: bool,
    ) -> Result<Option<LocalId>> {
        let sql = format!(
            "INSERT INTO panels (remote_id, panel_name, last_modified) VALUES (?, ?, ?){}",
            Self::on_conflict(ignore_duplicate)
        );

        let inserted = self
            .conn
            .execute(
                &sql,
                params![
                    opt_int(panel.remote_id),
                    panel.panel_name.as_str(),
                    panel.last_modified,
                ],
            )
            .await?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    async fn get_panel(&self, local_id: LocalId) -> Result<Option<Panel>> {
        let mut rows = self
            .conn
            .query(
                "SELECT local_id, remote_id, panel_name, last_modified
                 FROM panels WHERE local_id = ?",
                [local_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_panel(&row)?)),
            None => Ok(None),
        }
    }

    async fn panel_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        columns::local_id_for(self.conn, PANELS, remote_id).await
    }

    async fn panel_remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>> {
        columns::remote_id_for(self.conn, PANELS, local_id).await
    }

    async fn update_panel(&self, panel: &Panel) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE panels SET panel_name = ?, last_modified = ? WHERE local_id = ?",
                params![
                    panel.panel_name.as_str(),
                    panel.last_modified,
                    panel.local_id
                ],
            )
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("panel {}", panel.local_id)));
        }
        Ok(())
    }

    async fn delete_panel(&self, local_id: LocalId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM panels WHERE local_id = ?", [local_id])
            .await?;
        Ok(deleted > 0)
    }

    async fn assign_panel_remote_id(
        &self,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<u64> {
        columns::assign_remote_id(
            self.conn,
            PANELS,
            &[(PANEL_FOLDERS, "connected_panel_id")],
            local_id,
            remote_id,
        ).await
    }

    async fn list_panels(&self) -> Result<Vec<Panel>> {
        let mut rows = self
            .conn
            .query(
                "SELECT local_id, remote_id, panel_name, last_modified
                 FROM panels ORDER BY local_id",
                (),
            )
            .await?;

        let mut panels = Vec::new();
        while let Some(row) = rows.next().await? {
            panels.push(Self::parse_panel(&row)?);
        }
        Ok(panels)
    }

    async fn insert_panel_folder(
        &self,
        panel_folder: &PanelFolder,
        ignore_duplicate: bool,
    ) -> Result<Option<LocalId>> {
        let sql = format!(
            "INSERT INTO panel_folders
                (remote_id, connected_panel_id, folder_id, folder_name, panel_position)
             VALUES (?, ?, ?, ?, ?){}",
            Self::on_conflict(ignore_duplicate)
        );

        let inserted = self
            .conn
            .execute(
                &sql,
                params![
                    opt_int(panel_folder.remote_id),
                    panel_folder.connected_panel_id,
                    panel_folder.folder_id,
                    panel_folder.folder_name.as_str(),
                    panel_folder.panel_position,
                ],
            )
            .await?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    async fn get_panel_folder(&self, local_id: LocalId) -> Result<Option<PanelFolder>> {
        let sql = format!("SELECT {PANEL_FOLDER_COLUMNS} FROM panel_folders WHERE local_id = ?");
        Ok(self
            .collect_panel_folders(&sql, [local_id])
            .await?
            .into_iter()
            .next())
    }

    async fn panel_folder_local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        columns::local_id_for(self.conn, PANEL_FOLDERS, remote_id).await
    }

    async fn assign_panel_folder_remote_id(
        &self,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<u64> {
        columns::assign_remote_id(self.conn, PANEL_FOLDERS, &[], local_id, remote_id).await
    }

    async fn list_panel_folders(&self, panel_id: LocalId) -> Result<Vec<PanelFolder>> {
        let sql = format!(
            "SELECT {PANEL_FOLDER_COLUMNS} FROM panel_folders
             WHERE connected_panel_id = ? ORDER BY panel_position, local_id"
        );
        self.collect_panel_folders(&sql, [panel_id]).await
    }

    async fn remove_folder_from_panel(
        &self,
        panel_id: LocalId,
        folder_id: LocalId,
    ) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM panel_folders WHERE connected_panel_id = ? AND folder_id = ?",
                [panel_id, folder_id],
            )
            .await?)
    }

    async fn remove_folder_from_all_panels(&self, folder_id: LocalId) -> Result<u64> {
        Ok(self
            .conn
            .execute("DELETE FROM panel_folders WHERE folder_id = ?", [folder_id])
            .await?)
    }

    async fn rename_folder_shortcuts(
        &self,
        folder_id: LocalId,
        folder_name: &str,
    ) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "UPDATE panel_folders SET folder_name = ? WHERE folder_id = ?",
                params![folder_name, folder_id],
            )
            .await?)
    }

    async fn count_panels(&self) -> Result<usize> {
        columns::count(self.conn, PANELS).await
    }

    async fn count_panel_folders(&self) -> Result<usize> {
        columns::count(self.conn, PANEL_FOLDERS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, FolderRepository, LibSqlFolderRepository};
    use crate::models::Folder;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panel_crud() {
        let db = setup().await;
        let repo = LibSqlPanelRepository::new(db.connection());

        let id = repo
            .insert_panel(&Panel::new("Daily"), false)
            .await
            .unwrap()
            .unwrap();

        let mut panel = repo.get_panel(id).await.unwrap().unwrap();
        panel.panel_name = "Weekly".to_string();
        repo.update_panel(&panel).await.unwrap();

        let panels = repo.list_panels().await.unwrap();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].panel_name, "Weekly");

        assert!(repo.delete_panel(id).await.unwrap());
        assert_eq!(repo.count_panels().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panel_folders_follow_panel_and_folder() {
        let db = setup().await;
        let folders = LibSqlFolderRepository::new(db.connection());
        let repo = LibSqlPanelRepository::new(db.connection());

        let folder = folders.insert(&Folder::new("Dev"), false).await.unwrap().unwrap();
        let other = folders.insert(&Folder::new("Ops"), false).await.unwrap().unwrap();
        let panel = repo
            .insert_panel(&Panel::new("Daily"), false)
            .await
            .unwrap()
            .unwrap();

        repo.insert_panel_folder(&PanelFolder::new(panel, other, "Ops", 1), false)
            .await
            .unwrap();
        repo.insert_panel_folder(&PanelFolder::new(panel, folder, "Dev", 0), false)
            .await
            .unwrap();

        let listed = repo.list_panel_folders(panel).await.unwrap();
        assert_eq!(
            listed.iter().map(|pf| pf.folder_name.as_str()).collect::<Vec<_>>(),
            vec!["Dev", "Ops"]
        );

        assert_eq!(repo.rename_folder_shortcuts(folder, "Development").await.unwrap(), 1);
        assert_eq!(
            repo.list_panel_folders(panel).await.unwrap()[0].folder_name,
            "Development"
        );

        folders.delete(other).await.unwrap();
        assert_eq!(repo.count_panel_folders().await.unwrap(), 1);

        repo.delete_panel(panel).await.unwrap();
        assert_eq!(repo.count_panel_folders().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_folder_from_panels() {
        let db = setup().await;
        let folders = LibSqlFolderRepository::new(db.connection());
        let repo = LibSqlPanelRepository::new(db.connection());

        let folder = folders.insert(&Folder::new("Dev"), false).await.unwrap().unwrap();
        let first = repo.insert_panel(&Panel::new("A"), false).await.unwrap().unwrap();
        let second = repo.insert_panel(&Panel::new("B"), false).await.unwrap().unwrap();
        for panel in [first, second] {
            repo.insert_panel_folder(&PanelFolder::new(panel, folder, "Dev", 0), false)
                .await
                .unwrap();
        }

        assert_eq!(repo.remove_folder_from_panel(first, folder).await.unwrap(), 1);
        assert_eq!(repo.count_panel_folders().await.unwrap(), 1);
        assert_eq!(repo.remove_folder_from_all_panels(folder).await.unwrap(), 1);
        assert_eq!(repo.count_panel_folders().await.unwrap(), 0);
    }
}
