//! Folder repository implementation

use libsql::{params, Connection, Row};

use super::columns::{self, opt_int, read_flag, read_opt_int};
use crate::error::{Error, Result};
use crate::models::{Folder, LocalId, RemoteId};

const TABLE: &str = "folders";

/// Rows that reference a folder by local id
const DEPENDENTS: [(&str, &str); 3] = [
    ("folders", "parent_folder_id"),
    ("links", "id_of_linked_folder"),
    ("panel_folders", "folder_id"),
];

const COLUMNS: &str =
    "local_id, remote_id, name, note, parent_folder_id, is_archived, last_modified";

/// Trait for folder storage operations (async)
#[allow(async_fn_in_trait)]
pub trait FolderRepository {
    /// Insert a folder, returning its new local id.
    ///
    /// With `ignore_duplicate`, a row that already holds the same remote id
    /// wins and `None` is returned.
    async fn insert(&self, folder: &Folder, ignore_duplicate: bool) -> Result<Option<LocalId>>;

    /// Get a folder by local id
    async fn get(&self, local_id: LocalId) -> Result<Option<Folder>>;

    /// Resolve a remote id to the local row holding it
    async fn local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>>;

    /// Remote id of a local folder, `None` until synced
    async fn remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>>;

    /// Overwrite every mutable column of the row `folder.local_id`
    async fn update(&self, folder: &Folder) -> Result<()>;

    /// Delete a folder and, through cascades, its subtree
    async fn delete(&self, local_id: LocalId) -> Result<bool>;

    /// Record the server id of a local folder
    async fn assign_remote_id(&self, local_id: LocalId, remote_id: RemoteId) -> Result<u64>;

    /// All folders, parents before children where ids allow
    async fn list(&self) -> Result<Vec<Folder>>;

    /// Direct children of `parent`, or root folders for `None`
    async fn list_children(&self, parent: Option<LocalId>) -> Result<Vec<Folder>>;

    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `FolderRepository`
pub struct LibSqlFolderRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlFolderRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_folder(row: &Row) -> Result<Folder> {
        Ok(Folder {
            local_id: row.get(0)?,
            remote_id: read_opt_int(row, 1)?,
            name: row.get(2)?,
            note: row.get(3)?,
            parent_folder_id: read_opt_int(row, 4)?,
            is_archived: read_flag(row, 5)?,
            last_modified: row.get(6)?,
        })
    }

    async fn collect(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Folder>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next().await? {
            folders.push(Self::parse_folder(&row)?);
        }
        Ok(folders)
    }
}

impl FolderRepository for LibSqlFolderRepository<'_> {
    async fn insert(&self, folder: &Folder, ignore_duplicate: bool) -> Result<Option<LocalId>> {
        let conflict = if ignore_duplicate {
            " ON CONFLICT(remote_id) DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            "INSERT INTO folders (remote_id, name, note, parent_folder_id, is_archived, last_modified)
             VALUES (?, ?, ?, ?, ?, ?){conflict}"
        );

        let inserted = self
            .conn
            .execute(
                &sql,
                params![
                    opt_int(folder.remote_id),
                    folder.name.as_str(),
                    folder.note.as_str(),
                    opt_int(folder.parent_folder_id),
                    i64::from(folder.is_archived),
                    folder.last_modified,
                ],
            )
            .await?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    async fn get(&self, local_id: LocalId) -> Result<Option<Folder>> {
        let sql = format!("SELECT {COLUMNS} FROM folders WHERE local_id = ?");
        Ok(self.collect(&sql, [local_id]).await?.into_iter().next())
    }

    async fn local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        columns::local_id_for(self.conn, TABLE, remote_id).await
    }

    async fn remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>> {
        columns::remote_id_for(self.conn, TABLE, local_id).await
    }

    async fn update(&self, folder: &Folder) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE folders
                 SET name = ?, note = ?, parent_folder_id = ?, is_archived = ?, last_modified = ?
                 WHERE local_id = ?",
                params![
                    folder.name.as_str(),
                    folder.note.as_str(),
                    opt_int(folder.parent_folder_id),
                    i64::from(folder.is_archived),
                    folder.last_modified,
                    folder.local_id,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("folder {}", folder.local_id)));
        }
        Ok(())
    }

    async fn delete(&self, local_id: LocalId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM folders WHERE local_id = ?", [local_id])
            .await?;
        Ok(deleted > 0)
    }

    async fn assign_remote_id(&self, local_id: LocalId, remote_id: RemoteId) -> Result<u64> {
        columns::assign_remote_id(self.conn, TABLE, &DEPENDENTS, local_id, remote_id).await
    }

    async fn list(&self) -> Result<Vec<Folder>> {
        let sql = format!("SELECT {COLUMNS} FROM folders ORDER BY local_id");
        self.collect(&sql, ()).await
    }

    async fn list_children(&self, parent: Option<LocalId>) -> Result<Vec<Folder>> {
        match parent {
            Some(parent) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM folders WHERE parent_folder_id = ? ORDER BY local_id"
                );
                self.collect(&sql, [parent]).await
            }
            None => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM folders WHERE parent_folder_id IS NULL ORDER BY local_id"
                );
                self.collect(&sql, ()).await
            }
        }
    }

    async fn count(&self) -> Result<usize> {
        columns::count(self.conn, TABLE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let folder = Folder::new("Reading").with_note("later");
        let id = repo.insert(&folder, false).await.unwrap().unwrap();

        let loaded = repo.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.local_id, id);
        assert_eq!(loaded.name, "Reading");
        assert_eq!(loaded.note, "later");
        assert_eq!(loaded.remote_id, None);
        assert!(loaded.is_root());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_remote_id_is_ignored() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let mut folder = Folder::new("Reading");
        folder.remote_id = Some(42);
        let first = repo.insert(&folder, true).await.unwrap();
        let second = repo.insert(&folder, true).await.unwrap();

        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.local_id(42).await.unwrap(), first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_remote_id_errors_when_not_ignored() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let mut folder = Folder::new("Reading");
        folder.remote_id = Some(42);
        repo.insert(&folder, false).await.unwrap();
        assert!(repo.insert(&folder, false).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_and_children() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let parent = repo.insert(&Folder::new("Dev"), false).await.unwrap().unwrap();
        let child = repo
            .insert(&Folder::new("Rust").with_parent(Some(parent)), false)
            .await
            .unwrap()
            .unwrap();

        let mut loaded = repo.get(child).await.unwrap().unwrap();
        loaded.name = "Rust lang".to_string();
        loaded.is_archived = true;
        repo.update(&loaded).await.unwrap();

        let children = repo.list_children(Some(parent)).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Rust lang");
        assert!(children[0].is_archived);

        let roots = repo.list_children(None).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].local_id, parent);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_folder() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let mut ghost = Folder::new("Ghost");
        ghost.local_id = 99;
        assert!(matches!(repo.update(&ghost).await, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_cascades_to_subtree() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let parent = repo.insert(&Folder::new("Dev"), false).await.unwrap().unwrap();
        repo.insert(&Folder::new("Rust").with_parent(Some(parent)), false)
            .await
            .unwrap();

        assert!(repo.delete(parent).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(!repo.delete(parent).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_assign_remote_id_replaces_duplicate_row() {
        let db = setup().await;
        let repo = LibSqlFolderRepository::new(db.connection());

        let local = repo.insert(&Folder::new("Mine"), false).await.unwrap().unwrap();
        let mut echoed = Folder::new("Mine");
        echoed.remote_id = Some(42);
        repo.insert(&echoed, true).await.unwrap();

        let displaced = repo.assign_remote_id(local, 42).await.unwrap();
        assert_eq!(displaced, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.local_id(42).await.unwrap(), Some(local));
        assert_eq!(repo.remote_id(local).await.unwrap(), Some(42));
    }
}
