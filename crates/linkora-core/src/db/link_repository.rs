//! Link repository implementation

use libsql::{params, Connection, Row};

use super::columns::{self, opt_int, opt_text, read_flag, read_opt_int, read_opt_text};
use crate::error::{Error, Result};
use crate::models::{Link, LinkType, LocalId, MediaType, RemoteId};

const TABLE: &str = "links";

const COLUMNS: &str = "local_id, remote_id, link_type, title, url, img_url, note, \
     id_of_linked_folder, user_agent, marked_as_important, media_type, last_modified";

/// Trait for link storage operations (async)
#[allow(async_fn_in_trait)]
pub trait LinkRepository {
    /// Insert a link, returning its new local id, or `None` when
    /// `ignore_duplicate` is set and the remote id is already stored
    async fn insert(&self, link: &Link, ignore_duplicate: bool) -> Result<Option<LocalId>>;

    async fn get(&self, local_id: LocalId) -> Result<Option<Link>>;

    async fn local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>>;

    async fn remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>>;

    /// Overwrite every mutable column of the row `link.local_id`
    async fn update(&self, link: &Link) -> Result<()>;

    async fn delete(&self, local_id: LocalId) -> Result<bool>;

    async fn assign_remote_id(&self, local_id: LocalId, remote_id: RemoteId) -> Result<u64>;

    /// Links of one container type, newest first
    async fn list_by_type(&self, link_type: LinkType) -> Result<Vec<Link>>;

    /// Links stored in a folder, newest first
    async fn list_in_folder(&self, folder_id: LocalId) -> Result<Vec<Link>>;

    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `LinkRepository`
pub struct LibSqlLinkRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLinkRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_link(row: &Row) -> Result<Link> {
        let link_type: String = row.get(2)?;
        let media_type: String = row.get(10)?;

        Ok(Link {
            local_id: row.get(0)?,
            remote_id: read_opt_int(row, 1)?,
            link_type: link_type.parse().map_err(Error::Database)?,
            title: row.get(3)?,
            url: row.get(4)?,
            img_url: row.get(5)?,
            note: row.get(6)?,
            id_of_linked_folder: read_opt_int(row, 7)?,
            user_agent: read_opt_text(row, 8)?,
            marked_as_important: read_flag(row, 9)?,
            media_type: media_type
                .parse::<MediaType>()
                .map_err(Error::Database)?,
            last_modified: row.get(11)?,
        })
    }

    async fn collect(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Link>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            links.push(Self::parse_link(&row)?);
        }
        Ok(links)
    }
}

impl LinkRepository for LibSqlLinkRepository<'_> {
    async fn insert(&self, link: &Link, ignore_duplicate: bool) -> Result<Option<LocalId>> {
        let conflict = if ignore_duplicate {
            " ON CONFLICT(remote_id) DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            "INSERT INTO links (remote_id, link_type, title, url, img_url, note,
                id_of_linked_folder, user_agent, marked_as_important, media_type, last_modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?){conflict}"
        );

        let inserted = self
            .conn
            .execute(
                &sql,
                params![
                    opt_int(link.remote_id),
                    link.link_type.as_str(),
                    link.title.as_str(),
                    link.url.as_str(),
                    link.img_url.as_str(),
                    link.note.as_str(),
                    opt_int(link.linked_folder()),
                    opt_text(link.user_agent.as_deref()),
                    i64::from(link.marked_as_important),
                    link.media_type.as_str(),
                    link.last_modified,
                ],
            )
            .await?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    async fn get(&self, local_id: LocalId) -> Result<Option<Link>> {
        let sql = format!("SELECT {COLUMNS} FROM links WHERE local_id = ?");
        Ok(self.collect(&sql, [local_id]).await?.into_iter().next())
    }

    async fn local_id(&self, remote_id: RemoteId) -> Result<Option<LocalId>> {
        columns::local_id_for(self.conn, TABLE, remote_id).await
    }

    async fn remote_id(&self, local_id: LocalId) -> Result<Option<RemoteId>> {
        columns::remote_id_for(self.conn, TABLE, local_id).await
    }

    async fn update(&self, link: &Link) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE links
                 SET link_type = ?, title = ?, url = ?, img_url = ?, note = ?,
                     id_of_linked_folder = ?, user_agent = ?, marked_as_important = ?,
                     media_type = ?, last_modified = ?
                 WHERE local_id = ?",
                params![
                    link.link_type.as_str(),
                    link.title.as_str(),
                    link.url.as_str(),
                    link.img_url.as_str(),
                    link.note.as_str(),
                    opt_int(link.linked_folder()),
                    opt_text(link.user_agent.as_deref()),
                    i64::from(link.marked_as_important),
                    link.media_type.as_str(),
                    link.last_modified,
                    link.local_id,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("link {}", link.local_id)));
        }
        Ok(())
    }

    async fn delete(&self, local_id: LocalId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM links WHERE local_id = ?", [local_id])
            .await?;
        Ok(deleted > 0)
    }

    async fn assign_remote_id(&self, local_id: LocalId, remote_id: RemoteId) -> Result<u64> {
        columns::assign_remote_id(self.conn, TABLE, &[], local_id, remote_id).await
    }

    async fn list_by_type(&self, link_type: LinkType) -> Result<Vec<Link>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM links WHERE link_type = ?
             ORDER BY last_modified DESC, local_id DESC"
        );
        self.collect(&sql, [link_type.as_str()]).await
    }

    async fn list_in_folder(&self, folder_id: LocalId) -> Result<Vec<Link>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM links WHERE id_of_linked_folder = ?
             ORDER BY last_modified DESC, local_id DESC"
        );
        self.collect(&sql, [folder_id]).await
    }

    async fn count(&self) -> Result<usize> {
        columns::count(self.conn, TABLE).await
    }
}
