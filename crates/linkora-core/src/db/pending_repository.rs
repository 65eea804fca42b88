//! Pending queue repository implementation

use libsql::{params, Connection, Row};

use super::columns::{self, opt_int, opt_text};
use crate::error::{Error, Result};
use crate::models::{Correlation, EntityKind, LocalId, LocalMutation, PendingOperation};

const TABLE: &str = "pending_operations";

/// Trait for the outbound pending queue (async)
#[allow(async_fn_in_trait)]
pub trait PendingRepository {
    /// Append a mutation to the queue, returning its queue position
    async fn enqueue(
        &self,
        mutation: &LocalMutation,
        correlation: &Correlation,
        created_at: i64,
    ) -> Result<i64>;

    /// Every queued operation in enqueue order
    async fn list(&self) -> Result<Vec<PendingOperation>>;

    /// Remove one acknowledged or obsolete operation
    async fn remove(&self, id: i64) -> Result<bool>;

    /// Drop every operation that reads the given local row
    async fn discard_for_target(&self, kind: EntityKind, local_id: LocalId) -> Result<u64>;

    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `PendingRepository`
pub struct LibSqlPendingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPendingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_operation(row: &Row) -> Result<PendingOperation> {
        let payload: String = row.get(1)?;
        let mutation: LocalMutation = serde_json::from_str(&payload).map_err(|e| {
            Error::Database(format!("corrupt pending payload: {e}"))
        })?;

        Ok(PendingOperation {
            id: row.get(0)?,
            mutation,
            correlation: Correlation {
                id: row.get(2)?,
                client_name: row.get(3)?,
            },
            created_at: row.get(4)?,
        })
    }
}

impl PendingRepository for LibSqlPendingRepository<'_> {
    async fn enqueue(
        &self,
        mutation: &LocalMutation,
        correlation: &Correlation,
        created_at: i64,
    ) -> Result<i64> {
        let payload = serde_json::to_string(mutation)?;
        let target = mutation.target();

        self.conn
            .execute(
                "INSERT INTO pending_operations
                    (operation, payload, target_kind, target_local_id,
                     correlation_id, client_name, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    mutation.name(),
                    payload,
                    opt_text(target.map(|(kind, _)| kind.as_str())),
                    opt_int(target.map(|(_, local_id)| local_id)),
                    correlation.id.as_str(),
                    correlation.client_name.as_str(),
                    created_at,
                ],
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn list(&self) -> Result<Vec<PendingOperation>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, payload, correlation_id, client_name, created_at
                 FROM pending_operations ORDER BY id",
                (),
            )
            .await?;

        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(Self::parse_operation(&row)?);
        }
        Ok(operations)
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM pending_operations WHERE id = ?", [id])
            .await?;
        Ok(removed > 0)
    }

    async fn discard_for_target(&self, kind: EntityKind, local_id: LocalId) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM pending_operations WHERE target_kind = ? AND target_local_id = ?",
                params![kind.as_str(), local_id],
            )
            .await?)
    }

    async fn count(&self) -> Result<usize> {
        columns::count(self.conn, TABLE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ClientIdentity;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_preserves_order_and_correlation() {
        let db = setup().await;
        let repo = LibSqlPendingRepository::new(db.connection());
        let identity = ClientIdentity::new("laptop");

        let first_tag = identity.tag();
        repo.enqueue(&LocalMutation::CreateFolder { folder_id: 1 }, &first_tag, 10)
            .await
            .unwrap();
        repo.enqueue(
            &LocalMutation::DeleteLink { remote_id: 5 },
            &identity.tag(),
            11,
        )
        .await
        .unwrap();

        let queued = repo.list().await.unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].mutation, LocalMutation::CreateFolder { folder_id: 1 });
        assert_eq!(queued[0].correlation, first_tag);
        assert_eq!(queued[0].created_at, 10);
        assert_eq!(queued[1].mutation, LocalMutation::DeleteLink { remote_id: 5 });
        assert!(queued[0].id < queued[1].id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_and_discard_for_target() {
        let db = setup().await;
        let repo = LibSqlPendingRepository::new(db.connection());
        let identity = ClientIdentity::new("laptop");

        let create = repo
            .enqueue(&LocalMutation::CreateLink { link_id: 3 }, &identity.tag(), 1)
            .await
            .unwrap();
        repo.enqueue(&LocalMutation::UpdateLink { link_id: 3 }, &identity.tag(), 2)
            .await
            .unwrap();
        repo.enqueue(&LocalMutation::UpdateLink { link_id: 4 }, &identity.tag(), 3)
            .await
            .unwrap();

        assert_eq!(repo.discard_for_target(EntityKind::Link, 3).await.unwrap(), 2);
        assert!(!repo.remove(create).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
