//! Column conversion helpers and the remote-id index shared by entity tables

use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{LocalId, RemoteId};

/// Nullable integer parameter
pub fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

/// Nullable text parameter
pub fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

/// Read a nullable integer column
pub fn read_opt_int(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected integer in column {idx}, got {other:?}"
        ))),
    }
}

/// Read a nullable text column
pub fn read_opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, got {other:?}"
        ))),
    }
}

/// Read a 0/1 integer column
pub fn read_flag(row: &Row, idx: i32) -> Result<bool> {
    Ok(row.get::<i64>(idx)? != 0)
}

/// Local row that maps to `remote_id` in `table`
///
/// `table` is always one of the crate's own table names.
pub async fn local_id_for(
    conn: &Connection,
    table: &str,
    remote_id: RemoteId,
) -> Result<Option<LocalId>> {
    let mut rows = conn
        .query(
            &format!("SELECT local_id FROM {table} WHERE remote_id = ?"),
            [remote_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row.get::<i64>(0)?)),
        None => Ok(None),
    }
}

/// Remote id of a local row, `None` when unsynced or missing
pub async fn remote_id_for(
    conn: &Connection,
    table: &str,
    local_id: LocalId,
) -> Result<Option<RemoteId>> {
    let mut rows = conn
        .query(
            &format!("SELECT remote_id FROM {table} WHERE local_id = ?"),
            [local_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => read_opt_int(&row, 0),
        None => Ok(None),
    }
}

/// Map `local_id` to `remote_id`, keeping the mapping one-to-one.
///
/// Another row already holding `remote_id` is folded into `local_id`: rows in
/// `dependents` (`(table, column)` pairs) that point at it are moved over
/// before it is removed, so cascades never reach them. Returns the number of
/// rows removed that way. Run it inside a transaction.
pub async fn assign_remote_id(
    conn: &Connection,
    table: &str,
    dependents: &[(&str, &str)],
    local_id: LocalId,
    remote_id: RemoteId,
) -> Result<u64> {
    if let Some(duplicate) = local_id_for(conn, table, remote_id).await? {
        if duplicate != local_id {
            for (dependent, column) in dependents {
                // a row never becomes its own parent
                let skip_self = if *dependent == table {
                    " AND local_id != ?1"
                } else {
                    ""
                };
                let moved = conn
                    .execute(
                        &format!(
                            "UPDATE {dependent} SET {column} = ?1 WHERE {column} = ?2{skip_self}"
                        ),
                        [local_id, duplicate],
                    )
                    .await?;
                if moved > 0 {
                    tracing::debug!(
                        "Moved {moved} {dependent} rows from {table} {duplicate} to {local_id}"
                    );
                }
            }
        }
    }

    let displaced = conn
        .execute(
            &format!("DELETE FROM {table} WHERE remote_id = ? AND local_id != ?"),
            [remote_id, local_id],
        )
        .await?;

    let updated = conn
        .execute(
            &format!("UPDATE {table} SET remote_id = ? WHERE local_id = ?"),
            [remote_id, local_id],
        )
        .await?;

    if updated == 0 {
        return Err(Error::NotFound(format!("{table} row {local_id}")));
    }

    Ok(displaced)
}

/// Open a write transaction on `conn`.
pub async fn begin_transaction(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;
    Ok(())
}

/// Commit when `result` is `Ok`, roll back otherwise.
pub async fn finish_transaction<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    let value = match result {
        Ok(value) => value,
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error);
        }
    };

    if let Err(error) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    Ok(value)
}

/// Number of rows in `table`
pub async fn count(conn: &Connection, table: &str) -> Result<usize> {
    let mut rows = conn
        .query(&format!("SELECT COUNT(*) FROM {table}"), ())
        .await?;

    let count = match rows.next().await? {
        Some(row) => row.get::<i64>(0)?,
        None => 0,
    };

    usize::try_from(count).map_err(|_| Error::Database(format!("negative count in {table}")))
}
