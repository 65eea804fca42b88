//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run `statements` inside one transaction, rolling back on the first failure
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: entity tables and preferences
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Folders; remote_id is NULL until the server has assigned one
            "CREATE TABLE IF NOT EXISTS folders (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER UNIQUE,
                name TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                parent_folder_id INTEGER REFERENCES folders(local_id) ON DELETE CASCADE,
                is_archived INTEGER NOT NULL DEFAULT 0,
                last_modified INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_folder_id)",
            // Links
            "CREATE TABLE IF NOT EXISTS links (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER UNIQUE,
                link_type TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                img_url TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                id_of_linked_folder INTEGER REFERENCES folders(local_id) ON DELETE CASCADE,
                user_agent TEXT,
                marked_as_important INTEGER NOT NULL DEFAULT 0,
                media_type TEXT NOT NULL DEFAULT 'IMAGE',
                last_modified INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_links_folder ON links(id_of_linked_folder)",
            "CREATE INDEX IF NOT EXISTS idx_links_type ON links(link_type)",
            // Panels and their folder shortcuts
            "CREATE TABLE IF NOT EXISTS panels (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER UNIQUE,
                panel_name TEXT NOT NULL,
                last_modified INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS panel_folders (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER UNIQUE,
                connected_panel_id INTEGER NOT NULL REFERENCES panels(local_id) ON DELETE CASCADE,
                folder_id INTEGER NOT NULL REFERENCES folders(local_id) ON DELETE CASCADE,
                folder_name TEXT NOT NULL,
                panel_position INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_panel_folders_panel ON panel_folders(connected_panel_id)",
            "CREATE INDEX IF NOT EXISTS idx_panel_folders_folder ON panel_folders(folder_id)",
            // Preferences (local only)
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    )
    .await
}

/// Migration to version 2: outbound pending queue
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "CREATE TABLE IF NOT EXISTS pending_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                target_kind TEXT,
                target_local_id INTEGER,
                correlation_id TEXT NOT NULL,
                client_name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_pending_target ON pending_operations(target_kind, target_local_id)",
        ],
    )
    .await?;

    tracing::info!("Database schema is at version {CURRENT_VERSION}");
    Ok(())
}
