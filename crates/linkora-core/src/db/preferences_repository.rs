//! Local preferences repository implementation
//!
//! Preferences never leave the device. They hold the client identity and the
//! sync watermark.

use crate::error::Result;
use libsql::Connection;

const CLIENT_NAME: &str = "client_name";
const LAST_SYNCED_TIMESTAMP: &str = "last_synced_timestamp";

/// Trait for preference storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PreferencesRepository {
    /// Persisted client name, if one was ever generated
    async fn client_name(&self) -> Result<Option<String>>;

    async fn set_client_name(&self, client_name: &str) -> Result<()>;

    /// Sync watermark; 0 before the first successful pull
    async fn last_synced_timestamp(&self) -> Result<i64>;

    /// Raise the watermark to `timestamp`, never lowering it.
    ///
    /// Returns the stored value.
    async fn advance_last_synced_timestamp(&self, timestamp: i64) -> Result<i64>;
}

/// libSQL implementation of `PreferencesRepository`
pub struct LibSqlPreferencesRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPreferencesRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PreferencesRepository for LibSqlPreferencesRepository<'_> {
    async fn client_name(&self) -> Result<Option<String>> {
        self.get_setting(CLIENT_NAME).await
    }

    async fn set_client_name(&self, client_name: &str) -> Result<()> {
        self.set_setting(CLIENT_NAME, client_name).await
    }

    async fn last_synced_timestamp(&self) -> Result<i64> {
        Ok(self
            .get_setting(LAST_SYNCED_TIMESTAMP)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    async fn advance_last_synced_timestamp(&self, timestamp: i64) -> Result<i64> {
        let current = self.last_synced_timestamp().await?;
        if timestamp <= current {
            return Ok(current);
        }

        self.set_setting(LAST_SYNCED_TIMESTAMP, &timestamp.to_string())
            .await?;
        Ok(timestamp)
    }
}

impl LibSqlPreferencesRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_defaults() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());

        assert_eq!(repo.client_name().await.unwrap(), None);
        assert_eq!(repo.last_synced_timestamp().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_client_name_roundtrip() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());

        repo.set_client_name("linux-abc").await.unwrap();
        assert_eq!(
            repo.client_name().await.unwrap().as_deref(),
            Some("linux-abc")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watermark_never_decreases() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());

        assert_eq!(repo.advance_last_synced_timestamp(200).await.unwrap(), 200);
        assert_eq!(repo.advance_last_synced_timestamp(150).await.unwrap(), 200);
        assert_eq!(repo.last_synced_timestamp().await.unwrap(), 200);
        assert_eq!(repo.advance_last_synced_timestamp(201).await.unwrap(), 201);
    }
}
