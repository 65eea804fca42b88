//! Database layer for Linkora

mod columns;
mod connection;
mod folder_repository;
mod link_repository;
mod migrations;
mod panel_repository;
mod pending_repository;
mod preferences_repository;

pub(crate) use columns::{begin_transaction, finish_transaction};
pub use connection::Database;
pub use folder_repository::{FolderRepository, LibSqlFolderRepository};
pub use link_repository::{LibSqlLinkRepository, LinkRepository};
pub use panel_repository::{LibSqlPanelRepository, PanelRepository};
pub use pending_repository::{LibSqlPendingRepository, PendingRepository};
pub use preferences_repository::{LibSqlPreferencesRepository, PreferencesRepository};
