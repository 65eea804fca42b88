//! linkora-core - Core library for Linkora
//!
//! This crate contains the models, the libSQL-backed local store with its
//! pending queue, and the engine that keeps the store in sync with a Linkora
//! server. The `linkora` CLI is a thin shell around it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{ConnectionProvider, ServerConfig};
pub use error::{Error, Result};
pub use models::{
    ClientIdentity, Correlation, Folder, Link, LinkType, LocalId, Panel, PanelFolder, RemoteId,
};
pub use services::{LocalStore, StoreSummary, WriteOptions};
pub use state::SyncState;
pub use sync::{HttpTransport, SyncEngine, SyncReport};
