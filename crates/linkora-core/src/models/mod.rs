//! Data models for Linkora

mod correlation;
mod folder;
mod link;
mod panel;
mod pending;

pub use correlation::{ClientIdentity, Correlation};
pub use folder::Folder;
pub use link::{Link, LinkType, MediaType};
pub use panel::{Panel, PanelFolder};
pub use pending::{EntityKind, LocalMutation, PendingOperation};

/// Locally autogenerated row id.
pub type LocalId = i64;

/// Server-assigned id, the join key between local and remote state.
pub type RemoteId = i64;
