//! Reconciliation between the local store and the sync server.
//!
//! Outbound, queued local changes are flushed in order. Inbound, live events,
//! backlog pulls and tombstones all funnel through one [`Reconciler`], which
//! writes with remote options so nothing it applies is queued again.

mod backlog;
pub mod dto;
mod engine;
mod event;
mod materialize;
mod outbound;
mod reconciler;
pub mod routes;
mod tombstones;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dto::{TombstoneDto, UpdatesDto};
pub use engine::{SyncEngine, SyncReport};
pub use event::SyncEvent;
pub use reconciler::{Outcome, Reconciler};
pub use transport::{FrameStream, HttpTransport, Transport};
