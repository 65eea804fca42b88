//! Sync orchestrator.
//!
//! A run goes `Connecting -> FlushingPending -> Pulling`, then either returns
//! to `Idle` ([`SyncEngine::sync_now`]) or opens the live event channel and
//! stays `Live` ([`SyncEngine::start`]). Any phase error ends in `Failed`.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use super::event::SyncEvent;
use super::reconciler::Reconciler;
use super::transport::{FrameStream, Transport};
use super::{backlog, outbound, routes, tombstones};
use crate::error::{Error, Result};
use crate::services::LocalStore;
use crate::state::SyncState;

/// Counts from one flush-and-pull run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncReport {
    /// Pending items sent or dropped as obsolete
    pub flushed: usize,
    pub updates_applied: usize,
    pub tombstones_applied: usize,
    /// Watermark persisted after the pull
    pub watermark: i64,
}

struct LiveChannel {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl LiveChannel {
    async fn stop(self) {
        // the task may already have exited on its own
        let _ = self.shutdown.send(());
        if let Err(error) = self.handle.await {
            tracing::warn!("Live channel task ended abnormally: {error}");
        }
    }
}

pub struct SyncEngine<T: Transport> {
    reconciler: Reconciler<T>,
    state: Arc<watch::Sender<SyncState>>,
    live: Mutex<Option<LiveChannel>>,
    /// Serializes queue flushes between callers and the live task
    flushing: Arc<Mutex<()>>,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(store: LocalStore, transport: Arc<T>) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            reconciler: Reconciler::new(store, transport),
            state: Arc::new(state),
            live: Mutex::new(None),
            flushing: Arc::new(Mutex::new(())),
        }
    }

    pub const fn store(&self) -> &LocalStore {
        self.reconciler.store()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn is_live(&self) -> bool {
        matches!(*self.state.borrow(), SyncState::Live)
    }

    fn set_state(&self, state: SyncState) {
        tracing::debug!("Sync state: {state:?}");
        self.state.send_replace(state);
    }

    /// Check that the server accepts the configured token.
    pub async fn test_connection(&self) -> Result<()> {
        self.reconciler
            .transport()
            .get(routes::TEST_BEARER, &[])
            .await?;
        Ok(())
    }

    /// Forward queued local changes.
    pub async fn flush_pending(&self) -> Result<usize> {
        let _flushing = self.flushing.lock().await;
        outbound::flush(self.store(), self.reconciler.transport()).await
    }

    /// Pull updates and tombstones after the stored watermark, apply them and
    /// persist the new watermark.
    ///
    /// Both requests run concurrently. Updates are applied before tombstones,
    /// so a snapshot that raced a deletion cannot bring the entity back.
    ///
    /// When the batch carries updates, the watermark stops at the newest of
    /// them: an update recorded after that snapshot was taken must still be
    /// returned by the next pull, and replaying a tombstone is a no-op.
    pub async fn pull(&self) -> Result<SyncReport> {
        let store = self.store();
        let transport = self.reconciler.transport();
        let since = store.last_synced_timestamp().await?;

        let (updates, deletions) = tokio::try_join!(
            backlog::fetch(transport, since),
            tombstones::fetch(transport, since),
        )?;

        let updates_applied = backlog::apply(&self.reconciler, &updates).await?;
        let tombstones_applied = tombstones::apply(&self.reconciler, &deletions).await?;

        let newest = if updates.is_empty() {
            deletions
                .iter()
                .map(|tombstone| tombstone.deleted_at)
                .fold(since, i64::max)
        } else {
            since.max(updates.max_event_timestamp())
        };
        let watermark = store.advance_watermark(newest).await?;
        tracing::info!("Pulled changes since {since}; watermark is now {watermark}");

        Ok(SyncReport {
            flushed: 0,
            updates_applied,
            tombstones_applied,
            watermark,
        })
    }

    /// Fetch and apply tombstones recorded after `since`.
    pub async fn apply_tombstones(&self, since: i64) -> Result<usize> {
        let deletions = tombstones::fetch(self.reconciler.transport(), since).await?;
        tombstones::apply(&self.reconciler, &deletions).await
    }

    /// Connect, flush and pull once, without opening the live channel.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let report = self.run_phases().await?;
        self.set_state(SyncState::Idle);
        Ok(report)
    }

    /// Run the full sequence and then follow the live channel in the
    /// background. A channel that is already running is stopped first.
    pub async fn start(&self) -> Result<SyncReport> {
        let mut live = self.live.lock().await;
        if let Some(channel) = live.take() {
            tracing::info!("Restarting live channel");
            channel.stop().await;
        }

        let report = self.run_phases().await?;
        let frames = match self.reconciler.transport().open_socket(routes::EVENTS).await {
            Ok(frames) => frames,
            Err(error) => {
                self.set_state(SyncState::Failed(error.to_string()));
                return Err(error);
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        self.set_state(SyncState::Live);
        let handle = tokio::spawn(run_live(
            self.reconciler.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.flushing),
            frames,
            shutdown_rx,
        ));
        *live = Some(LiveChannel { shutdown, handle });

        Ok(report)
    }

    /// Stop taking new frames and wait for the live task to finish.
    ///
    /// An event already being applied completes; its writes are kept.
    pub async fn stop(&self) {
        let channel = self.live.lock().await.take();
        if let Some(channel) = channel {
            channel.stop().await;
            tracing::info!("Live channel stopped");
        }
    }

    async fn run_phases(&self) -> Result<SyncReport> {
        let result = self.phases().await;
        if let Err(error) = &result {
            tracing::warn!("Sync failed: {error}");
            self.set_state(SyncState::Failed(error.to_string()));
        }
        result
    }

    async fn phases(&self) -> Result<SyncReport> {
        self.set_state(SyncState::Connecting);
        self.test_connection().await?;

        self.set_state(SyncState::FlushingPending);
        let flushed = match self.flush_pending().await {
            Ok(flushed) => flushed,
            Err(Error::UnresolvedReference(message)) => {
                tracing::warn!("Pending queue halted: {message}");
                0
            }
            Err(error) => return Err(error),
        };

        self.set_state(SyncState::Pulling);
        let report = self.pull().await?;

        Ok(SyncReport { flushed, ..report })
    }
}

/// Apply live frames one at a time, in delivery order, and forward local
/// changes as they are queued, until shutdown or the stream ends.
async fn run_live<T: Transport>(
    reconciler: Reconciler<T>,
    state: Arc<watch::Sender<SyncState>>,
    flushing: Arc<Mutex<()>>,
    mut frames: FrameStream,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                state.send_replace(SyncState::Idle);
                return;
            }
            frame = frames.next() => match frame {
                Some(Ok(text)) => handle_frame(&reconciler, &text).await,
                Some(Err(error)) => {
                    tracing::warn!("Live channel failed: {error}");
                    state.send_replace(SyncState::Failed(error.to_string()));
                    return;
                }
                None => {
                    tracing::info!("Live channel closed by the server");
                    state.send_replace(SyncState::Idle);
                    return;
                }
            },
            () = reconciler.store().pending_notified() => {
                let _flushing = flushing.lock().await;
                forward_pending(&reconciler).await;
            }
        }
    }
}

/// Decode and apply one frame. Failures stay inside this frame.
///
/// Live events leave the watermark alone; only a completed pull moves it, so
/// a skipped event is fetched again by the next pull.
async fn handle_frame<T: Transport>(reconciler: &Reconciler<T>, text: &str) {
    let event = match SyncEvent::decode(text) {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!("Ignoring malformed live frame: {error}");
            return;
        }
    };

    match reconciler.reconcile(&event).await {
        Ok(outcome) => tracing::debug!("{} -> {outcome:?}", event.operation()),
        Err(error) => tracing::warn!("Failed to apply {}: {error}", event.operation()),
    }
}

/// Send whatever the user queued while the channel is live.
async fn forward_pending<T: Transport>(reconciler: &Reconciler<T>) {
    match outbound::flush(reconciler.store(), reconciler.transport()).await {
        Ok(0) => {}
        Ok(flushed) => tracing::info!("Forwarded {flushed} local changes"),
        Err(Error::UnresolvedReference(message)) => {
            tracing::debug!("Pending queue halted: {message}");
        }
        Err(error) => tracing::warn!("Failed to forward local changes: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, Folder};
    use crate::sync::dto::{FolderDto, UpdatesDto};
    use crate::sync::testing::{folder_dto, frame, panel_dto, panel_folder_dto, FakeTransport};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    async fn engine() -> (SyncEngine<FakeTransport>, Arc<FakeTransport>) {
        let store = LocalStore::open_in_memory().await.unwrap();
        let transport = Arc::new(FakeTransport::new());
        (SyncEngine::new(store, Arc::clone(&transport)), transport)
    }

    async fn wait_until_idle(engine: &SyncEngine<FakeTransport>) {
        let mut states = engine.subscribe();
        states
            .wait_for(|state| *state == SyncState::Idle)
            .await
            .unwrap();
    }

    async fn folders_named(engine: &SyncEngine<FakeTransport>, name: &str) -> Vec<Folder> {
        engine
            .store()
            .list_folders()
            .await
            .unwrap()
            .into_iter()
            .filter(|folder| folder.name == name)
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_now_flushes_then_pulls() {
        let (engine, transport) = engine().await;
        engine.store().create_folder("Mine", None).await.unwrap();
        transport.respond(
            routes::SYNC_UPDATES,
            json!({"folders": [{"id": 7, "name": "Theirs", "eventTimestamp": 100}]}),
        );

        let report = engine.sync_now().await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                flushed: 1,
                updates_applied: 1,
                tombstones_applied: 0,
                watermark: 100,
            }
        );
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.store().summary().await.unwrap().folders, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_token_fails_the_run() {
        let (engine, transport) = engine().await;
        transport.reject_token();
        engine.store().create_folder("Kept", None).await.unwrap();

        let error = engine.sync_now().await.unwrap_err();

        assert!(matches!(error, Error::Api { status: 401, .. }));
        assert!(matches!(engine.state(), SyncState::Failed(_)));
        assert_eq!(engine.store().pending_count().await.unwrap(), 1);
        assert!(transport.posts().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watermark_is_monotonic_and_bounds_the_next_pull() {
        let (engine, transport) = engine().await;
        transport.respond(
            routes::SYNC_UPDATES,
            json!({"links": [{"id": 1, "linkType": "SAVED_LINK", "url": "https://a.example", "eventTimestamp": 100}]}),
        );
        transport.respond(
            routes::SYNC_TOMBSTONES,
            json!([{"operation": "DELETE_A_LINK", "payload": {"id": 99}, "deletedAt": 150}]),
        );
        assert_eq!(engine.sync_now().await.unwrap().watermark, 100);

        transport.respond(routes::SYNC_UPDATES, json!({}));
        transport.respond(routes::SYNC_TOMBSTONES, json!([]));
        let report = engine.sync_now().await.unwrap();

        assert_eq!(report.watermark, 100);
        assert_eq!(report.updates_applied, 0);
        let last_pull = transport
            .gets()
            .into_iter()
            .filter(|(route, _)| route == routes::SYNC_UPDATES)
            .last()
            .unwrap();
        assert_eq!(
            last_pull.1,
            vec![(routes::EVENT_TIMESTAMP_PARAM.to_string(), "100".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tombstones_alone_advance_the_watermark() {
        let (engine, transport) = engine().await;
        engine.store().advance_watermark(50).await.unwrap();
        transport.respond(
            routes::SYNC_TOMBSTONES,
            json!([
                {"operation": "DELETE_A_LINK", "payload": {"id": 98}, "deletedAt": 150},
                {"operation": "DELETE_A_LINK", "payload": {"id": 99}, "deletedAt": 120},
            ]),
        );

        assert_eq!(engine.sync_now().await.unwrap().watermark, 150);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skipped_live_event_is_pulled_again() {
        let (engine, transport) = engine().await;
        let mut folder = folder_dto(1, "Shared", None);
        folder.event_timestamp = 100;
        transport.respond(
            routes::SYNC_UPDATES,
            serde_json::to_value(UpdatesDto {
                folders: vec![folder],
                ..UpdatesDto::default()
            })
            .unwrap(),
        );
        let mut membership = panel_folder_dto(30, 1, 20);
        membership.event_timestamp = 200;
        transport.socket_frames([frame(&SyncEvent::AddFolderToPanel(membership.clone()))]);

        engine.start().await.unwrap();
        wait_until_idle(&engine).await;

        assert_eq!(engine.store().panel_folder_local_id(30).await.unwrap(), None);
        assert_eq!(engine.store().last_synced_timestamp().await.unwrap(), 100);

        let mut panel = panel_dto(20, "Daily");
        panel.event_timestamp = 150;
        transport.respond(
            routes::SYNC_UPDATES,
            serde_json::to_value(UpdatesDto {
                panels: vec![panel],
                panel_folders: vec![membership],
                ..UpdatesDto::default()
            })
            .unwrap(),
        );
        let report = engine.sync_now().await.unwrap();

        let last_pull = transport
            .gets()
            .into_iter()
            .filter(|(route, _)| route == routes::SYNC_UPDATES)
            .last()
            .unwrap();
        assert_eq!(last_pull.1[0].1, "100");
        assert!(engine.store().panel_folder_local_id(30).await.unwrap().is_some());
        assert_eq!(report.watermark, 200);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_changes_are_forwarded_while_live() {
        let (engine, transport) = engine().await;
        transport.hold_socket_open();
        engine.start().await.unwrap();

        let folder = engine.store().create_folder("Live", None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.store().pending_count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, routes::CREATE_FOLDER);
        assert_eq!(
            engine
                .store()
                .remote_id(EntityKind::Folder, folder.local_id)
                .await
                .unwrap(),
            Some(42)
        );
        assert!(engine.is_live());
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tombstone_supersedes_create_in_the_same_pull() {
        let (engine, transport) = engine().await;
        transport.respond(
            routes::SYNC_UPDATES,
            json!({"folders": [{"id": 5, "name": "Doomed", "eventTimestamp": 10}]}),
        );
        transport.respond(
            routes::SYNC_TOMBSTONES,
            json!([{"operation": "DELETE_FOLDER", "payload": {"id": 5}, "deletedAt": 20}]),
        );

        let report = engine.sync_now().await.unwrap();

        assert_eq!(report.tombstones_applied, 1);
        assert_eq!(engine.store().folder_local_id(5).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unresolved_reference_does_not_block_the_pull() {
        let (engine, transport) = engine().await;
        let parent = engine.store().create_folder("Dev", None).await.unwrap();
        let pending = engine.store().pending_operations().await.unwrap();
        engine.store().remove_pending(pending[0].id).await.unwrap();
        engine
            .store()
            .create_folder("Rust", Some(parent.local_id))
            .await
            .unwrap();
        transport.respond(
            routes::SYNC_UPDATES,
            json!({"folders": [{"id": 9, "name": "Remote", "eventTimestamp": 3}]}),
        );

        let report = engine.sync_now().await.unwrap();

        assert_eq!(report.flushed, 0);
        assert_eq!(report.updates_applied, 1);
        assert_eq!(engine.store().pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn own_create_echo_leaves_a_single_folder() {
        let (engine, transport) = engine().await;
        let folder = engine.store().create_folder("A", None).await.unwrap();
        engine.sync_now().await.unwrap();

        let posted = &transport.posts()[0].1;
        let echo = FolderDto {
            correlation: serde_json::from_value(posted["correlation"].clone()).unwrap(),
            ..folder_dto(42, "A", None)
        };
        transport.socket_frames([
            frame(&SyncEvent::CreateFolder(echo.clone())),
            frame(&SyncEvent::UpdateFolder(echo)),
        ]);

        engine.start().await.unwrap();
        wait_until_idle(&engine).await;

        let folders = folders_named(&engine, "A").await;
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].local_id, folder.local_id);
        assert_eq!(folders[0].remote_id, Some(42));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_creates_from_two_clients_stay_distinct() {
        let (engine, transport) = engine().await;
        transport.respond(
            routes::SYNC_UPDATES,
            json!({"folders": [{"id": 1, "name": "Shared", "eventTimestamp": 1}]}),
        );
        engine.sync_now().await.unwrap();
        let parent = engine.store().folder_local_id(1).await.unwrap().unwrap();

        engine
            .store()
            .create_folder("Ideas", Some(parent))
            .await
            .unwrap();
        transport.socket_frames([frame(&SyncEvent::CreateFolder(folder_dto(
            77,
            "Ideas",
            Some(1),
        )))]);
        engine.start().await.unwrap();
        wait_until_idle(&engine).await;

        let ideas = folders_named(&engine, "Ideas").await;
        assert_eq!(ideas.len(), 2);
        assert!(ideas.iter().all(|folder| folder.parent_folder_id == Some(parent)));
        let mut remote_ids: Vec<_> = ideas.iter().map(|folder| folder.remote_id).collect();
        remote_ids.sort();
        assert_eq!(remote_ids, vec![Some(42), Some(77)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_frame_does_not_kill_the_channel() {
        let (engine, transport) = engine().await;
        let mut created = folder_dto(7, "After", None);
        created.event_timestamp = 500;
        transport.socket_frames([
            "{not json".to_string(),
            json!({"operation": "SHRED_EVERYTHING", "payload": {}}).to_string(),
            frame(&SyncEvent::CreateFolder(created)),
        ]);

        engine.start().await.unwrap();
        wait_until_idle(&engine).await;

        assert!(engine.store().folder_local_id(7).await.unwrap().is_some());
        assert_eq!(engine.store().last_synced_timestamp().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_stop_and_restart() {
        let (engine, transport) = engine().await;
        transport.hold_socket_open();

        engine.start().await.unwrap();
        assert!(engine.is_live());

        engine.start().await.unwrap();
        assert!(engine.is_live());
        assert_eq!(transport.sockets_opened(), 2);

        engine.stop().await;
        assert!(!engine.is_live());
        assert_eq!(engine.state(), SyncState::Idle);

        // stopping twice is harmless
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn socket_failure_is_reported() {
        let (engine, transport) = engine().await;
        transport.refuse_socket();

        assert!(engine.start().await.is_err());
        assert!(matches!(engine.state(), SyncState::Failed(_)));
        assert!(!engine.is_live());
    }
}
