//! Pull of everything changed on the server since the watermark.

use std::collections::{HashMap, HashSet};

use super::dto::{PanelDto, UpdatesDto};
use super::materialize::{materialize_folder, FolderBatch};
use super::reconciler::{Outcome, Reconciler};
use super::routes;
use super::transport::Transport;
use crate::error::Result;
use crate::models::RemoteId;

/// Fetch the server's changes after `since`.
pub async fn fetch<T: Transport>(transport: &T, since: i64) -> Result<UpdatesDto> {
    let value = transport
        .get(
            routes::SYNC_UPDATES,
            &[(routes::EVENT_TIMESTAMP_PARAM, since.to_string())],
        )
        .await?;
    if value.is_null() {
        return Ok(UpdatesDto::default());
    }
    Ok(serde_json::from_value(value)?)
}

/// Apply a pulled batch as server truth, returning how many entities were
/// written.
///
/// Folders go first and in dependency order, since links and panel
/// memberships resolve their folders by remote id. The remaining kinds are
/// independent of each other and are applied concurrently.
pub async fn apply<T: Transport>(reconciler: &Reconciler<T>, updates: &UpdatesDto) -> Result<usize> {
    if updates.is_empty() {
        return Ok(0);
    }

    let folders = apply_folders(reconciler, updates).await?;
    let (links, panels, panel_folders) = tokio::try_join!(
        apply_links(reconciler, updates),
        apply_panels(reconciler, updates),
        apply_panel_folders(reconciler, updates),
    )?;

    let applied = folders + links + panels + panel_folders;
    tracing::info!(
        "Applied {applied} pulled changes ({folders} folders, {links} links, {panels} panels, {panel_folders} panel folders)"
    );
    Ok(applied)
}

async fn apply_folders<T: Transport>(
    reconciler: &Reconciler<T>,
    updates: &UpdatesDto,
) -> Result<usize> {
    let batch: FolderBatch<'_> = updates.folders.iter().map(|dto| (dto.id, dto)).collect();
    let mut processed = HashSet::new();

    let mut written = 0;
    for folder in &updates.folders {
        written += materialize_folder(
            reconciler.store(),
            reconciler.transport(),
            folder,
            &batch,
            &mut processed,
        )
        .await?;
    }
    Ok(written)
}

async fn apply_links<T: Transport>(reconciler: &Reconciler<T>, updates: &UpdatesDto) -> Result<usize> {
    let mut written = 0;
    for link in &updates.links {
        if reconciler.upsert_link(link).await? == Outcome::Applied {
            written += 1;
        }
    }
    Ok(written)
}

async fn apply_panels<T: Transport>(
    reconciler: &Reconciler<T>,
    updates: &UpdatesDto,
) -> Result<usize> {
    let mut written = 0;
    for panel in &updates.panels {
        if reconciler.upsert_panel(panel).await? == Outcome::Applied {
            written += 1;
        }
    }
    Ok(written)
}

/// Memberships may be applied before their panel lands; a panel from the same
/// batch is written on demand.
async fn apply_panel_folders<T: Transport>(
    reconciler: &Reconciler<T>,
    updates: &UpdatesDto,
) -> Result<usize> {
    let panels: HashMap<RemoteId, &PanelDto> = updates
        .panels
        .iter()
        .map(|dto| (dto.panel_id, dto))
        .collect();

    let mut written = 0;
    for panel_folder in &updates.panel_folders {
        let store = reconciler.store();
        if store
            .panel_local_id(panel_folder.connected_panel_id)
            .await?
            .is_none()
        {
            if let Some(panel) = panels.get(&panel_folder.connected_panel_id) {
                reconciler.upsert_panel(panel).await?;
            }
        }

        if reconciler.add_panel_folder(panel_folder).await? == Outcome::Applied {
            written += 1;
        }
    }
    Ok(written)
}
