use std::path::Path;

use linkora_core::StoreSummary;
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_store};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub client_name: String,
    pub db_path: String,
    pub last_synced_timestamp: i64,
    pub last_synced: String,
    #[serde(flatten)]
    pub summary: StoreSummary,
}

pub async fn run_status(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let watermark = store.last_synced_timestamp().await?;
    let status = StatusItem {
        client_name: store.identity().client_name().to_string(),
        db_path: db_path.display().to_string(),
        last_synced_timestamp: watermark,
        last_synced: format_sync_timestamp(watermark),
        summary: store.summary().await?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in format_status_lines(&status) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(status: &StatusItem) -> Vec<String> {
    vec![
        format!("Client:        {}", status.client_name),
        format!("Database:      {}", status.db_path),
        format!("Last synced:   {}", status.last_synced),
        format!("Pending:       {}", status.summary.pending),
        format!(
            "Local entries: {} folders, {} links, {} panels, {} panel folders",
            status.summary.folders,
            status.summary.links,
            status.summary.panels,
            status.summary.panel_folders
        ),
    ]
}
