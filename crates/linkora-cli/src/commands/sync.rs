use std::path::Path;

use linkora_core::SyncReport;

use crate::commands::common::{build_engine, format_sync_timestamp};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let engine = build_engine(db_path, profile).await?;
    let report = engine.sync_now().await?;

    for line in format_report(&report) {
        println!("{line}");
    }

    let pending = engine.store().pending_count().await?;
    if pending > 0 {
        println!("{pending} changes are still waiting for the server");
    }
    Ok(())
}

pub fn format_report(report: &SyncReport) -> Vec<String> {
    vec![
        "Sync completed".to_string(),
        format!("  sent:       {}", report.flushed),
        format!("  updates:    {}", report.updates_applied),
        format!("  tombstones: {}", report.tombstones_applied),
        format!("  synced to:  {}", format_sync_timestamp(report.watermark)),
    ]
}
