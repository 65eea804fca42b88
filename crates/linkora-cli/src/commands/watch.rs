use std::path::Path;

use linkora_core::SyncState;

use crate::commands::common::build_engine;
use crate::commands::sync::format_report;
use crate::error::CliError;

pub async fn run_watch(db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let engine = build_engine(db_path, profile).await?;
    let mut states = engine.subscribe();

    let report = engine.start().await?;
    for line in format_report(&report) {
        println!("{line}");
    }
    println!("Following live changes. Press Ctrl-C to stop.");

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(CliError::from);
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = states.borrow_and_update().clone();
                match state {
                    SyncState::Failed(message) => break Err(CliError::LiveSync(message)),
                    SyncState::Idle => {
                        println!("Server closed the live channel");
                        break Ok(());
                    }
                    _ => {}
                }
            }
        }
    };

    engine.stop().await;
    outcome
}
