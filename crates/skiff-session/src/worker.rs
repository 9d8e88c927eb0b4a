#![allow(clippy::redundant_pub_crate)]

use skiff_events::TransferDirection;
use skiff_telemetry::Metrics;
use skiff_torrent_core::TorrentRow;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::SessionCommand;
use crate::coordinator::{MetadataCompletion, SessionCoordinator};
use crate::error::SessionResult;

pub(crate) fn spawn(
    mut coordinator: SessionCoordinator,
    mut completions: mpsc::UnboundedReceiver<MetadataCompletion>,
    mut commands: mpsc::Receiver<SessionCommand>,
    rows: watch::Sender<Vec<TorrentRow>>,
    metrics: Metrics,
) {
    tokio::spawn(async move {
        let period = coordinator.tick_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = period.as_millis(), "session worker started");
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            let name = command.name();
                            let outcome = handle(&mut coordinator, &rows, command).await;
                            metrics.inc_command(name, outcome);
                        }
                        None => break,
                    }
                }
                Some(completion) = completions.recv() => {
                    coordinator.metadata_resolved(completion).await;
                    rows.send_replace(coordinator.rows());
                }
                _ = ticker.tick() => {
                    rows.send_replace(coordinator.tick());
                }
            }
        }
        info!("session worker stopped");
    });
}

/// Rows are republished before the reply so a caller that awaited a
/// mutation observes it in the watch channel.
async fn handle(
    coordinator: &mut SessionCoordinator,
    rows: &watch::Sender<Vec<TorrentRow>>,
    command: SessionCommand,
) -> &'static str {
    match command {
        SessionCommand::AddMagnet { uri, respond_to } => {
            let result = coordinator.add_magnet(&uri).await;
            rows.send_replace(coordinator.rows());
            reply(respond_to, result)
        }
        SessionCommand::ToggleWant { id, respond_to } => {
            let result = coordinator.toggle_want(id).await;
            rows.send_replace(coordinator.rows());
            reply(respond_to, result)
        }
        SessionCommand::Remove { id, respond_to } => {
            let result = coordinator.remove(id).await;
            rows.send_replace(coordinator.rows());
            reply(respond_to, result)
        }
        SessionCommand::SetRateLimit {
            direction,
            limit,
            respond_to,
        } => {
            let result = match direction {
                TransferDirection::Upload => coordinator.set_upload_limit(limit).await,
                TransferDirection::Download => coordinator.set_download_limit(limit).await,
            };
            reply(respond_to, result)
        }
        SessionCommand::Tick { respond_to } => {
            let ticked = coordinator.tick();
            rows.send_replace(ticked.clone());
            let _ = respond_to.send(ticked);
            "ok"
        }
        SessionCommand::Selected { id, respond_to } => {
            let _ = respond_to.send(coordinator.selected(id));
            "ok"
        }
        SessionCommand::Details { id, respond_to } => {
            let _ = respond_to.send(coordinator.details(id));
            "ok"
        }
    }
}

fn reply<T>(
    respond_to: tokio::sync::oneshot::Sender<SessionResult<T>>,
    result: SessionResult<T>,
) -> &'static str {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => {
            warn!(outcome = err.outcome(), error = %err, "session command failed");
            err.outcome()
        }
    };
    if respond_to.send(result).is_err() {
        debug!(outcome, "session caller went away before the reply");
    }
    outcome
}
