#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Session coordinator that sits between a download engine and a passive view.
//!
//! A single worker task owns all torrent records. Callers talk to it through
//! a cloneable [`SessionHandle`]; the worker samples the engine on a fixed
//! tick and publishes refreshed rows on a watch channel.

/// Worker command definitions.
pub mod command;
/// Record bookkeeping and derivation logic.
pub mod coordinator;
/// Bundled engine implementations.
pub mod engine;
/// Error types returned by session operations.
pub mod error;
mod worker;

pub use coordinator::{MetadataCompletion, SessionCoordinator};
pub use engine::{EngineCall, MemoryEngine};
pub use error::{SessionError, SessionResult};

use std::sync::Arc;
use std::time::Duration;

use skiff_events::{EventBus, EventId, EventStream, InfoHash, TransferDirection};
use skiff_telemetry::Metrics;
use skiff_torrent_core::{
    DesiredState, DownloadEngine, RateLimit, TorrentDetails, TorrentRecord, TorrentRow,
    parse_rate_input,
};
use tokio::sync::{mpsc, oneshot, watch};

use command::SessionCommand;

/// Default sampling period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);
/// Default command queue depth.
pub const DEFAULT_COMMAND_BUFFER: usize = 128;

/// Runtime knobs for the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period between samples; also the nominal interval for rate math.
    pub tick_interval: Duration,
    /// Pending commands allowed before callers wait.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

/// Cloneable front door to the session worker.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    rows: watch::Receiver<Vec<TorrentRow>>,
    events: EventBus,
}

impl SessionHandle {
    /// Start the worker and return a handle to it.
    ///
    /// The worker stops once every handle is dropped. Zero-valued settings
    /// fall back to the defaults.
    #[must_use]
    pub fn spawn(
        engine: Arc<dyn DownloadEngine>,
        events: EventBus,
        metrics: Metrics,
        config: SessionConfig,
    ) -> Self {
        let tick_interval = if config.tick_interval.is_zero() {
            DEFAULT_TICK_INTERVAL
        } else {
            config.tick_interval
        };
        let buffer = if config.command_buffer == 0 {
            DEFAULT_COMMAND_BUFFER
        } else {
            config.command_buffer
        };

        let (coordinator, completions) =
            SessionCoordinator::new(engine, events.clone(), metrics.clone(), tick_interval);
        let (commands, receiver) = mpsc::channel(buffer);
        let (rows_tx, rows) = watch::channel(Vec::new());
        worker::spawn(coordinator, completions, receiver, rows_tx, metrics);
        Self {
            commands,
            rows,
            events,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> SessionResult<T> {
        let (respond_to, reply) = oneshot::channel();
        self.commands
            .send(build(respond_to))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply.await.map_err(|_| SessionError::Closed)
    }

    /// Validate `uri` and start tracking the torrent it names.
    ///
    /// # Errors
    ///
    /// See [`SessionCoordinator::add_magnet`]; [`SessionError::Closed`] when
    /// the worker has stopped.
    pub async fn add_magnet(&self, uri: impl Into<String>) -> SessionResult<InfoHash> {
        let uri = uri.into();
        self.request(|respond_to| SessionCommand::AddMagnet { uri, respond_to })
            .await?
    }

    /// Flip the desired state of `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when `id` is not tracked.
    pub async fn toggle_want(&self, id: InfoHash) -> SessionResult<DesiredState> {
        self.request(|respond_to| SessionCommand::ToggleWant { id, respond_to })
            .await?
    }

    /// Stop tracking `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when `id` is not tracked.
    pub async fn remove(&self, id: InfoHash) -> SessionResult<()> {
        self.request(|respond_to| SessionCommand::Remove { id, respond_to })
            .await?
    }

    /// Apply a process-wide upload cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] or [`SessionError::EngineRejected`].
    pub async fn set_upload_limit(&self, limit: RateLimit) -> SessionResult<()> {
        self.set_limit(TransferDirection::Upload, limit).await
    }

    /// Apply a process-wide download cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] or [`SessionError::EngineRejected`].
    pub async fn set_download_limit(&self, limit: RateLimit) -> SessionResult<()> {
        self.set_limit(TransferDirection::Download, limit).await
    }

    /// Parse KiB/s text and apply it as the upload cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] when the text is not a usable rate.
    pub async fn apply_upload_limit_text(&self, text: &str) -> SessionResult<()> {
        let limit = parse_rate_input(text).map_err(|source| SessionError::InvalidRate { source })?;
        self.set_upload_limit(limit).await
    }

    /// Parse KiB/s text and apply it as the download cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] when the text is not a usable rate.
    pub async fn apply_download_limit_text(&self, text: &str) -> SessionResult<()> {
        let limit = parse_rate_input(text).map_err(|source| SessionError::InvalidRate { source })?;
        self.set_download_limit(limit).await
    }

    async fn set_limit(&self, direction: TransferDirection, limit: RateLimit) -> SessionResult<()> {
        self.request(|respond_to| SessionCommand::SetRateLimit {
            direction,
            limit,
            respond_to,
        })
        .await?
    }

    /// Sample every torrent now instead of waiting for the next tick.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] when the worker has stopped.
    pub async fn tick(&self) -> SessionResult<Vec<TorrentRow>> {
        self.request(|respond_to| SessionCommand::Tick { respond_to })
            .await
    }

    /// Snapshot of the record for `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] when the worker has stopped.
    pub async fn selected(&self, id: InfoHash) -> SessionResult<Option<TorrentRecord>> {
        self.request(|respond_to| SessionCommand::Selected { id, respond_to })
            .await
    }

    /// Details pane payload for `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] when the worker has stopped.
    pub async fn details(&self, id: InfoHash) -> SessionResult<Option<TorrentDetails>> {
        self.request(|respond_to| SessionCommand::Details { id, respond_to })
            .await
    }

    /// Rows as last published by the worker.
    #[must_use]
    pub fn rows_snapshot(&self) -> Vec<TorrentRow> {
        self.rows.borrow().clone()
    }

    /// Watch channel that changes after every tick and row-affecting command.
    #[must_use]
    pub fn rows(&self) -> watch::Receiver<Vec<TorrentRow>> {
        self.rows.clone()
    }

    /// Subscribe to session events, replaying those after `since`.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        self.events.subscribe(since)
    }
}
