use skiff_events::{InfoHash, TransferDirection};
use skiff_torrent_core::{DesiredState, RateLimit, TorrentDetails, TorrentRecord, TorrentRow};
use tokio::sync::oneshot;

use crate::error::SessionResult;

/// Requests processed by the session worker, each with its reply channel.
#[derive(Debug)]
pub enum SessionCommand {
    /// Validate and submit a magnet link.
    AddMagnet {
        /// Magnet URI as entered by the user.
        uri: String,
        /// Identity of the tracked torrent.
        respond_to: oneshot::Sender<SessionResult<InfoHash>>,
    },
    /// Flip the desired state of a torrent.
    ToggleWant {
        /// Torrent identity.
        id: InfoHash,
        /// Desired state after the flip.
        respond_to: oneshot::Sender<SessionResult<DesiredState>>,
    },
    /// Stop tracking a torrent.
    Remove {
        /// Torrent identity.
        id: InfoHash,
        /// Completion signal.
        respond_to: oneshot::Sender<SessionResult<()>>,
    },
    /// Apply a process-wide rate cap.
    SetRateLimit {
        /// Which limiter to change.
        direction: TransferDirection,
        /// New cap.
        limit: RateLimit,
        /// Completion signal.
        respond_to: oneshot::Sender<SessionResult<()>>,
    },
    /// Sample all torrents immediately.
    Tick {
        /// Refreshed rows.
        respond_to: oneshot::Sender<Vec<TorrentRow>>,
    },
    /// Look up the record for a torrent.
    Selected {
        /// Torrent identity.
        id: InfoHash,
        /// Record snapshot, if tracked.
        respond_to: oneshot::Sender<Option<TorrentRecord>>,
    },
    /// Build the details payload for a torrent.
    Details {
        /// Torrent identity.
        id: InfoHash,
        /// Details, if tracked.
        respond_to: oneshot::Sender<Option<TorrentDetails>>,
    },
}

impl SessionCommand {
    /// Label used for command metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddMagnet { .. } => "add_magnet",
            Self::ToggleWant { .. } => "toggle_want",
            Self::Remove { .. } => "remove",
            Self::SetRateLimit {
                direction: TransferDirection::Upload,
                ..
            } => "set_upload_limit",
            Self::SetRateLimit {
                direction: TransferDirection::Download,
                ..
            } => "set_download_limit",
            Self::Tick { .. } => "tick",
            Self::Selected { .. } => "selected",
            Self::Details { .. } => "details",
        }
    }
}
