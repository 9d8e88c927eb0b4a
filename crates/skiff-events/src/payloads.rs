//! Event payload types carried from the session coordinator to views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::InfoHash;

/// Identifier assigned to each event emitted by the coordinator.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed change notifications surfaced to views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A torrent started being tracked.
    TorrentAdded {
        /// Identity of the new torrent.
        torrent_id: InfoHash,
        /// Name shown until metadata is available.
        name: String,
    },
    /// A torrent stopped being tracked and was dropped from the engine.
    TorrentRemoved {
        /// Identity of the removed torrent.
        torrent_id: InfoHash,
    },
    /// The user flipped the desired state of a torrent.
    WantChanged {
        /// Identity of the torrent.
        torrent_id: InfoHash,
        /// `true` when the torrent should now be downloading.
        active: bool,
    },
    /// The engine finished resolving a torrent's file and piece layout.
    MetadataResolved {
        /// Identity of the torrent.
        torrent_id: InfoHash,
        /// Display name taken from the metadata.
        name: String,
        /// Number of pieces in the torrent.
        piece_count: u32,
    },
    /// A process-wide transfer limit changed.
    RateLimitChanged {
        /// Which limiter changed.
        direction: TransferDirection,
        /// New cap in bytes per second; `None` means unlimited.
        bytes_per_second: Option<u64>,
    },
    /// A refresh tick completed and new rows are available.
    Ticked {
        /// Logical tick index.
        tick: u64,
        /// Number of rows in the refreshed snapshot.
        torrents: usize,
    },
    /// Component health changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator used for metrics labels and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TorrentAdded { .. } => "torrent_added",
            Self::TorrentRemoved { .. } => "torrent_removed",
            Self::WantChanged { .. } => "want_changed",
            Self::MetadataResolved { .. } => "metadata_resolved",
            Self::RateLimitChanged { .. } => "rate_limit_changed",
            Self::Ticked { .. } => "ticked",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Direction of a process-wide rate limiter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Data sent to peers.
    Upload,
    /// Data received from peers.
    Download,
}

impl TransferDirection {
    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

/// Lifecycle phase derived for a torrent on every refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentPhase {
    /// Metadata is not known yet.
    FetchingMetadata,
    /// The engine reports the torrent as seeding.
    Seeding,
    /// The user paused the torrent.
    Paused,
    /// No bytes are missing.
    Finished,
    /// The torrent is transferring payload data.
    Downloading,
}

impl TorrentPhase {
    /// Status column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FetchingMetadata => "starting",
            Self::Seeding => "seeding",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Downloading => "downloading",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}
