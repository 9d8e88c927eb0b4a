//! Core torrent domain types shared across the workspace.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skiff_events::{InfoHash, TorrentPhase};

use crate::metrics::{Eta, TransferRate};

/// What the user wants a torrent to be doing. Only user actions change it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    /// Download whenever metadata is available.
    #[default]
    Active,
    /// Hold all piece requests.
    Paused,
}

impl DesiredState {
    /// The opposite state.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Paused,
            Self::Paused => Self::Active,
        }
    }

    /// Whether the torrent should be downloading.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Label for the control that flips this state.
    #[must_use]
    pub const fn action_label(self) -> &'static str {
        match self {
            Self::Active => "pause",
            Self::Paused => "start",
        }
    }
}

/// Derive the lifecycle phase. Earlier checks take precedence over later ones.
#[must_use]
pub const fn derive_phase(
    metadata_known: bool,
    seeding: bool,
    desired: DesiredState,
    bytes_missing: u64,
) -> TorrentPhase {
    if !metadata_known {
        TorrentPhase::FetchingMetadata
    } else if seeding {
        TorrentPhase::Seeding
    } else if !desired.is_active() {
        TorrentPhase::Paused
    } else if bytes_missing == 0 {
        TorrentPhase::Finished
    } else {
        TorrentPhase::Downloading
    }
}

/// Cumulative payload counters captured at a logical tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateSample {
    /// Payload bytes received from peers since the torrent was added.
    pub downloaded: u64,
    /// Payload bytes sent to peers since the torrent was added.
    pub uploaded: u64,
    /// Tick index at which the counters were read.
    pub captured_at: u64,
}

impl RateSample {
    /// Sample the payload counters out of an engine stats snapshot.
    #[must_use]
    pub const fn from_stats(stats: &TorrentStats, captured_at: u64) -> Self {
        Self {
            downloaded: stats.data_bytes_read,
            uploaded: stats.data_bytes_written,
            captured_at,
        }
    }

    /// Bytes downloaded since `earlier`; `None` when the counter went backwards.
    #[must_use]
    pub const fn downloaded_since(&self, earlier: &Self) -> Option<u64> {
        self.downloaded.checked_sub(earlier.downloaded)
    }

    /// Bytes uploaded since `earlier`; `None` when the counter went backwards.
    #[must_use]
    pub const fn uploaded_since(&self, earlier: &Self) -> Option<u64> {
        self.uploaded.checked_sub(earlier.uploaded)
    }
}

/// A file inside a torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentFile {
    /// Path relative to the torrent root, `/`-separated.
    pub path: String,
    /// File length in bytes.
    pub size_bytes: u64,
}

/// Layout reported by the engine once metadata is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TorrentInfo {
    /// Display name.
    pub name: String,
    /// Number of pieces.
    pub piece_count: u32,
    /// Piece length in bytes.
    pub piece_length: u64,
    /// Files in the torrent.
    pub files: Vec<TorrentFile>,
    /// Tiered announce list as published in the metainfo.
    pub announce: Vec<Vec<String>>,
}

impl TorrentInfo {
    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files
            .iter()
            .fold(0_u64, |acc, file| acc.saturating_add(file.size_bytes))
    }

    /// Announce URLs across every tier, deduplicated and sorted.
    #[must_use]
    pub fn distinct_announces(&self) -> Vec<String> {
        self.announce
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Point-in-time counters reported by the engine for one torrent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TorrentStats {
    /// Verified bytes on disk.
    pub bytes_completed: u64,
    /// Bytes still required.
    pub bytes_missing: u64,
    /// Peers with an established connection.
    pub active_peers: u32,
    /// Outbound connections still handshaking.
    pub half_open_peers: u32,
    /// Known peers waiting for a connection slot.
    pub pending_peers: u32,
    /// Every peer the engine knows about.
    pub total_peers: u32,
    /// Wire bytes received, including protocol overhead.
    pub bytes_read: u64,
    /// Wire bytes sent, including protocol overhead.
    pub bytes_written: u64,
    /// Payload bytes received.
    pub data_bytes_read: u64,
    /// Payload bytes sent.
    pub data_bytes_written: u64,
    /// Piece chunks received.
    pub chunks_read: u64,
    /// Piece chunks sent.
    pub chunks_written: u64,
}

/// One line of the torrent table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentRow {
    /// Torrent identity.
    pub id: InfoHash,
    /// Derived lifecycle phase.
    pub phase: TorrentPhase,
    /// What the user asked for.
    pub desired: DesiredState,
    /// Metadata name, magnet display name, or the hex identity.
    pub name: String,
    /// Completed bytes; `None` before metadata.
    pub completed: Option<u64>,
    /// Total bytes; `None` before metadata.
    pub total: Option<u64>,
    /// Estimated time to completion.
    pub eta: Eta,
    /// Instantaneous transfer rates.
    pub rate: TransferRate,
}

impl TorrentRow {
    /// Row for a torrent nothing has been sampled for yet.
    #[must_use]
    pub fn placeholder(id: InfoHash, name: String, desired: DesiredState) -> Self {
        Self {
            id,
            phase: TorrentPhase::FetchingMetadata,
            desired,
            name,
            completed: None,
            total: None,
            eta: Eta::Unknown,
            rate: TransferRate::UNKNOWN,
        }
    }
}

/// Per-torrent state owned by the session coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentRecord {
    /// Torrent identity.
    pub id: InfoHash,
    /// What the user asked for.
    pub desired: DesiredState,
    /// Sample before `current`.
    pub previous: Option<RateSample>,
    /// Most recent sample.
    pub current: Option<RateSample>,
    /// Display name carried by the magnet link.
    pub name_hint: Option<String>,
    /// Distinguishes successive adds of the same identity.
    pub generation: u64,
    /// When the record was created.
    pub added_at: DateTime<Utc>,
    /// Last derived display fields.
    pub row: TorrentRow,
}

impl TorrentRecord {
    /// Fresh record in the `Active` state with no samples.
    #[must_use]
    pub fn new(id: InfoHash, name_hint: Option<String>, generation: u64) -> Self {
        let desired = DesiredState::Active;
        let name = name_hint.clone().unwrap_or_else(|| id.to_hex());
        Self {
            id,
            desired,
            previous: None,
            current: None,
            name_hint,
            generation,
            added_at: Utc::now(),
            row: TorrentRow::placeholder(id, name, desired),
        }
    }

    /// Name to display when the engine has no metadata.
    #[must_use]
    pub fn fallback_name(&self) -> String {
        self.name_hint.clone().unwrap_or_else(|| self.id.to_hex())
    }

    /// Rotate `current` into `previous` and store `sample`.
    ///
    /// Samples that are not strictly newer than `current` are ignored and
    /// `false` is returned.
    pub fn push_sample(&mut self, sample: RateSample) -> bool {
        if let Some(current) = self.current
            && sample.captured_at <= current.captured_at
        {
            return false;
        }
        self.previous = self.current.replace(sample);
        true
    }

    /// Previous and current samples, when both exist.
    #[must_use]
    pub fn sample_pair(&self) -> Option<(RateSample, RateSample)> {
        self.previous.zip(self.current)
    }
}

/// Metadata portion of the details payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataSummary {
    /// Display name.
    pub name: String,
    /// Number of pieces.
    pub piece_count: u32,
    /// Piece length in bytes.
    pub piece_length: u64,
    /// Files with sizes.
    pub files: Vec<TorrentFile>,
    /// Announce URLs, deduplicated and sorted.
    pub announces: Vec<String>,
}

impl From<&TorrentInfo> for MetadataSummary {
    fn from(info: &TorrentInfo) -> Self {
        Self {
            name: info.name.clone(),
            piece_count: info.piece_count,
            piece_length: info.piece_length,
            files: info.files.clone(),
            announces: info.distinct_announces(),
        }
    }
}

/// Everything the details pane shows for one torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentDetails {
    /// Torrent identity.
    pub id: InfoHash,
    /// What the user asked for.
    pub desired: DesiredState,
    /// When the torrent was added to the session.
    pub added_at: DateTime<Utc>,
    /// `None` while metadata is still being fetched.
    pub metadata: Option<MetadataSummary>,
    /// Connection counters; `None` when the engine reports nothing.
    pub connection: Option<TorrentStats>,
}

impl TorrentDetails {
    /// Whether the engine is still resolving metadata.
    #[must_use]
    pub const fn fetching_metadata(&self) -> bool {
        self.metadata.is_none()
    }
}
