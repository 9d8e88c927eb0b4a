//! Error types for torrent core services.

use std::error::Error;

use skiff_events::InfoHash;
use thiserror::Error;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Operation failed in the underlying engine.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent identifier when available.
        torrent_id: Option<InfoHash>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Torrent was not found.
    #[error("torrent not found")]
    NotFound {
        /// Missing torrent identifier.
        torrent_id: InfoHash,
    },
}
