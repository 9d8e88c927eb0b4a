//! # Design
//!
//! - Keep error messages constant; store operational context in fields.
//! - Every variant is recoverable; the session loop never stops on one.

use std::error::Error;

use skiff_events::InfoHash;
use skiff_torrent_core::{MagnetError, RateInputError};
use thiserror::Error;

/// Errors returned by session coordinator operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The magnet URI failed local validation; nothing was sent to the engine.
    #[error("invalid magnet uri")]
    InvalidMagnet {
        /// Validation failure.
        #[source]
        source: MagnetError,
    },
    /// The engine refused or failed the requested operation.
    #[error("download engine rejected the request")]
    EngineRejected {
        /// Engine operation that failed.
        operation: &'static str,
        /// Engine-reported failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No record exists for the identity.
    #[error("torrent not tracked")]
    NotFound {
        /// Identity that was looked up.
        torrent_id: InfoHash,
    },
    /// A rate limit was not a usable value; limiters were left untouched.
    #[error("invalid rate limit")]
    InvalidRate {
        /// Parse or range failure.
        #[source]
        source: RateInputError,
    },
    /// The session loop has stopped.
    #[error("session loop closed")]
    Closed,
}

impl SessionError {
    /// Short outcome label used for metrics.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidMagnet { .. } => "invalid_magnet",
            Self::EngineRejected { .. } => "engine_rejected",
            Self::NotFound { .. } => "not_found",
            Self::InvalidRate { .. } => "invalid_rate",
            Self::Closed => "closed",
        }
    }
}

/// Convenience alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;
