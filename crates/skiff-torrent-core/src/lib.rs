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

//! Engine-agnostic torrent model, derived-metric math, and the download engine contract.
//!
//! Layout: `model` (records, samples, rows, details), `magnet` (URI validation),
//! `metrics` (rate and ETA), `rate` (user rate-limit input), `format` (column text),
//! `service` (the `DownloadEngine` trait), `error` (`TorrentError`).

pub mod error;
pub mod format;
pub mod magnet;
pub mod metrics;
pub mod model;
pub mod rate;
pub mod service;

pub use error::TorrentError;
pub use magnet::{Magnet, MagnetError};
pub use metrics::{Eta, TransferRate};
pub use model::{
    DesiredState, MetadataSummary, RateSample, TorrentDetails, TorrentFile, TorrentInfo,
    TorrentRecord, TorrentRow, TorrentStats, derive_phase,
};
pub use rate::{RateInputError, RateLimit, parse_rate_input};
pub use service::{DownloadEngine, MetadataSignal};
