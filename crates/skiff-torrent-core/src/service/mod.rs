//! Engine trait implemented by download backends.

use std::ops::Range;

use async_trait::async_trait;
use skiff_events::InfoHash;
use tokio::sync::oneshot;

use crate::model::{TorrentInfo, TorrentStats};

/// Fires once when a torrent's metadata is known. If the torrent is dropped
/// first, the sender is dropped and the receiver resolves to an error.
pub type MetadataSignal = oneshot::Receiver<()>;

/// Contract the session coordinator needs from a download engine.
///
/// Query methods are synchronous snapshots and must not block on the network.
/// Mutating methods are async and return `anyhow::Result` so engines can
/// surface their own failure types.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Submit a magnet URI and return the identity the engine assigned.
    async fn add_magnet(&self, uri: &str) -> anyhow::Result<InfoHash>;

    /// One-shot signal for metadata resolution of `id`.
    fn metadata_ready(&self, id: InfoHash) -> MetadataSignal;

    /// Metadata for `id`, once resolved.
    fn info(&self, id: InfoHash) -> Option<TorrentInfo>;

    /// Current counters for `id`.
    fn stats(&self, id: InfoHash) -> Option<TorrentStats>;

    /// Whether the engine considers `id` to be seeding.
    fn is_seeding(&self, id: InfoHash) -> bool;

    /// Request every piece of `id`.
    async fn download_all(&self, id: InfoHash) -> anyhow::Result<()>;

    /// Withdraw requests for the pieces in `pieces`.
    async fn cancel_pieces(&self, id: InfoHash, pieces: Range<u32>) -> anyhow::Result<()>;

    /// Stop tracking `id` inside the engine.
    async fn drop_torrent(&self, id: InfoHash) -> anyhow::Result<()>;

    /// Set the process-wide upload cap; `None` removes it.
    async fn set_upload_rate_limit(&self, bytes_per_second: Option<u64>) -> anyhow::Result<()>;

    /// Set the process-wide download cap; `None` removes it.
    async fn set_download_rate_limit(&self, bytes_per_second: Option<u64>)
    -> anyhow::Result<()>;
}
