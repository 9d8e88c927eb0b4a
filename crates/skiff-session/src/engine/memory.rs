use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use skiff_events::InfoHash;
use skiff_torrent_core::{
    DownloadEngine, Magnet, MetadataSignal, TorrentError, TorrentFile, TorrentInfo, TorrentStats,
};
use tokio::sync::oneshot;

const SIMULATED_SIZE: u64 = 64 * 1_024 * 1_024;
const SIMULATED_PIECE_LENGTH: u64 = 256 * 1_024;
const SIMULATED_RATE: u64 = 512 * 1_024;
const CHUNK_SIZE: u64 = 16 * 1_024;
const WIRE_OVERHEAD_PERCENT: u64 = 3;

/// Engine call recorded by [`MemoryEngine`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `add_magnet` accepted a torrent.
    AddMagnet(InfoHash),
    /// `download_all` was requested.
    DownloadAll(InfoHash),
    /// `cancel_pieces` was requested.
    CancelPieces(InfoHash, Range<u32>),
    /// `drop_torrent` was requested.
    DropTorrent(InfoHash),
    /// The upload limiter changed.
    UploadLimit(Option<u64>),
    /// The download limiter changed.
    DownloadLimit(Option<u64>),
}

/// In-memory download engine used by tests and the binary's demo mode.
///
/// Nothing touches the network. Tests drive progress explicitly through
/// [`MemoryEngine::resolve_metadata`] and [`MemoryEngine::record_transfer`];
/// the demo calls [`MemoryEngine::advance`] on a timer.
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    torrents: HashMap<InfoHash, MemoryTorrent>,
    upload_limit: Option<u64>,
    download_limit: Option<u64>,
    accepting: bool,
    failing: BTreeSet<&'static str>,
    calls: Vec<EngineCall>,
}

#[derive(Default)]
struct MemoryTorrent {
    display_name: Option<String>,
    trackers: Vec<String>,
    info: Option<TorrentInfo>,
    stats: TorrentStats,
    seeding: bool,
    downloading: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

impl MemoryTorrent {
    fn apply_download(&mut self, bytes: u64) {
        let bytes = bytes.min(self.stats.bytes_missing);
        let stats = &mut self.stats;
        stats.bytes_completed = stats.bytes_completed.saturating_add(bytes);
        stats.bytes_missing -= bytes;
        stats.data_bytes_read = stats.data_bytes_read.saturating_add(bytes);
        stats.bytes_read = stats
            .bytes_read
            .saturating_add(bytes + bytes * WIRE_OVERHEAD_PERCENT / 100);
        stats.chunks_read = stats.chunks_read.saturating_add(bytes.div_ceil(CHUNK_SIZE));
    }

    fn apply_upload(&mut self, bytes: u64) {
        let stats = &mut self.stats;
        stats.data_bytes_written = stats.data_bytes_written.saturating_add(bytes);
        stats.bytes_written = stats
            .bytes_written
            .saturating_add(bytes + bytes * WIRE_OVERHEAD_PERCENT / 100);
        stats.chunks_written = stats
            .chunks_written
            .saturating_add(bytes.div_ceil(CHUNK_SIZE));
    }

    fn resolve(&mut self, info: TorrentInfo) {
        self.stats.bytes_missing = info.total_size().saturating_sub(self.stats.bytes_completed);
        self.info = Some(info);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn synthetic_info(&self, id: InfoHash) -> TorrentInfo {
        let name = self.display_name.clone().unwrap_or_else(|| id.to_hex());
        TorrentInfo {
            files: vec![TorrentFile {
                path: format!("{name}/payload.bin"),
                size_bytes: SIMULATED_SIZE,
            }],
            piece_count: u32::try_from(SIMULATED_SIZE.div_ceil(SIMULATED_PIECE_LENGTH))
                .unwrap_or(u32::MAX),
            piece_length: SIMULATED_PIECE_LENGTH,
            announce: vec![self.trackers.clone()],
            name,
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Empty engine that accepts every well-formed magnet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                torrents: HashMap::new(),
                upload_limit: None,
                download_limit: None,
                accepting: true,
                failing: BTreeSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle whether `add_magnet` accepts new torrents.
    pub fn set_accepting(&self, accepting: bool) {
        self.lock().accepting = accepting;
    }

    /// Make the named trait operation fail until [`Self::clear_failures`].
    pub fn fail_operation(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Publish metadata for `id` and wake metadata waiters.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine does not know `id`.
    pub fn resolve_metadata(&self, id: InfoHash, info: TorrentInfo) -> Result<()> {
        let mut state = self.lock();
        let torrent = state
            .torrents
            .get_mut(&id)
            .ok_or(TorrentError::NotFound { torrent_id: id })?;
        torrent.resolve(info);
        Ok(())
    }

    /// Add payload traffic to the cumulative counters of `id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine does not know `id`.
    pub fn record_transfer(&self, id: InfoHash, downloaded: u64, uploaded: u64) -> Result<()> {
        let mut state = self.lock();
        let torrent = state
            .torrents
            .get_mut(&id)
            .ok_or(TorrentError::NotFound { torrent_id: id })?;
        torrent.apply_download(downloaded);
        torrent.apply_upload(uploaded);
        Ok(())
    }

    /// Overwrite the counters of `id`, e.g. to simulate a counter reset.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine does not know `id`.
    pub fn set_stats(&self, id: InfoHash, stats: TorrentStats) -> Result<()> {
        let mut state = self.lock();
        let torrent = state
            .torrents
            .get_mut(&id)
            .ok_or(TorrentError::NotFound { torrent_id: id })?;
        torrent.stats = stats;
        Ok(())
    }

    /// Mark `id` as seeding or not.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine does not know `id`.
    pub fn set_seeding(&self, id: InfoHash, seeding: bool) -> Result<()> {
        let mut state = self.lock();
        let torrent = state
            .torrents
            .get_mut(&id)
            .ok_or(TorrentError::NotFound { torrent_id: id })?;
        torrent.seeding = seeding;
        Ok(())
    }

    /// Whether `download_all` is in effect for `id`.
    #[must_use]
    pub fn is_downloading(&self, id: InfoHash) -> bool {
        self.lock()
            .torrents
            .get(&id)
            .is_some_and(|torrent| torrent.downloading)
    }

    /// Whether the engine still tracks `id`.
    #[must_use]
    pub fn contains(&self, id: InfoHash) -> bool {
        self.lock().torrents.contains_key(&id)
    }

    /// Current upload limiter value.
    #[must_use]
    pub fn upload_limit(&self) -> Option<u64> {
        self.lock().upload_limit
    }

    /// Current download limiter value.
    #[must_use]
    pub fn download_limit(&self) -> Option<u64> {
        self.lock().download_limit
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Simulate `elapsed` of engine activity.
    ///
    /// Torrents without metadata receive a synthetic single-file layout.
    /// Downloading torrents progress at a fixed rate capped by the download
    /// limiter; complete torrents start seeding and upload at a rate capped
    /// by the upload limiter.
    pub fn advance(&self, elapsed: Duration) {
        let mut state = self.lock();
        let down = budget(state.download_limit, elapsed);
        let up = budget(state.upload_limit, elapsed);
        for (id, torrent) in &mut state.torrents {
            if torrent.info.is_none() {
                let info = torrent.synthetic_info(*id);
                torrent.resolve(info);
                continue;
            }
            if torrent.downloading && torrent.stats.bytes_missing > 0 {
                torrent.apply_download(down);
                torrent.stats.active_peers = 4;
                torrent.stats.total_peers = 12;
            }
            if torrent.stats.bytes_missing == 0 {
                torrent.seeding = true;
                torrent.apply_upload(up / 4);
            }
        }
    }

    fn check(
        state: &MemoryState,
        operation: &'static str,
        torrent_id: Option<InfoHash>,
    ) -> Result<()> {
        if state.failing.contains(operation) {
            return Err(TorrentError::OperationFailed {
                operation,
                torrent_id,
                source: "injected failure".into(),
            }
            .into());
        }
        Ok(())
    }
}

fn budget(limit: Option<u64>, elapsed: Duration) -> u64 {
    let rate = limit.map_or(SIMULATED_RATE, |limit| limit.min(SIMULATED_RATE));
    u64::try_from(u128::from(rate) * elapsed.as_millis() / 1_000).unwrap_or(u64::MAX)
}

fn missing(id: InfoHash) -> anyhow::Error {
    TorrentError::NotFound { torrent_id: id }.into()
}

#[async_trait]
impl DownloadEngine for MemoryEngine {
    async fn add_magnet(&self, uri: &str) -> Result<InfoHash> {
        let magnet = Magnet::parse(uri)?;
        let mut state = self.lock();
        Self::check(&state, "add_magnet", Some(magnet.info_hash))?;
        if !state.accepting {
            return Err(anyhow!("memory engine is not accepting torrents"));
        }
        let id = magnet.info_hash;
        state.torrents.entry(id).or_insert_with(|| MemoryTorrent {
            display_name: magnet.display_name,
            trackers: magnet.trackers,
            ..MemoryTorrent::default()
        });
        state.calls.push(EngineCall::AddMagnet(id));
        Ok(id)
    }

    fn metadata_ready(&self, id: InfoHash) -> MetadataSignal {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.lock();
        match state.torrents.get_mut(&id) {
            Some(torrent) if torrent.info.is_some() => {
                let _ = sender.send(());
            }
            Some(torrent) => torrent.waiters.push(sender),
            None => drop(sender),
        }
        receiver
    }

    fn info(&self, id: InfoHash) -> Option<TorrentInfo> {
        self.lock()
            .torrents
            .get(&id)
            .and_then(|torrent| torrent.info.clone())
    }

    fn stats(&self, id: InfoHash) -> Option<TorrentStats> {
        self.lock().torrents.get(&id).map(|torrent| torrent.stats)
    }

    fn is_seeding(&self, id: InfoHash) -> bool {
        self.lock()
            .torrents
            .get(&id)
            .is_some_and(|torrent| torrent.seeding)
    }

    async fn download_all(&self, id: InfoHash) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "download_all", Some(id))?;
        let torrent = state.torrents.get_mut(&id).ok_or_else(|| missing(id))?;
        torrent.downloading = true;
        state.calls.push(EngineCall::DownloadAll(id));
        Ok(())
    }

    async fn cancel_pieces(&self, id: InfoHash, pieces: Range<u32>) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "cancel_pieces", Some(id))?;
        let torrent = state.torrents.get_mut(&id).ok_or_else(|| missing(id))?;
        let piece_count = torrent.info.as_ref().map_or(0, |info| info.piece_count);
        if pieces.start == 0 && pieces.end >= piece_count {
            torrent.downloading = false;
        }
        state.calls.push(EngineCall::CancelPieces(id, pieces));
        Ok(())
    }

    async fn drop_torrent(&self, id: InfoHash) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "drop_torrent", Some(id))?;
        state.torrents.remove(&id).ok_or_else(|| missing(id))?;
        state.calls.push(EngineCall::DropTorrent(id));
        Ok(())
    }

    async fn set_upload_rate_limit(&self, bytes_per_second: Option<u64>) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "set_upload_rate_limit", None)?;
        state.upload_limit = bytes_per_second;
        state.calls.push(EngineCall::UploadLimit(bytes_per_second));
        Ok(())
    }

    async fn set_download_rate_limit(&self, bytes_per_second: Option<u64>) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "set_download_rate_limit", None)?;
        state.download_limit = bytes_per_second;
        state.calls.push(EngineCall::DownloadLimit(bytes_per_second));
        Ok(())
    }
}
