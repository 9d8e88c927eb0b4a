//! Session coordinator: reconciles user intent with engine state and derives rows.
//!
//! The coordinator is owned by a single task. Every method takes `&mut self`
//! and none of them wait on network activity; the only long-running work,
//! metadata resolution, runs on detached tasks that post a
//! [`MetadataCompletion`] back to the owner.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use skiff_events::{Event, EventBus, InfoHash, TransferDirection};
use skiff_telemetry::Metrics;
use skiff_torrent_core::metrics::rate;
use skiff_torrent_core::{
    DesiredState, DownloadEngine, Eta, Magnet, MetadataSummary, RateLimit, RateSample,
    TorrentDetails, TorrentRecord, TorrentRow, derive_phase, parse_rate_input,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};

const ENGINE_COMPONENT: &str = "engine";

/// Metadata became available for a record of a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataCompletion {
    /// Torrent identity.
    pub id: InfoHash,
    /// Generation of the record that started the wait.
    pub generation: u64,
}

/// Stateful layer between a [`DownloadEngine`] and a passive view.
pub struct SessionCoordinator {
    engine: Arc<dyn DownloadEngine>,
    events: EventBus,
    metrics: Metrics,
    records: HashMap<InfoHash, TorrentRecord>,
    order: Vec<InfoHash>,
    tick_interval: Duration,
    tick_index: u64,
    next_generation: u64,
    completions: mpsc::UnboundedSender<MetadataCompletion>,
    health: BTreeSet<String>,
    upload_limit: RateLimit,
    download_limit: RateLimit,
}

impl SessionCoordinator {
    /// Build a coordinator and the receiver its metadata waits post to.
    #[must_use]
    pub fn new(
        engine: Arc<dyn DownloadEngine>,
        events: EventBus,
        metrics: Metrics,
        tick_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<MetadataCompletion>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            engine,
            events,
            metrics,
            records: HashMap::new(),
            order: Vec::new(),
            tick_interval,
            tick_index: 0,
            next_generation: 1,
            completions,
            health: BTreeSet::new(),
            upload_limit: RateLimit::Unlimited,
            download_limit: RateLimit::Unlimited,
        };
        (coordinator, receiver)
    }

    /// Nominal interval used for rate and ETA math.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Limits most recently accepted by the engine, `(upload, download)`.
    #[must_use]
    pub const fn limits(&self) -> (RateLimit, RateLimit) {
        (self.upload_limit, self.download_limit)
    }

    /// Components currently marked degraded.
    #[must_use]
    pub fn degraded(&self) -> Vec<String> {
        self.health.iter().cloned().collect()
    }

    /// Validate `uri`, submit it to the engine, and start tracking the torrent.
    ///
    /// Adding an identity that is already tracked returns it unchanged.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidMagnet`] when the URI fails local validation and
    /// [`SessionError::EngineRejected`] when the engine refuses it. Neither
    /// creates any state.
    pub async fn add_magnet(&mut self, uri: &str) -> SessionResult<InfoHash> {
        let magnet = Magnet::parse(uri).map_err(|source| SessionError::InvalidMagnet { source })?;
        if self.records.contains_key(&magnet.info_hash) {
            debug!(torrent_id = %magnet.info_hash, "magnet already tracked");
            return Ok(magnet.info_hash);
        }

        let id = match self.engine.add_magnet(uri.trim()).await {
            Ok(id) => {
                self.engine_ok();
                id
            }
            Err(err) => {
                self.engine_failed("add_magnet", Some(magnet.info_hash), &err);
                return Err(SessionError::EngineRejected {
                    operation: "add_magnet",
                    source: err.into(),
                });
            }
        };
        if self.records.contains_key(&id) {
            debug!(torrent_id = %id, "engine returned an identity already tracked");
            return Ok(id);
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let record = TorrentRecord::new(id, magnet.display_name, generation);
        let name = record.row.name.clone();
        self.records.insert(id, record);
        self.order.insert(0, id);
        self.watch_metadata(id, generation);
        self.refresh(id, false);
        self.metrics.set_torrents_tracked(self.records.len());

        info!(torrent_id = %id, torrent_name = %name, generation, "torrent added");
        self.publish(Event::TorrentAdded {
            torrent_id: id,
            name,
        });
        Ok(id)
    }

    fn watch_metadata(&self, id: InfoHash, generation: u64) {
        let signal = self.engine.metadata_ready(id);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            if signal.await.is_ok() {
                let _ = completions.send(MetadataCompletion { id, generation });
            }
        });
    }

    /// Handle a metadata completion posted by a detached wait.
    ///
    /// Completions for removed records, or for an earlier generation of a
    /// re-added identity, are dropped.
    pub async fn metadata_resolved(&mut self, completion: MetadataCompletion) {
        let MetadataCompletion { id, generation } = completion;
        let Some(record) = self.records.get(&id) else {
            debug!(torrent_id = %id, "discarding metadata for removed torrent");
            return;
        };
        if record.generation != generation {
            debug!(
                torrent_id = %id,
                stale = generation,
                current = record.generation,
                "discarding stale metadata completion"
            );
            return;
        }
        let desired = record.desired;

        if desired.is_active() {
            match self.engine.download_all(id).await {
                Ok(()) => self.engine_ok(),
                Err(err) => self.engine_failed("download_all", Some(id), &err),
            }
        }

        self.refresh(id, false);
        if let Some(info) = self.engine.info(id) {
            info!(
                torrent_id = %id,
                torrent_name = %info.name,
                pieces = info.piece_count,
                "metadata resolved"
            );
            self.publish(Event::MetadataResolved {
                torrent_id: id,
                name: info.name,
                piece_count: info.piece_count,
            });
        }
    }

    /// Flip the desired state of `id` and forward the change to the engine.
    ///
    /// Without metadata only the flip is recorded; metadata resolution
    /// re-checks the desired state. Engine failures are logged and mark the
    /// engine degraded but do not undo the flip.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when `id` is not tracked.
    pub async fn toggle_want(&mut self, id: InfoHash) -> SessionResult<DesiredState> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(SessionError::NotFound { torrent_id: id })?;
        record.desired = record.desired.toggled();
        let desired = record.desired;

        if let Some(info) = self.engine.info(id) {
            let (operation, outcome) = if desired.is_active() {
                ("download_all", self.engine.download_all(id).await)
            } else {
                (
                    "cancel_pieces",
                    self.engine.cancel_pieces(id, 0..info.piece_count).await,
                )
            };
            match outcome {
                Ok(()) => self.engine_ok(),
                Err(err) => self.engine_failed(operation, Some(id), &err),
            }
        }

        self.refresh(id, false);
        info!(torrent_id = %id, desired = ?desired, "desired state toggled");
        self.publish(Event::WantChanged {
            torrent_id: id,
            active: desired.is_active(),
        });
        Ok(desired)
    }

    /// Stop tracking `id` and tell the engine to drop it.
    ///
    /// The record is deleted even if the engine call fails. Any in-flight
    /// metadata wait for it becomes a no-op.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when `id` is not tracked.
    pub async fn remove(&mut self, id: InfoHash) -> SessionResult<()> {
        if self.records.remove(&id).is_none() {
            return Err(SessionError::NotFound { torrent_id: id });
        }
        self.order.retain(|tracked| *tracked != id);
        self.metrics.set_torrents_tracked(self.records.len());

        match self.engine.drop_torrent(id).await {
            Ok(()) => self.engine_ok(),
            Err(err) => self.engine_failed("drop_torrent", Some(id), &err),
        }

        info!(torrent_id = %id, "torrent removed");
        self.publish(Event::TorrentRemoved { torrent_id: id });
        Ok(())
    }

    /// Apply a process-wide upload cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] for negative rates, leaving the limiter
    /// untouched; [`SessionError::EngineRejected`] when the engine fails.
    pub async fn set_upload_limit(&mut self, limit: RateLimit) -> SessionResult<()> {
        self.set_limit(TransferDirection::Upload, limit).await
    }

    /// Apply a process-wide download cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] for negative rates, leaving the limiter
    /// untouched; [`SessionError::EngineRejected`] when the engine fails.
    pub async fn set_download_limit(&mut self, limit: RateLimit) -> SessionResult<()> {
        self.set_limit(TransferDirection::Download, limit).await
    }

    /// Parse KiB/s text and apply it as the upload cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] when the text does not parse or is
    /// negative; [`SessionError::EngineRejected`] when the engine fails.
    pub async fn apply_upload_limit_text(&mut self, text: &str) -> SessionResult<()> {
        let limit = parse_rate_input(text).map_err(|source| SessionError::InvalidRate { source })?;
        self.set_upload_limit(limit).await
    }

    /// Parse KiB/s text and apply it as the download cap.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRate`] when the text does not parse or is
    /// negative; [`SessionError::EngineRejected`] when the engine fails.
    pub async fn apply_download_limit_text(&mut self, text: &str) -> SessionResult<()> {
        let limit = parse_rate_input(text).map_err(|source| SessionError::InvalidRate { source })?;
        self.set_download_limit(limit).await
    }

    async fn set_limit(
        &mut self,
        direction: TransferDirection,
        limit: RateLimit,
    ) -> SessionResult<()> {
        let bytes_per_second = limit.to_engine().map_err(|source| {
            warn!(direction = direction.as_str(), "rejected negative rate limit");
            SessionError::InvalidRate { source }
        })?;

        let (operation, outcome) = match direction {
            TransferDirection::Upload => (
                "set_upload_rate_limit",
                self.engine.set_upload_rate_limit(bytes_per_second).await,
            ),
            TransferDirection::Download => (
                "set_download_rate_limit",
                self.engine.set_download_rate_limit(bytes_per_second).await,
            ),
        };
        if let Err(err) = outcome {
            self.engine_failed(operation, None, &err);
            return Err(SessionError::EngineRejected {
                operation,
                source: err.into(),
            });
        }
        self.engine_ok();

        match direction {
            TransferDirection::Upload => self.upload_limit = limit,
            TransferDirection::Download => self.download_limit = limit,
        }
        info!(
            direction = direction.as_str(),
            bytes_per_second = ?bytes_per_second,
            "rate limit applied"
        );
        self.publish(Event::RateLimitChanged {
            direction,
            bytes_per_second,
        });
        Ok(())
    }

    /// Sample every tracked torrent and return the refreshed rows in order.
    pub fn tick(&mut self) -> Vec<TorrentRow> {
        self.tick_index += 1;
        for id in self.order.clone() {
            self.refresh(id, true);
        }
        self.metrics.inc_tick();
        self.publish(Event::Ticked {
            tick: self.tick_index,
            torrents: self.order.len(),
        });
        self.rows()
    }

    /// Rows in visible order, as of the last refresh.
    #[must_use]
    pub fn rows(&self) -> Vec<TorrentRow> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| record.row.clone())
            .collect()
    }

    /// Snapshot of the record for `id`.
    #[must_use]
    pub fn selected(&self, id: InfoHash) -> Option<TorrentRecord> {
        self.records.get(&id).cloned()
    }

    /// Details pane payload for `id`.
    #[must_use]
    pub fn details(&self, id: InfoHash) -> Option<TorrentDetails> {
        let record = self.records.get(&id)?;
        Some(TorrentDetails {
            id,
            desired: record.desired,
            added_at: record.added_at,
            metadata: self
                .engine
                .info(id)
                .map(|info| MetadataSummary::from(&info)),
            connection: self.engine.stats(id),
        })
    }

    fn refresh(&mut self, id: InfoHash, sample: bool) {
        let info = self.engine.info(id);
        let stats = self.engine.stats(id);
        let seeding = self.engine.is_seeding(id);
        let interval = self.tick_interval;
        let tick_index = self.tick_index;
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };

        let counters = stats.unwrap_or_default();
        let missing = counters.bytes_missing;
        record.row.phase = derive_phase(info.is_some(), seeding, record.desired, missing);
        record.row.desired = record.desired;
        match &info {
            Some(info) => {
                record.row.name.clone_from(&info.name);
                record.row.completed = Some(counters.bytes_completed);
                record.row.total = Some(counters.bytes_completed.saturating_add(missing));
            }
            None => {
                record.row.name = record.fallback_name();
                record.row.completed = None;
                record.row.total = None;
            }
        }

        if !sample {
            return;
        }
        let Some(stats) = stats else {
            return;
        };
        if record.push_sample(RateSample::from_stats(&stats, tick_index))
            && let Some((previous, current)) = record.sample_pair()
        {
            record.row.rate = rate(&previous, &current, interval);
            record.row.eta = Eta::between(&previous, &current, missing, interval);
        }
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }

    fn engine_failed(
        &mut self,
        operation: &'static str,
        torrent_id: Option<InfoHash>,
        err: &anyhow::Error,
    ) {
        self.metrics.inc_engine_failure(operation);
        match torrent_id {
            Some(id) => warn!(torrent_id = %id, operation, error = %err, "engine call failed"),
            None => warn!(operation, error = %err, "engine call failed"),
        }
        self.mark_degraded(ENGINE_COMPONENT, &err.to_string());
    }

    fn engine_ok(&mut self) {
        self.mark_recovered(ENGINE_COMPONENT);
    }

    fn mark_degraded(&mut self, component: &str, detail: &str) {
        if self.health.insert(component.to_string()) {
            warn!(component, detail, "session component degraded");
            let degraded = self.degraded();
            self.publish(Event::HealthChanged { degraded });
        }
    }

    fn mark_recovered(&mut self, component: &str) {
        if self.health.remove(component) {
            info!(component, "session component recovered");
            let degraded = self.degraded();
            self.publish(Event::HealthChanged { degraded });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use skiff_events::{EventStream, TorrentPhase};
    use skiff_test_support::fixtures;
    use skiff_torrent_core::{RateInputError, TransferRate};
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::engine::{EngineCall, MemoryEngine};

    const TICK: Duration = Duration::from_secs(2);

    struct Harness {
        engine: Arc<MemoryEngine>,
        bus: EventBus,
        metrics: Metrics,
        coordinator: SessionCoordinator,
        completions: mpsc::UnboundedReceiver<MetadataCompletion>,
    }

    fn harness() -> Result<Harness> {
        let engine = Arc::new(MemoryEngine::new());
        let bus = EventBus::with_capacity(64);
        let metrics = Metrics::new()?;
        let (coordinator, completions) =
            SessionCoordinator::new(engine.clone(), bus.clone(), metrics.clone(), TICK);
        Ok(Harness {
            engine,
            bus,
            metrics,
            coordinator,
            completions,
        })
    }

    impl Harness {
        async fn next_completion(&mut self) -> MetadataCompletion {
            timeout(Duration::from_secs(1), self.completions.recv())
                .await
                .expect("completion in time")
                .expect("completion channel open")
        }
    }

    async fn next_event(stream: &mut EventStream) -> Option<Event> {
        timeout(Duration::from_millis(100), stream.next())
            .await
            .ok()
            .flatten()
            .and_then(Result::ok)
            .map(|envelope| envelope.event)
    }

    #[tokio::test]
    async fn add_prepends_rows_and_publishes() -> Result<()> {
        let mut h = harness()?;
        let mut stream = h.bus.subscribe(None);
        let first = h.coordinator.add_magnet(&fixtures::magnet_uri(1)).await?;
        let second = h.coordinator.add_magnet(&fixtures::magnet_uri(2)).await?;

        let rows = h.coordinator.rows();
        assert_eq!(
            rows.iter().map(|row| row.id).collect::<Vec<_>>(),
            vec![second, first]
        );
        assert_eq!(rows[0].name, "fixture-2");
        assert_eq!(rows[0].phase, TorrentPhase::FetchingMetadata);
        assert_eq!(h.metrics.snapshot().torrents_tracked, 2);

        match next_event(&mut stream).await {
            Some(Event::TorrentAdded { torrent_id, name }) => {
                assert_eq!(torrent_id, first);
                assert_eq!(name, "fixture-1");
            }
            other => panic!("expected torrent added, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_add_keeps_one_row() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(3)).await?;
        let again = h
            .coordinator
            .add_magnet(&fixtures::bare_magnet_uri(3))
            .await?;
        assert_eq!(id, again);
        assert_eq!(h.coordinator.rows().len(), 1);
        assert_eq!(
            h.engine
                .calls()
                .iter()
                .filter(|call| matches!(call, EngineCall::AddMagnet(_)))
                .count(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_and_rejected_magnets_leave_no_state() -> Result<()> {
        let mut h = harness()?;
        let err = h
            .coordinator
            .add_magnet("http://example.com")
            .await
            .expect_err("invalid magnet");
        assert!(matches!(err, SessionError::InvalidMagnet { .. }));

        h.engine.set_accepting(false);
        let err = h
            .coordinator
            .add_magnet(&fixtures::magnet_uri(4))
            .await
            .expect_err("rejected magnet");
        assert!(matches!(err, SessionError::EngineRejected { .. }));
        assert!(h.coordinator.rows().is_empty());
        assert_eq!(h.coordinator.degraded(), vec!["engine".to_string()]);
        assert_eq!(h.metrics.engine_failure_count("add_magnet"), 1);

        h.engine.set_accepting(true);
        h.coordinator.add_magnet(&fixtures::magnet_uri(4)).await?;
        assert!(h.coordinator.degraded().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn metadata_resolution_starts_download_when_active() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(5)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("five"))?;
        let completion = h.next_completion().await;
        h.coordinator.metadata_resolved(completion).await;

        assert!(h.engine.is_downloading(id));
        let rows = h.coordinator.rows();
        assert_eq!(rows[0].name, "five");
        assert_eq!(rows[0].phase, TorrentPhase::Downloading);
        assert_eq!(rows[0].completed, Some(0));
        assert_eq!(rows[0].total, Some(1_572_864));
        Ok(())
    }

    #[tokio::test]
    async fn paused_before_metadata_skips_download() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(6)).await?;
        assert_eq!(h.coordinator.toggle_want(id).await?, DesiredState::Paused);
        h.engine
            .resolve_metadata(id, fixtures::sample_info("six"))?;
        let completion = h.next_completion().await;
        h.coordinator.metadata_resolved(completion).await;

        assert!(!h.engine.is_downloading(id));
        assert_eq!(h.coordinator.rows()[0].phase, TorrentPhase::Paused);
        Ok(())
    }

    #[tokio::test]
    async fn toggle_with_metadata_cancels_and_resumes() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(7)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("seven"))?;
        let completion = h.next_completion().await;
        h.coordinator.metadata_resolved(completion).await;

        assert_eq!(h.coordinator.toggle_want(id).await?, DesiredState::Paused);
        assert!(h.engine.calls().contains(&EngineCall::CancelPieces(id, 0..6)));
        assert!(!h.engine.is_downloading(id));

        assert_eq!(h.coordinator.toggle_want(id).await?, DesiredState::Active);
        assert!(h.engine.is_downloading(id));

        let missing = fixtures::info_hash(99);
        assert!(matches!(
            h.coordinator.toggle_want(missing).await,
            Err(SessionError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn remove_then_late_completion_is_ignored() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(8)).await?;
        let generation = h.coordinator.selected(id).expect("record").generation;
        h.coordinator.remove(id).await?;

        h.coordinator
            .metadata_resolved(MetadataCompletion { id, generation })
            .await;
        assert!(h.coordinator.rows().is_empty());
        assert!(h.coordinator.selected(id).is_none());
        assert!(!h.engine.contains(id));
        assert!(matches!(
            h.coordinator.remove(id).await,
            Err(SessionError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn stale_generation_is_ignored_after_re_add() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(9)).await?;
        let old = h.coordinator.selected(id).expect("record").generation;
        h.coordinator.remove(id).await?;
        h.coordinator.add_magnet(&fixtures::magnet_uri(9)).await?;
        h.coordinator.toggle_want(id).await?;
        h.coordinator.toggle_want(id).await?;

        h.coordinator
            .metadata_resolved(MetadataCompletion {
                id,
                generation: old,
            })
            .await;
        assert!(!h.engine.calls().contains(&EngineCall::DownloadAll(id)));
        Ok(())
    }

    #[tokio::test]
    async fn ticks_without_progress_report_zero_rate_and_infinite_eta() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(10)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("ten"))?;
        let completion = h.next_completion().await;
        h.coordinator.metadata_resolved(completion).await;

        let first = h.coordinator.tick();
        assert_eq!(first[0].rate, TransferRate::UNKNOWN);
        assert_eq!(first[0].eta, Eta::Unknown);

        let second = h.coordinator.tick();
        assert_eq!(second[0].rate.download, Some(0));
        assert_eq!(second[0].rate.upload, Some(0));
        assert_eq!(second[0].eta, Eta::Infinite);
        assert_eq!(second[0].desired, DesiredState::Active);
        assert_eq!(h.coordinator.rows(), second);
        assert_eq!(h.metrics.snapshot().session_ticks_total, 2);
        Ok(())
    }

    #[tokio::test]
    async fn tick_derives_rate_and_eta_from_nominal_interval() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(11)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("eleven"))?;
        let _ = h.coordinator.tick();
        h.engine.record_transfer(id, 204_800, 20_480)?;
        let rows = h.coordinator.tick();

        assert_eq!(rows[0].rate.download, Some(102_400));
        assert_eq!(rows[0].rate.upload, Some(10_240));
        // 2s * (1_572_864 - 204_800) / 204_800 = 13.36s
        assert_eq!(rows[0].eta, Eta::Remaining(Duration::from_secs(13)));
        Ok(())
    }

    #[tokio::test]
    async fn counter_reset_yields_unknown_rate() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(12)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("twelve"))?;
        h.engine.record_transfer(id, 50_000, 0)?;
        let _ = h.coordinator.tick();
        let mut reset = h.engine.stats(id).expect("stats");
        reset.data_bytes_read = 0;
        h.engine.set_stats(id, reset)?;
        let rows = h.coordinator.tick();
        assert_eq!(rows[0].rate.download, None);
        assert_eq!(rows[0].eta, Eta::Unknown);
        Ok(())
    }

    #[tokio::test]
    async fn phase_precedence_reports_paused_for_finished_torrent() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(13)).await?;
        h.engine
            .resolve_metadata(id, fixtures::sample_info("thirteen"))?;
        h.engine.record_transfer(id, 1_572_864, 0)?;
        let rows = h.coordinator.tick();
        assert_eq!(rows[0].phase, TorrentPhase::Finished);

        h.coordinator.toggle_want(id).await?;
        assert_eq!(h.coordinator.rows()[0].phase, TorrentPhase::Paused);

        h.engine.set_seeding(id, true)?;
        let rows = h.coordinator.tick();
        assert_eq!(rows[0].phase, TorrentPhase::Seeding);
        Ok(())
    }

    #[tokio::test]
    async fn negative_limits_are_rejected_without_touching_limiter() -> Result<()> {
        let mut h = harness()?;
        h.coordinator.apply_download_limit_text("100").await?;
        assert_eq!(h.engine.download_limit(), Some(102_400));

        let limit = parse_rate_input("-5")?;
        assert_eq!(limit, RateLimit::BytesPerSecond(-5_120));
        let err = h
            .coordinator
            .set_download_limit(limit)
            .await
            .expect_err("negative limit");
        assert!(matches!(
            err,
            SessionError::InvalidRate {
                source: RateInputError::Negative { value: -5_120 }
            }
        ));
        assert_eq!(h.engine.download_limit(), Some(102_400));
        assert_eq!(
            h.coordinator.limits().1,
            RateLimit::BytesPerSecond(102_400)
        );

        assert!(matches!(
            h.coordinator.apply_upload_limit_text("abc").await,
            Err(SessionError::InvalidRate {
                source: RateInputError::NotANumber { .. }
            })
        ));
        h.coordinator.apply_upload_limit_text("0").await?;
        assert_eq!(h.engine.upload_limit(), None);
        assert_eq!(h.coordinator.limits().0, RateLimit::Unlimited);
        Ok(())
    }

    #[tokio::test]
    async fn engine_failures_degrade_and_recover() -> Result<()> {
        let mut h = harness()?;
        let mut stream = h.bus.subscribe(None);
        h.engine.fail_operation("set_upload_rate_limit");
        assert!(matches!(
            h.coordinator.apply_upload_limit_text("10").await,
            Err(SessionError::EngineRejected { .. })
        ));
        assert_eq!(h.coordinator.limits().0, RateLimit::Unlimited);

        match next_event(&mut stream).await {
            Some(Event::HealthChanged { degraded }) => assert_eq!(degraded, vec!["engine"]),
            other => panic!("expected health degraded, got {other:?}"),
        }

        h.engine.clear_failures();
        h.coordinator.apply_upload_limit_text("10").await?;
        match next_event(&mut stream).await {
            Some(Event::HealthChanged { degraded }) => assert!(degraded.is_empty()),
            other => panic!("expected health recovery, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn remove_survives_engine_failure() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(14)).await?;
        h.engine.fail_operation("drop_torrent");
        h.coordinator.remove(id).await?;
        assert!(h.coordinator.rows().is_empty());
        assert_eq!(h.metrics.engine_failure_count("drop_torrent"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn details_report_metadata_and_connection() -> Result<()> {
        let mut h = harness()?;
        let id = h.coordinator.add_magnet(&fixtures::magnet_uri(15)).await?;
        let pending = h.coordinator.details(id).expect("details");
        assert!(pending.fetching_metadata());
        let record = h.coordinator.selected(id).expect("record");
        assert_eq!(pending.added_at, record.added_at);
        assert!(pending.connection.is_some());

        h.engine
            .resolve_metadata(id, fixtures::sample_info("fifteen"))?;
        let details = h.coordinator.details(id).expect("details");
        let metadata = details.metadata.expect("metadata");
        assert_eq!(metadata.piece_count, 6);
        assert_eq!(
            metadata.announces,
            vec![
                "http://backup.example.org/announce".to_string(),
                fixtures::TRACKER.to_string()
            ]
        );
        assert!(h.coordinator.details(fixtures::info_hash(200)).is_none());
        Ok(())
    }
}
