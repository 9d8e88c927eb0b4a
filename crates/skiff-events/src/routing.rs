//! Event bus routing helpers.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Stream handed to subscribers: replayed backlog first, then live events.
///
/// A lagging subscriber observes `BroadcastStreamRecvError::Lagged` and keeps
/// receiving from the oldest retained envelope.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<EventEnvelope, BroadcastStreamRecvError>> + Send>>;

struct Ledger {
    next_id: EventId,
    replay: VecDeque<EventEnvelope>,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    ledger: Arc<Mutex<Ledger>>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus with a custom replay capacity.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        let replay_capacity = replay_capacity.max(1);
        let (sender, _) = broadcast::channel(replay_capacity);
        Self {
            sender,
            ledger: Arc::new(Mutex::new(Ledger {
                next_id: 1,
                replay: VecDeque::with_capacity(replay_capacity),
            })),
            replay_capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to the bus.
    ///
    /// When `last_event_id` is provided, retained envelopes newer than that id
    /// are yielded before live traffic. Live envelopes already covered by the
    /// backlog are skipped so nothing is delivered twice.
    #[must_use]
    pub fn subscribe(&self, last_event_id: Option<EventId>) -> EventStream {
        // Subscribe while holding the ledger so no envelope slips between the
        // backlog snapshot and the live receiver.
        let ledger = self.lock_ledger();
        let receiver = self.sender.subscribe();
        let backlog: Vec<EventEnvelope> = last_event_id.map_or_else(Vec::new, |last| {
            ledger
                .replay
                .iter()
                .filter(|env| env.id > last)
                .cloned()
                .collect()
        });
        drop(ledger);

        let watermark = backlog.last().map(|env| env.id);
        let live = BroadcastStream::new(receiver).filter(move |item| match (item, watermark) {
            (Ok(env), Some(seen)) => env.id > seen,
            _ => true,
        });
        Box::pin(tokio_stream::iter(backlog.into_iter().map(Ok)).chain(live))
    }

    /// Publish a new event to all subscribers and return its id.
    pub fn send(&self, event: Event) -> EventId {
        let mut ledger = self.lock_ledger();
        let id = ledger.next_id;
        ledger.next_id = ledger.next_id.saturating_add(1);

        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        if ledger.replay.len() == self.replay_capacity {
            let _ = ledger.replay.pop_front();
        }
        ledger.replay.push_back(envelope.clone());
        // No receivers is not an error for a fire-and-forget bus.
        let _ = self.sender.send(envelope);
        drop(ledger);
        id
    }

    /// Publish and return the assigned event id.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        self.send(event)
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InfoHash;
    use crate::payloads::TransferDirection;
    use tokio_stream::StreamExt;

    fn removed(byte: u8) -> Event {
        Event::TorrentRemoved {
            torrent_id: InfoHash::from_bytes([byte; 20]),
        }
    }

    async fn next_id(stream: &mut EventStream) -> EventId {
        stream
            .next()
            .await
            .expect("stream item")
            .expect("broadcast ok")
            .id
    }

    #[tokio::test]
    async fn publish_assigns_increasing_ids() {
        let bus = EventBus::with_capacity(4);
        let first = bus.publish(Event::RateLimitChanged {
            direction: TransferDirection::Download,
            bytes_per_second: Some(1_024),
        });
        let second = bus.publish(Event::HealthChanged {
            degraded: vec!["engine".into()],
        });
        assert_eq!(second, first + 1);

        let mut stream = bus.subscribe(Some(first));
        assert_eq!(next_id(&mut stream).await, second);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_when_full() {
        let bus = EventBus::with_capacity(2);
        for byte in 0..3 {
            let _ = bus.publish(removed(byte));
        }
        let mut stream = bus.subscribe(Some(0));
        let ids = vec![next_id(&mut stream).await, next_id(&mut stream).await];
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn subscribe_streams_live_events() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let id = bus.publish(Event::WantChanged {
            torrent_id: InfoHash::from_bytes([1; 20]),
            active: false,
        });
        let envelope = stream
            .next()
            .await
            .expect("stream item")
            .expect("broadcast ok");
        assert_eq!(envelope.id, id);
        assert!(matches!(envelope.event, Event::WantChanged { .. }));
    }

    #[tokio::test]
    async fn subscribe_with_cursor_yields_backlog_then_live_once() {
        let bus = EventBus::new();
        let first = bus.publish(removed(1));
        let second = bus.publish(removed(2));

        let mut stream = bus.subscribe(Some(first));
        let third = bus.publish(removed(3));

        let mut seen = Vec::new();
        for _ in 0..2 {
            let envelope = stream
                .next()
                .await
                .expect("stream item")
                .expect("broadcast ok");
            seen.push(envelope.id);
        }
        assert_eq!(seen, vec![second, third]);
    }
}
