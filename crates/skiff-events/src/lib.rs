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

//! Core event bus for Skiff.
//!
//! The bus provides a typed event enum, sequential identifiers, and support for
//! replaying recent events when a view reconnects. Internally it uses
//! `tokio::broadcast` with a bounded buffer; when the channel overflows, the
//! oldest events are dropped.
//!
//! Layout: `identity.rs` (torrent identity), `payloads.rs` (event payloads),
//! `routing.rs` (`EventBus` and subscriber streams).

pub mod identity;
pub mod payloads;
pub mod routing;

pub use identity::{InfoHash, InfoHashError};
pub use payloads::{
    DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, TorrentPhase, TransferDirection,
};
pub use routing::{EventBus, EventStream};
