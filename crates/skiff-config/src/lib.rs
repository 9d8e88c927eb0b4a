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

//! Layered configuration for Skiff.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values),
//! `validate.rs` (range checks), `loader.rs` (file + environment layering).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ConfigLoader, ENV_DOWNLOAD_LIMIT_KIB, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_TICK_INTERVAL_MS,
    ENV_UPLOAD_LIMIT_KIB,
};
pub use model::{AppSettings, SessionSettings, TelemetrySettings};
pub use validate::validate;
