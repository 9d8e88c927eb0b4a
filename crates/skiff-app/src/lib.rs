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

//! Skiff application wiring.
//!
//! Layout: `cli.rs` (arguments), `bootstrap.rs` (service wiring),
//! `console.rs` (line-oriented view), `error.rs` (application errors).

/// Application bootstrap and settings resolution.
pub mod bootstrap;
/// Command-line arguments.
pub mod cli;
/// Line-oriented console view.
pub mod console;
/// Application error type.
pub mod error;

pub use bootstrap::{load_settings, run_app};
pub use cli::Cli;
pub use error::{AppError, AppResult};
