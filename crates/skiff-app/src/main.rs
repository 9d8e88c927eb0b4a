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

//! Binary entrypoint that wires the Skiff session to the console view.

use clap::Parser;
use skiff_app::{AppResult, Cli, run_app};

/// Parses arguments and runs the session until the console exits.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(Cli::parse()).await
}
