use std::sync::Arc;
use std::time::Duration;

use skiff_config::{AppSettings, ConfigLoader};
use skiff_events::EventBus;
use skiff_session::{MemoryEngine, SessionConfig, SessionError, SessionHandle};
use skiff_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use skiff_torrent_core::RateLimit;
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::console::Console;
use crate::error::{AppError, AppResult};

/// Services assembled from settings, before the console starts.
pub(crate) struct BootstrapDependencies {
    settings: AppSettings,
    events: EventBus,
    metrics: Metrics,
    engine: Arc<MemoryEngine>,
}

impl BootstrapDependencies {
    /// Build dependencies from resolved settings.
    pub(crate) fn new(settings: AppSettings) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            events: EventBus::with_capacity(settings.session.event_buffer),
            settings,
            metrics,
            engine: Arc::new(MemoryEngine::new()),
        })
    }
}

/// Resolve settings: file, then environment, then command-line overrides.
///
/// # Errors
///
/// Returns [`AppError::Config`] when loading or validation fails.
pub fn load_settings(cli: &Cli) -> AppResult<AppSettings> {
    resolve_settings(cli, ConfigLoader::new())
}

/// Layer `cli` over `loader` and validate the merged result once.
fn resolve_settings(cli: &Cli, mut loader: ConfigLoader) -> AppResult<AppSettings> {
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut settings = loader
        .load_layers()
        .map_err(|err| AppError::config("config.load", err))?;
    if let Some(level) = &cli.log_level {
        settings.telemetry.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        settings.telemetry.format = Some(format.as_setting().to_string());
    }
    skiff_config::validate(&settings).map_err(|err| AppError::config("config.validate", err))?;
    Ok(settings)
}

/// Entry point for the Skiff boot sequence.
///
/// # Errors
///
/// Returns an error if settings, logging, or the console fail.
pub async fn run_app(cli: Cli) -> AppResult<()> {
    let settings = load_settings(&cli)?;
    let format = LogFormat::from_setting(settings.telemetry.format.as_deref())
        .map_err(|err| AppError::telemetry("telemetry.format", err))?;
    init_logging(&LoggingConfig {
        level: &settings.telemetry.level,
        format,
        build_sha: option_env!("SKIFF_BUILD_SHA").unwrap_or("dev"),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let dependencies = BootstrapDependencies::new(settings)?;
    let stdin = BufReader::new(tokio::io::stdin());
    run_app_with(dependencies, stdin, std::io::stdout(), cli.follow).await
}

/// Boot sequence over injected dependencies and console streams.
pub(crate) async fn run_app_with<R, W>(
    dependencies: BootstrapDependencies,
    input: R,
    output: W,
    follow: bool,
) -> AppResult<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: std::io::Write,
{
    let BootstrapDependencies {
        settings,
        events,
        metrics,
        engine,
    } = dependencies;
    let tick_interval = settings.session.tick_interval();
    info!(
        tick_ms = settings.session.tick_interval_ms,
        build_sha = build_sha(),
        "Skiff session starting"
    );

    let handle = SessionHandle::spawn(
        engine.clone(),
        events.clone(),
        metrics.clone(),
        SessionConfig {
            tick_interval,
            command_buffer: settings.session.command_buffer,
        },
    );
    apply_initial_limits(&handle, &settings).await?;

    let simulation = spawn_simulation(engine, tick_interval);
    let event_log = spawn_event_log(&events);

    let mut console = Console::new(handle, output);
    let outcome = tokio::select! {
        result = console.run(input, follow) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::io("signal.ctrl_c", err))?;
            info!("interrupt received");
            Ok(())
        }
    };

    simulation.abort();
    event_log.abort();
    let snapshot = metrics.snapshot();
    info!(
        torrents = snapshot.torrents_tracked,
        ticks = snapshot.session_ticks_total,
        "Skiff session stopped"
    );
    outcome
}

async fn apply_initial_limits(handle: &SessionHandle, settings: &AppSettings) -> AppResult<()> {
    let upload = kib_limit(settings.session.upload_limit_kib)?;
    let download = kib_limit(settings.session.download_limit_kib)?;
    handle
        .set_upload_limit(upload)
        .await
        .map_err(|err| AppError::session("session.set_upload_limit", err))?;
    handle
        .set_download_limit(download)
        .await
        .map_err(|err| AppError::session("session.set_download_limit", err))
}

fn kib_limit(kib: i64) -> AppResult<RateLimit> {
    RateLimit::from_kib(kib).map_err(|source| {
        AppError::session("session.rate_limit", SessionError::InvalidRate { source })
    })
}

/// Drives the in-memory engine so the demo shows progress.
fn spawn_simulation(engine: Arc<MemoryEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            engine.advance(period);
        }
    })
}

fn spawn_event_log(events: &EventBus) -> JoinHandle<()> {
    let mut stream = events.subscribe(None);
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(envelope) => {
                    debug!(event_id = envelope.id, kind = envelope.event.kind(), "session event");
                }
                Err(err) => warn!(error = %err, "event log lagged"),
            }
        }
    })
}
