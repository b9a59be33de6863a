#![forbid(unsafe_code)]

//! `goat-notify`: reminder scanner, notification worker, Telegram bot
//! poller, and linking web API.
//!
//! Each component can run in its own process (`--component worker`) or all
//! together in one; they coordinate only through the shared store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use goat_notify::clock::{Clock, SystemClock};
use goat_notify::config::GlobalConfig;
use goat_notify::http::{self, ApiState};
use goat_notify::linking::LinkService;
use goat_notify::persistence::task_repo::TaskRepo;
use goat_notify::persistence::{db, retention};
use goat_notify::queue::failure::FailureHook;
use goat_notify::queue::handlers::default_handlers;
use goat_notify::queue::worker::{spawn_worker, Worker};
use goat_notify::queue::{JobQueue, RetryPolicy};
use goat_notify::scheduler::{spawn_scanner_task, ReminderScanner};
use goat_notify::telegram::client::TelegramClient;
use goat_notify::telegram::commands::CommandHandler;
use goat_notify::telegram::poller::spawn_bot_poller;
use goat_notify::telegram::{DisabledMessenger, Messenger};
use goat_notify::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Component {
    /// Linking web API.
    Web,
    /// Reminder scanner and retention purge.
    Scheduler,
    /// Notification job worker.
    Worker,
    /// Telegram bot update poller.
    Bot,
}

#[derive(Debug, Parser)]
#[command(name = "goat-notify", about = "Reminder and Telegram notification service", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Components to run; repeat to select several. Defaults to all.
    #[arg(long = "component", value_enum)]
    components: Vec<Component>,
}

impl Cli {
    fn runs(&self, component: Component) -> bool {
        self.components.is_empty() || self.components.contains(&component)
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("goat-notify bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

#[allow(clippy::too_many_lines)]
async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await;
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = JobQueue::new(
        Arc::clone(&db),
        Arc::clone(&clock),
        RetryPolicy::from_config(&config.queue),
    );
    let links = LinkService::new(Arc::clone(&db), Arc::clone(&clock), config.token_ttl());

    let telegram = match TelegramClient::from_config(&config.telegram) {
        Ok(client) => Some(client),
        Err(AppError::ConfigurationMissing(reason)) => {
            warn!(%reason, "telegram disabled");
            None
        }
        Err(err) => return Err(err),
    };
    let messenger: Arc<dyn Messenger> = match &telegram {
        Some(client) => Arc::new(client.clone()),
        None => Arc::new(DisabledMessenger),
    };

    let ct = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    // ── Start components ────────────────────────────────
    if args.runs(Component::Scheduler) {
        let scanner = ReminderScanner::new(
            Arc::clone(&db),
            queue.clone(),
            Arc::clone(&clock),
            config.upcoming_window(),
        );
        handles.push(spawn_scanner_task(scanner, config.scan_interval(), ct.clone()));
        handles.push(retention::spawn_retention_task(
            Arc::clone(&db),
            Arc::clone(&clock),
            config.retention_days,
            ct.clone(),
        ));
        info!("scheduler started");
    }

    if args.runs(Component::Worker) {
        let hook = FailureHook::new(
            Arc::clone(&messenger),
            config.telegram.admin_chat_id.clone(),
        );
        let worker = Worker::new(
            queue.clone(),
            default_handlers(&db, &messenger),
            hook,
            Duration::from_millis(config.queue.poll_interval_ms),
        );
        handles.push(spawn_worker(worker, ct.clone()));
        info!("worker started");
    }

    if args.runs(Component::Bot) {
        match telegram {
            Some(client) => {
                let handler =
                    CommandHandler::new(links.clone(), queue.clone(), Arc::clone(&messenger))
                        .with_admin_chat(config.telegram.admin_chat_id.clone());
                handles.push(spawn_bot_poller(
                    client,
                    handler,
                    Duration::from_secs(config.telegram.poll_timeout_seconds),
                    ct.clone(),
                ));
                info!("bot poller started");
            }
            None => warn!("bot component requested but no bot token configured; skipping"),
        }
    }

    if args.runs(Component::Web) {
        let addr = config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| AppError::Config(format!("failed to bind web api on {addr}: {err}")))?;
        let state = Arc::new(ApiState::new(
            links.clone(),
            TaskRepo::new(Arc::clone(&db)),
            queue.clone(),
            &config,
        ));
        let web_ct = ct.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = http::serve(state, listener, web_ct).await {
                tracing::error!(%err, "web api failed");
            }
        }));
    }

    info!("goat-notify ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    for handle in handles {
        if let Err(err) = handle.await {
            warn!(%err, "background task ended abnormally");
        }
    }
    db.close().await;
    info!("goat-notify shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
