use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use seeker_core::app::{Pipeline, PipelineSettings, Producer, WorkerGroup, router};
use seeker_core::clients::{DriveSearch, GeminiTranslator, PromptTemplate, TelegramNotifier};
use seeker_core::config::{IngressConfig, WorkerConfig};
use seeker_core::queue::AmqpBroker;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "seeker", about = "Chat-driven file search over a durable task queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Consume envelopes and run the translate/search/notify pipeline.
    Worker {
        /// Number of independent consumer loops.
        #[arg(short, long, env = "WORKERS", default_value_t = 1)]
        workers: usize,
    },
    /// Serve the chat webhook and publish envelopes.
    Ingress {
        /// Overrides INGRESS_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

async fn run_worker(workers: usize) -> anyhow::Result<()> {
    let cfg = WorkerConfig::from_env()?;

    let template = match &cfg.type_hints_file {
        Some(path) => PromptTemplate::from_file(path)?,
        None => PromptTemplate::default(),
    };
    let translator = GeminiTranslator::new(
        cfg.gemini_api_key.clone(),
        cfg.gemini_model.clone(),
        cfg.gemini_base_url.clone(),
        cfg.http_timeout,
    )?
    .with_template(template);
    let search = DriveSearch::new(
        cfg.drive_access_token.clone(),
        cfg.drive_api_base.clone(),
        cfg.search_page_size,
        cfg.http_timeout,
    )?;
    let notifier = TelegramNotifier::new(
        cfg.telegram_bot_token.clone(),
        cfg.telegram_api_base.clone(),
        cfg.notify_timeout,
    )?;

    let pipeline = Pipeline::new(Arc::new(translator), Arc::new(search), Arc::new(notifier))
        .with_settings(PipelineSettings {
            scope: cfg.drive_folder_id.clone(),
            page_size: cfg.search_page_size,
            stage_timeout: Some(cfg.stage_timeout),
            ..PipelineSettings::default()
        });

    info!(
        workers,
        host = %cfg.broker.host,
        queue = %cfg.broker.queue,
        model = %cfg.gemini_model,
        "starting worker"
    );
    let broker = Arc::new(AmqpBroker::new(cfg.broker.clone()));
    let group = WorkerGroup::spawn(workers, broker, Arc::new(pipeline), cfg.retry.clone());

    group
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("worker stopped")?;

    info!("worker stopped");
    Ok(())
}

async fn run_ingress(bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let cfg = IngressConfig::from_env()?;
    let addr = bind.unwrap_or(cfg.bind);

    let broker = Arc::new(AmqpBroker::new(cfg.broker.clone()));
    let producer = Arc::new(Producer::new(broker).with_connect_timeout(cfg.connect_timeout));
    let (publisher, publishing) = producer.spawn_publisher(cfg.publish_backlog);
    let app = router(publisher, cfg.telegram_bot_token.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, queue = %cfg.broker.queue, "ingress listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // the router's handle is gone once serve returns; let the backlog drain
    if tokio::time::timeout(DRAIN_TIMEOUT, publishing).await.is_err() {
        warn!("publish backlog not drained before shutdown");
    }
    info!("ingress stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Command::Worker { workers } => run_worker(workers).await,
        Command::Ingress { bind } => run_ingress(bind).await,
    }
}
