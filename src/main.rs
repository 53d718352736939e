//! # SitePulse
//!
//! Usage:
//!   sitepulse serve                                  # Gateway + scheduler (default port 3000)
//!   sitepulse serve --port 8080                      # Custom port
//!   sitepulse scan https://example.com --channel ID --token TOKEN
//!   sitepulse init                                   # Write ~/.sitepulse/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitepulse_agent::{ConversationRouter, OpenAiAdvisor, SessionStore};
use sitepulse_channels::notifier::events;
use sitepulse_channels::{ChannelDeliveryQueue, Notifier, WebhookTransport};
use sitepulse_core::SitePulseConfig;
use sitepulse_core::types::DeliveryStatus;
use sitepulse_scanner::{HttpPageFetcher, LinkTracker, ScanWorkflow};
use sitepulse_scheduler::ScanScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sitepulse",
    version,
    about = "🩺 SitePulse: recurring website health scans with live channel reports"
)]
struct Cli {
    /// Config file (default: ~/.sitepulse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway, the scheduler loop and the scan executor
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Scan one URL now, reporting progress to a webhook channel
    Scan {
        url: String,
        #[arg(long)]
        channel: String,
        #[arg(long)]
        token: String,
    },
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(path: Option<&PathBuf>) -> Result<SitePulseConfig> {
    let config = match path {
        Some(path) => SitePulseConfig::load_from(path)?,
        None => SitePulseConfig::load()?,
    };
    Ok(config)
}

/// Stores shared by the gateway, the scheduler and the executor. All of it
/// is in memory and starts empty on every launch.
struct Runtime {
    queue: Arc<ChannelDeliveryQueue>,
    notifier: Arc<Notifier>,
    workflow: Arc<ScanWorkflow>,
}

fn build_runtime(config: &SitePulseConfig) -> Result<Runtime> {
    let transport = Arc::new(WebhookTransport::new(
        "webhook",
        &config.delivery.webhook_base_url,
        Duration::from_secs(config.delivery.timeout_secs),
    )?);
    let queue = Arc::new(ChannelDeliveryQueue::new(transport));
    let notifier = Arc::new(Notifier::from_config(queue.clone(), &config.delivery)?);
    let workflow = Arc::new(ScanWorkflow::new(
        Arc::new(HttpPageFetcher::new(&config.workflow)?),
        Arc::new(LinkTracker::new()),
        notifier.clone(),
        config.workflow.clone(),
    ));
    Ok(Runtime {
        queue,
        notifier,
        workflow,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sitepulse=debug,sitepulse_core=debug,sitepulse_channels=debug,sitepulse_scanner=debug,\
         sitepulse_scheduler=debug,sitepulse_agent=debug,sitepulse_gateway=debug,tower_http=debug"
    } else {
        "sitepulse=info,sitepulse_channels=info,sitepulse_scanner=info,sitepulse_scheduler=info,\
         sitepulse_agent=info,sitepulse_gateway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref().map(expand_path);

    match cli.command {
        Command::Init { force } => {
            let path = config_path.unwrap_or_else(SitePulseConfig::default_path);
            if path.exists() && !force {
                println!("⚠️  {} already exists (use --force to overwrite).", path.display());
                return Ok(());
            }
            SitePulseConfig::default().save_to(&path)?;
            println!("✅ Config written to {}", path.display());
            Ok(())
        }

        Command::Scan { url, channel, token } => {
            let config = load_config(config_path.as_ref())?;
            let rt = build_runtime(&config)?;
            rt.queue.register_channel(&channel, &token)?;

            let outcome = rt.workflow.run(&url, &channel).await;
            // Queued behind every progress message; awaiting it drains the channel.
            let closing = match &outcome {
                Ok(report) => format!("🏁 Scan of {} finished (score {}/100)", report.url, report.meta.score),
                Err(e) => format!("🛑 Scan of {url} stopped: {}", e.user_message()),
            };
            let status = if outcome.is_ok() { DeliveryStatus::Success } else { DeliveryStatus::Error };
            if let Err(e) = rt.notifier.notify(events::SCAN_REPORT, &channel, status, closing)?.await {
                tracing::warn!("⚠️ Final message not delivered: {e}");
            }

            let report = outcome?;
            println!("{}", report.findings_text());
            Ok(())
        }

        Command::Serve { host, port } => {
            let mut config = load_config(config_path.as_ref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }

            let rt = build_runtime(&config)?;
            let (scheduler, jobs) = ScanScheduler::new(&config.scheduler);
            let scheduler = Arc::new(scheduler);

            // Scheduler loop + executor.
            tokio::spawn(sitepulse_scheduler::spawn_scheduler(
                scheduler.clone(),
                config.scheduler.check_interval_secs,
            ));
            let workflow = rt.workflow.clone();
            sitepulse_scheduler::spawn_executor(jobs, rt.notifier.clone(), move |job| {
                let workflow = workflow.clone();
                async move {
                    let def = job.definition;
                    let report = workflow.run(&def.target_url, &def.channel_id).await?;
                    Ok(format!(
                        "score {}/100, {} broken, {} duplicated",
                        report.meta.score,
                        report.broken.len(),
                        report.duplicates.len()
                    ))
                }
            });

            let advisor = Arc::new(OpenAiAdvisor::from_config(&config.advisor)?);
            let router = Arc::new(ConversationRouter::new(
                Arc::new(SessionStore::new(&config.session)),
                rt.workflow.clone(),
                scheduler.clone(),
                advisor,
                rt.notifier.clone(),
            ));

            tracing::info!("🩺 SitePulse v{} starting", env!("CARGO_PKG_VERSION"));
            tracing::info!("   State is in memory only; schedules and sessions reset on restart");

            sitepulse_gateway::start_server(sitepulse_gateway::AppState {
                gateway_config: config.gateway.clone(),
                start_time: std::time::Instant::now(),
                queue: rt.queue.clone(),
                scheduler,
                router,
            })
            .await
        }
    }
}
