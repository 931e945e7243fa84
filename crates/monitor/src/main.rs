//! Host monitor - Linux CPU and memory monitoring service
//!
//! Samples CPU and memory usage from `/proc`, alerts a chat when either
//! crosses its limit, and answers remote commands from the same chat.

use std::sync::Arc;

use anyhow::{Context, Result};
use monitor_lib::{
    health::{components, HealthRegistry},
    messaging::{Messenger, TelegramClient, UpdateSource},
    sampler::{CpuProbe, MemoryProbe, ProcFs, Sampler, SamplerConfig},
    settings::Settings,
    CommandDispatcher, CommandPoller, LifecycleController, NotificationWatcher, ResourceKind,
    StructuredLogger, UsageGauge,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let settings = match config::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load settings");
            std::process::exit(1);
        }
    };
    info!(node_name = %settings.node_name, "Host monitor configured");

    run(settings).await
}

async fn run(settings: Settings) -> Result<()> {
    let logger = StructuredLogger::new(&settings.node_name);
    let lifecycle = LifecycleController::new(settings.monitoring_enabled);
    let thresholds = settings.thresholds();

    // Initialize health registry
    let health = HealthRegistry::new();
    for component in [
        components::CPU_SAMPLER,
        components::MEMORY_SAMPLER,
        components::NOTIFIER,
        components::BOT,
    ] {
        health.register(component).await;
    }

    let cpu_gauge = Arc::new(UsageGauge::new());
    let memory_gauge = Arc::new(UsageGauge::new());
    let proc_fs = Arc::new(ProcFs::with_root(&settings.proc_root));

    let cpu_sampler = Sampler::new(
        Arc::new(CpuProbe::new(proc_fs.clone())),
        cpu_gauge.clone(),
        lifecycle.clone(),
        health.clone(),
        SamplerConfig::new(thresholds.interval_for(ResourceKind::Cpu)),
    );
    let memory_sampler = Sampler::new(
        Arc::new(MemoryProbe::new(proc_fs)),
        memory_gauge.clone(),
        lifecycle.clone(),
        health.clone(),
        SamplerConfig::new(thresholds.interval_for(ResourceKind::Memory)),
    );

    let telegram = Arc::new(
        TelegramClient::new(
            &settings.telegram_api_url,
            settings.bot_token.clone(),
            settings.poll_timeout(),
        )
        .context("creating bot API client")?,
    );

    let bot_username = match telegram.get_me().await {
        Ok(me) => {
            logger.bot_connected(me.username.as_deref().unwrap_or_default(), settings.chat_id);
            me.username
        }
        Err(e) => {
            warn!(error = %e, "Bot API not reachable at startup, polling will retry");
            health.set_degraded(components::BOT, e.to_string()).await;
            None
        }
    };

    let messenger: Arc<dyn Messenger> = telegram.clone();
    let updates: Arc<dyn UpdateSource> = telegram;

    let watcher = Arc::new(
        NotificationWatcher::new(
            cpu_gauge.clone(),
            memory_gauge.clone(),
            thresholds,
            lifecycle.clone(),
            messenger.clone(),
            settings.chat_id,
            health.clone(),
            logger.clone(),
        )
        .with_cooldown(settings.alert_cooldown()),
    );

    let mut dispatcher = CommandDispatcher::new(
        lifecycle.clone(),
        cpu_gauge,
        memory_gauge,
        health.clone(),
        settings.chat_id,
        logger.clone(),
    );
    if let Some(username) = bot_username {
        dispatcher = dispatcher.with_bot_username(username);
    }
    let dispatcher = Arc::new(dispatcher);
    let poller = CommandPoller::new(updates, messenger, dispatcher, health);

    // Every loop is spawned exactly once; the flag decides whether it works.
    let mut handles = Vec::new();
    handles.extend(cpu_sampler.start());
    handles.extend(memory_sampler.start());
    handles.push(tokio::spawn(watcher.run(lifecycle.subscribe_shutdown())));
    handles.push(tokio::spawn(poller.run(lifecycle.subscribe_shutdown())));

    logger.service_started(&settings.app_version, lifecycle.is_enabled());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.service_shutdown("SIGINT received");
    lifecycle.shutdown();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    Ok(())
}
