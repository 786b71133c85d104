use std::sync::Arc;

use futures::StreamExt;
use workshop_bot::channels::{Channel, CliChannel, TelegramChannel};
use workshop_bot::config::BotConfig;
use workshop_bot::dispatch::Dispatcher;
use workshop_bot::registry::{OrderRegistry, UserRegistry};
use workshop_bot::store::{FlatFileStore, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("🔨 Workshop Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", config.data_dir.display());
    eprintln!("   Roles: {}", config.worker_roles.join(", "));

    // ── Storage & registries ─────────────────────────────────────────
    let store: Arc<dyn Storage> = Arc::new(FlatFileStore::new(&config.data_dir).await?);
    let users = UserRegistry::new(Arc::clone(&store));
    users.ensure_system_admin().await?;
    let orders = OrderRegistry::new(Arc::clone(&store));

    // ── Channels ─────────────────────────────────────────────────────
    let mut channels: Vec<Arc<dyn Channel>> = Vec::new();
    let mut active_channels = vec!["telegram"];

    let telegram = TelegramChannel::new(config.token.clone());
    if let Err(e) = telegram.health_check().await {
        eprintln!("   Warning: Telegram health check failed: {e}");
    }
    channels.push(Arc::new(telegram));

    // Local REPL, for poking at the state machine without a bot token
    // that resolves (set WORKSHOP_CLI=1). Outbound notifications are
    // mirrored to every active channel, so with the REPL enabled each
    // reply is also posted to Telegram — a dev-only mode, not for a
    // deployment serving real users.
    if std::env::var("WORKSHOP_CLI").is_ok() {
        eprintln!("   Warning: CLI mode mirrors all replies to Telegram as well");
        channels.push(Arc::new(CliChannel::new()));
        active_channels.push("cli");
    }
    eprintln!("   Channels: {}\n", active_channels.join(", "));

    let mut dispatcher = Dispatcher::new(config, users, orders);

    // Merge every channel's inbound stream into one ordered queue. The
    // dispatcher consumes it strictly one event at a time, so no two
    // transitions ever interleave.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for channel in &channels {
        let mut stream = channel.start().await?;
        let tx = tx.clone();
        let name = channel.name().to_string();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
            tracing::info!(channel = %name, "Event stream ended");
        });
    }
    drop(tx);

    while let Some(event) = rx.recv().await {
        for note in dispatcher.handle(event).await {
            // Every channel gets every notification; each transport
            // delivers to the identities it can reach.
            for channel in &channels {
                if let Err(e) = channel.send(&note).await {
                    tracing::warn!(
                        channel = channel.name(),
                        to = note.to,
                        "Send failed: {e}"
                    );
                }
            }
        }
    }

    for channel in &channels {
        channel.shutdown().await?;
    }
    Ok(())
}
