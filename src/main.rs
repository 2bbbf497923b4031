use clap::Parser;
use gateway_translate::{build_router, config, AppState, GatewayConfig, SharedJournal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gateway-translate",
    about = "Protocol translation sidecar for Chat Completions, Responses and Claude Messages",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Diagnostics journal path (overrides config)
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_translate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        println!("  0. --config <PATH>");
        for (i, path) in config::search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(journal) = cli.journal {
        config.journal_path = journal;
    }

    let journal = SharedJournal::open(&config.journal_path)?;

    info!("gateway-translate v{}", env!("CARGO_PKG_VERSION"));
    info!("  Bind:      {}:{}", config.bind, config.port);
    info!("  Channels:  {} configured", config.channels.len());
    for channel in config.descriptors() {
        info!("    {} -> {} ({})", channel.name, channel.protocol, channel.base_url);
    }
    info!("  Redaction: {} bytes", config.redaction.threshold_bytes);
    info!("  Journal:   {}", config.journal_path.display());

    journal.info(
        "startup",
        format!(
            "Starting gateway-translate bind={}:{} channels={}",
            config.bind,
            config.port,
            config.channels.len()
        ),
    );

    let bind_addr = format!("{}:{}", config.bind, config.port);
    let state = Arc::new(AppState { config, journal });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
