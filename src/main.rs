use anyhow::Result;

use medicine_cabinet::config::Config;
use medicine_cabinet::routes::{self, AppState};
use medicine_cabinet::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Medicine Cabinet starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    let store = if config.is_in_memory() {
        tracing::warn!("Using an in-memory database; data is lost on shutdown");
        Store::open_in_memory()?
    } else {
        Store::open(&config.database_url)?
    };
    tracing::info!("✅ Store ready");

    let app_state = AppState::new(&config, store)?;
    let app = routes::build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Print startup banner
fn print_startup_banner(config: &Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                  💊 Medicine Cabinet                      ║
║                                                           ║
║        Strain catalog and personal cabinet API            ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Database:    {}", config.database_url.display());
    println!("  Token TTL:   {}s", config.jwt_expiry.as_secs());
    println!("  Log Level:   {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
