use std::{net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use meshgate::{
    adapters::{
        ApiKeyAuth, HttpClientAdapter, HttpDirectoryClient, HttpHandler, RouteRefresher,
        build_router,
    },
    config::{ServerConfig, ServerConfigValidator, loader},
    core::RouteTable,
    ports::{directory::ServiceDirectory, http_client::HttpClient},
    tracing_setup,
    utils::graceful_shutdown::{GracefulShutdown, ShutdownReason},
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
        /// Ignore MESHGATE_* environment overrides
        #[clap(long)]
        file_only: bool,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config, file_only }) => {
            validate_config_command(&config, file_only).await
        }
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config: ServerConfig = loader::load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ServerConfigValidator::validate(&config)
        .map_err(|e| eyre!("Invalid configuration in {config_path}: {e}"))?;

    tracing_setup::init_tracing(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loaded configuration from {config_path}");

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;

    let directory: Arc<dyn ServiceDirectory> = Arc::new(
        HttpDirectoryClient::from_config(&config.registry)
            .context("Failed to create service directory client")?,
    );
    let routes = Arc::new(RouteTable::new());
    let refresher = Arc::new(RouteRefresher::new(
        directory,
        routes.clone(),
        config.registry.refresh_interval(),
    ));

    // No serving until the first directory fetch succeeds.
    refresher.bootstrap().await.with_context(|| {
        format!(
            "Initial route load from {} failed; refusing to start",
            config.registry.base_url
        )
    })?;

    let graceful_shutdown = Arc::new(GracefulShutdown::new());

    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let refresher_handle = refresher.clone().spawn(graceful_shutdown.token());

    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);
    let handler = Arc::new(HttpHandler::from_config(
        routes,
        http_client,
        &config.forwarding,
        graceful_shutdown.token(),
    ));
    let auth = ApiKeyAuth::from_config(&config.auth).context("Invalid auth configuration")?;
    let app = build_router(handler, auth);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;

    tracing::info!(
        registry = %config.registry.base_url,
        refresh_interval = ?config.registry.refresh_interval(),
        max_attempts = config.forwarding.max_attempts,
        "Gateway listening on {}",
        addr
    );

    let shutdown_token = graceful_shutdown.token();
    let server_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
    .await
    .context("Server error");

    // Stop the refresher even if the server exited on its own.
    graceful_shutdown.trigger_shutdown(ShutdownReason::Manual);
    if let Err(e) = refresher_handle.await {
        tracing::warn!("Route refresher task ended abnormally: {}", e);
    }

    if let Some(reason) = graceful_shutdown.reason() {
        tracing::info!("Graceful shutdown completed ({:?})", reason);
    }

    server_result
}

async fn validate_config_command(config_path: &str, file_only: bool) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let loaded = if file_only {
        loader::load_config_unchecked(config_path).await
    } else {
        loader::load_config(config_path).await
    };

    let config = match loaded {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Registry: {}", config.registry.base_url);
            println!(
                "   • Refresh Interval: {}s",
                config.registry.refresh_interval_secs
            );
            println!("   • Max Attempts: {}", config.forwarding.max_attempts);
            println!("   • Backoff: {:?}", config.forwarding.backoff);
            println!("   • Auth Header: {}", config.auth.header);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure registry.base_url starts with http:// or https://");
            println!("   • Set auth.api_key (or MESHGATE_AUTH__API_KEY)");
            println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Meshgate Configuration

# The address to listen on
listen_addr = "0.0.0.0:8080"

# Service directory: GET {base_url}/services returns [{"name": ..., "url": ...}]
[registry]
base_url = "http://localhost:8081"
timeout_secs = 5
refresh_interval_secs = 30

# Every request must carry this key. Prefer MESHGATE_AUTH__API_KEY in production.
[auth]
api_key = "change-me"
header = "X-API-Key"

[forwarding]
timeout_secs = 10
max_attempts = 3
max_body_bytes = 10485760
preserve_query = true

# Delay before attempt n+1: constant, linear (base_ms * n) or exponential
[forwarding.backoff]
strategy = "linear"
base_ms = 1000

[logging]
level = "info"
json = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'meshgate serve --config {config_path}' to start the server");
    Ok(())
}
