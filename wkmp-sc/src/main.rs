//! Subsonic Compatibility (wkmp-sc) - Main entry point
//!
//! Serves the Subsonic/OpenSubsonic REST API on port 5726 and provides the
//! small admin commands that manage the credentials it authenticates against.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wkmp_common::api::TokenCodec;
use wkmp_common::config::{database_path, load_toml_config, resolve_root_folder, TomlConfig};
use wkmp_common::db::{init_database, load_token_secret};
use wkmp_sc::db::users::{create_user, issue_api_key, revoke_api_key};
use wkmp_sc::db::{CredentialStore, SqliteCredentialStore};
use wkmp_sc::{build_router, AppState, TOKEN_ISSUER};

/// Command-line arguments for wkmp-sc
#[derive(Parser, Debug)]
#[command(name = "wkmp-sc")]
#[command(about = "Subsonic/OpenSubsonic API for WKMP")]
#[command(version)]
struct Args {
    /// Root folder holding wkmp.db
    #[arg(short, long, env = "WKMP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "WKMP_SC_PORT")]
    port: Option<u16>,

    /// Config file (default: platform config locations)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create a user
    CreateUser {
        username: String,

        #[arg(long, env = "WKMP_SC_PASSWORD", hide_env_values = true)]
        password: String,

        /// Grant administrator rights
        #[arg(long)]
        admin: bool,

        /// Also keep the plaintext so the user can log in with `t`/`s`
        #[arg(long)]
        legacy_password: bool,
    },

    /// Print a user's API key, issuing one if the user has none
    ApiKey {
        username: String,

        /// Remove the key instead
        #[arg(long)]
        revoke: bool,
    },

    /// Print a bearer token for a user
    IssueToken {
        username: String,

        /// Lifetime in seconds (overrides the config file)
        #[arg(long)]
        ttl_seconds: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wkmp_sc=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting WKMP Subsonic Compatibility (wkmp-sc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "WKMP_ROOT_FOLDER", &config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, &config, root_folder, args.port).await,
        Command::CreateUser {
            username,
            password,
            admin,
            legacy_password,
        } => {
            let id = create_user(&pool, &username, &password, admin, legacy_password)
                .await
                .with_context(|| format!("Failed to create user '{}'", username))?;
            println!("Created user {} (id {})", username, id);
            Ok(())
        }
        Command::ApiKey { username, revoke } => {
            let store = SqliteCredentialStore::new(pool);
            if revoke {
                revoke_api_key(&store, &username)
                    .await
                    .with_context(|| format!("Failed to revoke API key for '{}'", username))?;
                println!("Revoked API key for {}", username);
            } else {
                let key = issue_api_key(&store, &username)
                    .await
                    .with_context(|| format!("Failed to issue API key for '{}'", username))?;
                println!("{}", key);
            }
            Ok(())
        }
        Command::IssueToken {
            username,
            ttl_seconds,
        } => {
            let ttl = ttl_seconds.unwrap_or(config.subsonic.token_ttl_seconds);
            let token = issue_token(pool, &username, ttl).await?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn token_codec(pool: &SqlitePool) -> Result<TokenCodec> {
    let secret = load_token_secret(pool)
        .await
        .context("Failed to load token signing secret")?;
    Ok(TokenCodec::new(secret, TOKEN_ISSUER))
}

async fn issue_token(pool: SqlitePool, username: &str, ttl_seconds: i64) -> Result<String> {
    let codec = token_codec(&pool).await?;
    let store = SqliteCredentialStore::new(pool);
    let record = store
        .lookup_by_username(username)
        .await?
        .with_context(|| format!("No such user '{}'", username))?;

    let now = chrono::Utc::now().timestamp();
    let claims = codec.claims_for(record.id, &record.username, record.is_admin, now, ttl_seconds);
    Ok(codec.issue(&claims)?)
}

async fn serve(
    pool: SqlitePool,
    config: &TomlConfig,
    root_folder: PathBuf,
    port_override: Option<u16>,
) -> Result<()> {
    let tokens = token_codec(&pool).await?;
    info!("✓ Loaded bearer token signing secret");

    let music_folder = config
        .subsonic
        .music_folder
        .clone()
        .unwrap_or(root_folder);
    info!("Music folder: {}", music_folder.display());

    let state = AppState::new(pool, tokens, music_folder);
    let app = build_router(state);

    let port = port_override.unwrap_or(config.subsonic.port);
    let addr: SocketAddr = format!("{}:{}", config.subsonic.bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.subsonic.bind))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("wkmp-sc listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
