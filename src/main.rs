use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::path::PathBuf;
use std::time::Duration;

use aminid::config::Config;
use aminid::db::{AppState, create_pool, init_db, queries};
use aminid::entitlements::ChangeHub;
use aminid::handlers;
use aminid::models::{AccountStatus, CreateProfile, Role};
use aminid::storage;

#[derive(Parser, Debug)]
#[command(name = "aminid")]
#[command(about = "Entitlement relay for the Aminid publishing platform")]
struct Cli {
    /// Seed the database with demo profiles (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds demo data: a reader, an author and an admin, plus storage buckets.
/// Skipped when the reader profile already exists.
fn seed_dev_data(state: &AppState) -> aminid::error::Result<()> {
    let conn = state.db.get()?;

    if queries::get_profile(&conn, "demo-reader")?.is_some() {
        tracing::info!("Database already has demo data, skipping seed");
        return Ok(());
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    for (id, role) in [
        ("demo-reader", Role::Reader),
        ("demo-author", Role::Author),
        ("demo-admin", Role::Admin),
    ] {
        let profile = queries::create_profile(
            &conn,
            &CreateProfile {
                id: id.to_string(),
                role,
                status: AccountStatus::Active,
            },
        )?;
        tracing::info!("Profile: {} ({})", profile.id, profile.role.as_ref());
    }

    let author = queries::create_author(&conn, "demo-author")?;
    tracing::info!("Author: {} (premium: {})", author.user_id, author.premium);

    let buckets = storage::ensure_default_buckets(&conn, &state.storage_root)?;
    tracing::info!("Buckets: {}", buckets.join(", "));

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");
    Ok(())
}

fn spawn_cleanup_task(state: AppState, retention_days: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60); // 5 minutes

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => match queries::purge_stale_checkouts(&conn, retention_days) {
                    Ok(count) => {
                        if count > 0 {
                            tracing::debug!("Purged {} abandoned checkouts", count);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to purge abandoned checkouts: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                }
            }
        }
    });

    tracing::info!("Background cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aminid=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.flutterwave.secret_key.is_none() {
        tracing::warn!("FLW_SECRET_KEY not set: payment verification will fail");
    }
    if config.flutterwave.webhook_secret.is_none() {
        tracing::warn!("FLW_WEBHOOK_SECRET not set: webhooks will be rejected");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        http_client: reqwest::Client::new(),
        flutterwave: config.flutterwave.clone(),
        pricing: config.pricing,
        storage_root: PathBuf::from(&config.storage_root),
        ping_message: config.ping_message.clone(),
        changes: ChangeHub::default(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set AMINID_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    spawn_cleanup_task(state.clone(), config.checkout_retention_days);

    let app = handlers::router(Some(config.rate_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Aminid relay listening on {}", addr);

    // Connect info gives the rate limiter the peer IP.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
