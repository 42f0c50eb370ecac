// src/main.rs

use std::{process::ExitCode, time::Duration};

use lms_server::{config::Config, db, server, state::AppState, tls};
use sqlx::SqlitePool;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "lms-server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let Some(pool) = connect_with_retry(&config).await else {
        return ExitCode::FAILURE;
    };
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    if let Err(e) = db::migrate(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        return ExitCode::FAILURE;
    }
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = db::seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {}", e);
    }

    let acceptor = match tls::load_acceptor(&config.tls_cert_path, &config.tls_key_path) {
        Ok(acceptor) => acceptor,
        Err(e) => {
            tracing::error!("Failed to load TLS certificate: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(pool.clone(), config);

    tokio::select! {
        result = server::serve(listener, acceptor, state) => {
            if let Err(e) = result {
                tracing::error!("Server stopped: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, closing database pool");
        }
    }

    pool.close().await;
    ExitCode::SUCCESS
}

/// Opens the pool, retrying a few times while the database file or volume comes up.
async fn connect_with_retry(config: &Config) -> Option<SqlitePool> {
    let mut retry_count = 0;
    loop {
        match db::connect(config).await {
            Ok(pool) => return Some(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return None;
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
