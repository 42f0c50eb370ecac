// src/config.rs

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub rust_log: String,
    pub log_dir: PathBuf,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Sessions that send no complete request for this long are closed. `None` disables the check.
    pub idle_timeout: Option<Duration>,
    pub handshake_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://lms.db?mode=rwc".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let idle_secs: u64 = parse_var("IDLE_TIMEOUT_SECS", 1800);

        Self {
            bind_addr,
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5),
            tls_cert_path: env::var("TLS_CERT_PATH")
                .unwrap_or_else(|_| "server.crt".to_string())
                .into(),
            tls_key_path: env::var("TLS_KEY_PATH")
                .unwrap_or_else(|_| "server.key".to_string())
                .into(),
            rust_log,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()).into(),
            admin_username: env::var("ADMIN_USERNAME").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            idle_timeout: idle_timeout_from_secs(idle_secs),
            handshake_timeout: Duration::from_secs(parse_var("HANDSHAKE_TIMEOUT_SECS", 10)),
            max_frame_bytes: parse_var("MAX_FRAME_BYTES", 1024 * 1024),
        }
    }
}

impl Default for Config {
    /// Defaults suitable for tests and local runs; nothing is read from the environment.
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            tls_cert_path: "server.crt".into(),
            tls_key_path: "server.key".into(),
            rust_log: "info".to_string(),
            log_dir: "logs".into(),
            admin_username: None,
            admin_password: None,
            idle_timeout: idle_timeout_from_secs(1800),
            handshake_timeout: Duration::from_secs(10),
            max_frame_bytes: 1024 * 1024,
        }
    }
}

fn idle_timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid value {:?} for {}, using default {}", raw, name, default);
        default
    })
}
