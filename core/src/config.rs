// =============================================================================
// Configuration loading — environment-variable driven, `.env`-aware
// =============================================================================
//
// Mirrors the teacher's `dotenv::dotenv()` + env-var-override pattern from
// `main.rs`, generalized into a small typed loader every binary calls once
// at startup. There is no config *file* format here (unlike the teacher's
// `RuntimeConfig::load("runtime_config.json")`) — the spec's ambient stack
// section calls for env-var configuration, and reconfiguration at runtime is
// explicitly out of scope (the Non-goals rule out HA/ops surfaces, but the
// env-loader itself is ambient stack, not a feature).
// =============================================================================

use std::env;
use std::time::Duration;

/// Shared connection settings every binary needs.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub pool_min_connections: u32,
    pub pool_max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let pool_max_connections = env_u32("AURORA_DB_POOL_MAX", 16);
        let pool_min_connections = env_u32("AURORA_DB_POOL_MIN", 4);
        Ok(Self {
            database_url,
            pool_min_connections,
            pool_max_connections,
        })
    }
}

/// Task/RPC deadlines (spec §5 "Cancellation & timeouts").
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub task_deadline: Duration,
    pub client_request_deadline: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            task_deadline: Duration::from_secs(env_u64("AURORA_TASK_DEADLINE_SECS", 30)),
            client_request_deadline: Duration::from_secs(env_u64(
                "AURORA_CLIENT_DEADLINE_SECS",
                10,
            )),
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

pub fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Install the process-wide tracing subscriber. Every binary calls this
/// first, matching the teacher's `tracing_subscriber::fmt().with_env_filter`
/// bootstrap in `main.rs`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
