use std::env;
use std::net::SocketAddr;

use chrono::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Default hold lifetime: five minutes, the usual checkout window.
const DEFAULT_HOLD_TTL_SECONDS: i64 = 300;

/// Default expiry-sweep cadence. The worst-case window in which a stale
/// hold still blocks a seat is one sweep interval plus one TTL.
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub hold_ttl: Duration,
    pub sweep_interval: std::time::Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.parse().expect("default addr parses"));

        let hold_ttl_seconds = env::var("HOLD_TTL_SECONDS")
            .ok()
            .and_then(|value| value.parse().ok())
            .filter(|secs| *secs > 0i64)
            .unwrap_or(DEFAULT_HOLD_TTL_SECONDS);

        let sweep_interval_seconds = env::var("SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|value| value.parse().ok())
            .filter(|secs| *secs > 0u64)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS);

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/boxoffice".to_string()),
            bind_addr,
            hold_ttl: Duration::seconds(hold_ttl_seconds),
            sweep_interval: std::time::Duration::from_secs(sweep_interval_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        std::env::remove_var("HOLD_TTL_SECONDS");
        std::env::remove_var("SWEEP_INTERVAL_SECONDS");
        std::env::remove_var("BIND_ADDR");
        let config = Config::from_env();
        assert_eq!(config.hold_ttl, Duration::seconds(300));
        assert_eq!(config.sweep_interval, std::time::Duration::from_secs(30));
        assert_eq!(config.bind_addr.port(), 3001);
    }
}
