//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unparsable numeric values fall back to
//! their defaults; an unparsable address or an unknown enum value is a
//! configuration error.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::bus::Topic;
use crate::error::GatewayError;
use crate::service::BackoffPolicy;

/// Which pub/sub transport the instance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusBackend {
    /// Redis pub/sub; required for more than one instance.
    Redis,
    /// In-process channel; single-instance deployments only.
    Memory,
}

impl FromStr for BusBackend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(GatewayError::Config(format!("unknown BUS_BACKEND: {other}"))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(GatewayError::Config(format!("unknown LOG_FORMAT: {other}"))),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Pub/sub transport selection.
    pub bus_backend: BusBackend,

    /// Redis connection string, used when `bus_backend` is `Redis`.
    pub redis_url: String,

    /// Channel shared by every instance.
    pub topic: Topic,

    /// Channel capacity of the in-memory bus.
    pub memory_bus_capacity: usize,

    /// Messages queued per connection before it is considered stalled.
    pub outbound_queue_capacity: usize,

    /// Upper bound on a single WebSocket write.
    pub write_timeout: Duration,

    /// Resubscription backoff used by the supervisor.
    pub resubscribe: BackoffPolicy,

    /// Log output format.
    pub log_format: LogFormat,

    /// Timeout applied to REST requests.
    pub http_request_timeout: Duration,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` cannot be parsed
    /// as a [`SocketAddr`] or `BUS_BACKEND`/`LOG_FORMAT` is unknown.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConfig::from_env`].
    pub fn from_source<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let bus_backend: BusBackend = lookup("BUS_BACKEND")
            .as_deref()
            .unwrap_or("redis")
            .parse()?;

        let redis_url =
            lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string());

        let topic = lookup("BROADCAST_TOPIC")
            .filter(|t| !t.is_empty())
            .map(Topic::new)
            .unwrap_or_default();

        let memory_bus_capacity = parse_or(&lookup, "MEMORY_BUS_CAPACITY", 1024);
        let outbound_queue_capacity = parse_or(&lookup, "OUTBOUND_QUEUE_CAPACITY", 256);
        let write_timeout = Duration::from_millis(parse_or(&lookup, "WRITE_TIMEOUT_MS", 5_000));

        let resubscribe = BackoffPolicy {
            initial: Duration::from_millis(parse_or(
                &lookup,
                "RESUBSCRIBE_INITIAL_BACKOFF_MS",
                100,
            )),
            max: Duration::from_millis(parse_or(&lookup, "RESUBSCRIBE_MAX_BACKOFF_MS", 30_000)),
            max_attempts: parse_or(&lookup, "RESUBSCRIBE_MAX_ATTEMPTS", 0),
        };

        let log_format: LogFormat = lookup("LOG_FORMAT").as_deref().unwrap_or("text").parse()?;

        let http_request_timeout =
            Duration::from_secs(parse_or(&lookup, "HTTP_REQUEST_TIMEOUT_SECS", 10));

        Ok(Self {
            listen_addr,
            bus_backend,
            redis_url,
            topic,
            memory_bus_capacity,
            outbound_queue_capacity,
            write_timeout,
            resubscribe,
            log_format,
            http_request_timeout,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        GatewayConfig::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let Ok(cfg) = load(&[]) else {
            panic!("defaults must load");
        };
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.bus_backend, BusBackend::Redis);
        assert_eq!(cfg.redis_url, "redis://localhost:6379");
        assert_eq!(cfg.topic.as_str(), "broadcast-channel");
        assert_eq!(cfg.outbound_queue_capacity, 256);
        assert_eq!(cfg.write_timeout, Duration::from_secs(5));
        assert_eq!(cfg.resubscribe.max_attempts, 0);
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(cfg) = load(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("BUS_BACKEND", "memory"),
            ("BROADCAST_TOPIC", "chat"),
            ("WRITE_TIMEOUT_MS", "250"),
            ("RESUBSCRIBE_MAX_ATTEMPTS", "7"),
            ("LOG_FORMAT", "JSON"),
        ]) else {
            panic!("overrides must load");
        };
        assert_eq!(cfg.listen_addr.port(), 9000);
        assert_eq!(cfg.bus_backend, BusBackend::Memory);
        assert_eq!(cfg.topic.as_str(), "chat");
        assert_eq!(cfg.write_timeout, Duration::from_millis(250));
        assert_eq!(cfg.resubscribe.max_attempts, 7);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let Ok(cfg) = load(&[("OUTBOUND_QUEUE_CAPACITY", "lots")]) else {
            panic!("should load");
        };
        assert_eq!(cfg.outbound_queue_capacity, 256);
    }

    #[test]
    fn zero_resubscribe_backoff_still_waits() {
        let Ok(cfg) = load(&[
            ("RESUBSCRIBE_INITIAL_BACKOFF_MS", "0"),
            ("RESUBSCRIBE_MAX_BACKOFF_MS", "0"),
        ]) else {
            panic!("should load");
        };
        assert_eq!(cfg.resubscribe.delay(1), crate::service::MIN_BACKOFF);
        assert_eq!(cfg.resubscribe.delay(5), crate::service::MIN_BACKOFF);
    }

    #[test]
    fn empty_topic_uses_default() {
        let Ok(cfg) = load(&[("BROADCAST_TOPIC", "")]) else {
            panic!("should load");
        };
        assert_eq!(cfg.topic, Topic::default());
    }

    #[test]
    fn bad_listen_addr_is_an_error() {
        assert!(matches!(
            load(&[("LISTEN_ADDR", "nowhere")]),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(matches!(
            load(&[("BUS_BACKEND", "kafka")]),
            Err(GatewayError::Config(_))
        ));
    }
}
