//! Command-line parsing and the options record controlling one run of the
//! service. Grounded in `toka-orchestration-service`'s `Cli` struct: every
//! setting is either a flag with a default or an environment-sourced
//! secret, never a hard-coded value.

use clap::Parser;
use serde::Serialize;

/// Agent Lifecycle & Runtime Core — process entry point.
#[derive(Parser, Debug)]
#[command(name = "agentcore-server")]
#[command(about = "Agent Lifecycle & Runtime Core — lifecycle manager, deployment orchestrator, budget enforcer, and runtime gateway")]
#[command(version)]
pub struct Cli {
    /// HTTP listen port for the runtime gateway and engine surface.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Persistence backend. Only `memory` ships in this workspace; the
    /// flag exists so a future backend can be selected without changing
    /// the wiring in `main`.
    #[arg(long, default_value = "memory")]
    pub storage: String,

    /// Connection string / path for a persistent storage backend.
    /// Unused by the in-memory backend.
    #[arg(long, default_value = "data/agentcore.db")]
    pub db_path: String,

    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// JWT signing secret. Never defaulted to a real value in code — an
    /// empty default forces an explicit env var or flag in any
    /// environment that enables `--require-jwt`.
    #[arg(long, env = "JWT_SECRET", default_value = "")]
    pub jwt_secret: String,

    /// Reject requests unless a JWT secret has been configured. Off by
    /// default so the service is usable in local/dev without auth wired.
    #[arg(long)]
    pub require_jwt: bool,

    /// Token-bucket capacity for the request rate limiter.
    #[arg(long, default_value_t = 200)]
    pub rate_limit_max_tokens: u64,

    /// Tokens restored per `rate_limit_refill_interval_ms`.
    #[arg(long, default_value_t = 50)]
    pub rate_limit_refill_rate: u64,

    /// Refill interval for the rate limiter, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub rate_limit_refill_interval_ms: u64,

    /// Disable the request rate limiter entirely.
    #[arg(long)]
    pub disable_rate_limit: bool,

    /// Disable the hourly birthday-notification scheduler.
    #[arg(long)]
    pub disable_birthday_scheduler: bool,

    /// Disable the daily/weekly/monthly/annual usage-counter rollover
    /// schedulers.
    #[arg(long)]
    pub disable_rollover_schedulers: bool,
}

/// Rate-limit parameters for the token-bucket request limiter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitConfig {
    /// Whether the limiter is active.
    pub enabled: bool,
    /// Bucket capacity.
    pub max_tokens: u64,
    /// Tokens restored per interval.
    pub refill_rate: u64,
    /// Refill interval, milliseconds.
    pub refill_interval_ms: u64,
}

/// Feature toggles controlling optional background subsystems.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureToggles {
    /// Run the hourly birthday-notification ticker.
    pub birthday_scheduler: bool,
    /// Run the daily/weekly/monthly/annual rollover tickers.
    pub rollover_schedulers: bool,
}

/// The single options record controlling one run of the service: listen
/// port, persistence connection info, JWT secret, logging verbosity,
/// rate-limit configuration, and feature toggles. Never logged whole —
/// `jwt_secret` is redacted by the custom `Debug` impl below.
#[derive(Clone, Serialize)]
pub struct CoreConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Persistence backend kind (`memory`, ...).
    pub storage: String,
    /// Persistence connection info (path, DSN, ...).
    pub db_path: String,
    /// `tracing` filter directive, e.g. `"info"`.
    pub log_level: String,
    /// JWT signing secret. Empty means auth is not configured.
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Reject startup if `jwt_secret` is empty.
    pub require_jwt: bool,
    /// Rate-limit configuration for the request limiter middleware.
    pub rate_limit: RateLimitConfig,
    /// Optional-subsystem toggles.
    pub features: FeatureToggles,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("port", &self.port)
            .field("storage", &self.storage)
            .field("db_path", &self.db_path)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &"<redacted>")
            .field("require_jwt", &self.require_jwt)
            .field("rate_limit", &self.rate_limit)
            .field("features", &self.features)
            .finish()
    }
}

impl From<Cli> for CoreConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            storage: cli.storage,
            db_path: cli.db_path,
            log_level: cli.log_level,
            jwt_secret: cli.jwt_secret,
            require_jwt: cli.require_jwt,
            rate_limit: RateLimitConfig {
                enabled: !cli.disable_rate_limit,
                max_tokens: cli.rate_limit_max_tokens,
                refill_rate: cli.rate_limit_refill_rate,
                refill_interval_ms: cli.rate_limit_refill_interval_ms,
            },
            features: FeatureToggles {
                birthday_scheduler: !cli.disable_birthday_scheduler,
                rollover_schedulers: !cli.disable_rollover_schedulers,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_impl_redacts_jwt_secret() {
        let config = CoreConfig {
            port: 8080,
            storage: "memory".into(),
            db_path: "data/agentcore.db".into(),
            log_level: "info".into(),
            jwt_secret: "super-secret".into(),
            require_jwt: false,
            rate_limit: RateLimitConfig {
                enabled: true,
                max_tokens: 200,
                refill_rate: 50,
                refill_interval_ms: 1_000,
            },
            features: FeatureToggles {
                birthday_scheduler: true,
                rollover_schedulers: true,
            },
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
