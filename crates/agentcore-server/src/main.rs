#![forbid(unsafe_code)]

//! **agentcore-server** – Process entry point for the Agent Lifecycle &
//! Runtime Core.
//!
//! Wires the lifecycle manager, deployment orchestrator, budget enforcer,
//! permission resolver, and runtime gateway into one runnable HTTP
//! service, and drives the background schedulers (birthday ticker,
//! counter rollovers) that the library crates expose but do not self-host.
//! Grounded in `toka-orchestration-service/src/main.rs`'s CLI, logging,
//! router, and graceful-shutdown structure.

mod config;
mod engine;
mod profiles;
mod ratelimit;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use agentcore_budget::BudgetEnforcer;
use agentcore_bus::EventBus;
use agentcore_deploy::adapters::{ContainerTarget, ManagedPlatformATarget, ManagedPlatformBTarget, RemoteShellTarget};
use agentcore_deploy::DeployerRegistry;
use agentcore_lifecycle::{BirthdayHook, LifecycleManager};
use agentcore_permissions::{PermissionProfile, PermissionResolver, ToolPolicy};
use agentcore_resilience::TokenBucket;
use agentcore_store_memory::MemoryBackend;

use config::{Cli, CoreConfig};
use engine::EngineState;
use profiles::ProfileIndex;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let config = CoreConfig::from(Cli::parse());
    init_logging(&config.log_level);

    info!(?config, "starting agentcore-server v{}", env!("CARGO_PKG_VERSION"));

    if config.require_jwt && config.jwt_secret.is_empty() {
        anyhow::bail!("--require-jwt was set but no JWT secret was provided (flag or JWT_SECRET env var)");
    }

    let deployers = DeployerRegistry::new();
    deployers.register("container", Arc::new(ContainerTarget::default()));
    deployers.register("remote_shell", Arc::new(RemoteShellTarget::default()));
    deployers.register("managed_platform_a", Arc::new(ManagedPlatformATarget::default()));
    deployers.register("managed_platform_b", Arc::new(ManagedPlatformBTarget::default()));

    let budget = Arc::new(BudgetEnforcer::new());
    let birthday_hook: Option<Arc<dyn BirthdayHook>> = None;
    let lifecycle = LifecycleManager::new(EventBus::new(), deployers, budget, birthday_hook);

    if config.storage != "memory" {
        warn!(requested = %config.storage, "only the in-memory persistence backend is wired into this build; falling back to it");
    }
    lifecycle
        .set_persistence(Arc::new(MemoryBackend::new()))
        .await
        .context("failed to install the persistence backend")?;

    if config.features.birthday_scheduler {
        lifecycle.start_birthday_scheduler();
        info!("birthday notification scheduler started");
    }
    if config.features.rollover_schedulers {
        spawn_rollover_schedulers(lifecycle.clone());
        info!("usage-counter rollover schedulers started");
    }

    let profile_index = ProfileIndex::new();
    let permissions = Arc::new(PermissionResolver::new(Arc::new(profile_index.clone())));
    // Seeded so a freshly-started process can exercise `spawn_sub_agent`
    // out of the box; operators replace this via `reload_profile` calls
    // from their own provisioning path before handling real traffic.
    permissions.reload_profile(default_permission_profile());

    let gateway_state = agentcore_gateway::GatewayState::new(lifecycle.clone(), permissions.clone(), None);
    let engine_state = EngineState::new(lifecycle.clone(), permissions, profile_index);

    let mut app = Router::new()
        .merge(agentcore_gateway::router(gateway_state))
        .merge(engine::router(engine_state))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if config.rate_limit.enabled {
        let bucket = Arc::new(TokenBucket::new(
            config.rate_limit.max_tokens,
            config.rate_limit.refill_rate,
            config.rate_limit.refill_interval_ms,
        ));
        app = app.layer(axum::middleware::from_fn_with_state(bucket, ratelimit::enforce));
    }

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind to port {}", config.port))?;
    info!(port = config.port, "listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                warn!(%err, "http server exited with an error");
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down");
    lifecycle.shutdown().await;
    info!("agentcore-server stopped");
    Ok(())
}

fn default_permission_profile() -> PermissionProfile {
    PermissionProfile {
        id: "default".into(),
        tool_policies: std::collections::HashMap::from([("spawn_sub_agent".into(), ToolPolicy::Auto)]),
        external_tools: std::collections::HashSet::new(),
    }
}

fn spawn_rollover_schedulers(lifecycle: Arc<LifecycleManager>) {
    let daily = lifecycle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            ticker.tick().await;
            daily.rollover_daily().await;
        }
    });
    let weekly = lifecycle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(7 * 24 * 60 * 60));
        loop {
            ticker.tick().await;
            weekly.rollover_weekly().await;
        }
    });
    let monthly = lifecycle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30 * 24 * 60 * 60));
        loop {
            ticker.tick().await;
            monthly.rollover_monthly().await;
        }
    });
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(365 * 24 * 60 * 60));
        loop {
            ticker.tick().await;
            lifecycle.rollover_annual().await;
        }
    });
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn init_logging(log_level: &str) {
    let filter = format!(
        "agentcore_server={level},agentcore_gateway={level},agentcore_lifecycle={level},agentcore_deploy={level},agentcore_budget={level}",
        level = log_level
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
