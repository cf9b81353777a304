/*
 * Responsibility
 * - Load Config → build dependencies → assemble Router
 * - Apply middleware (CORS / security headers / HTTP layers)
 * - axum::serve() with graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::ClaimsAuditRepo;
use crate::services::auth::{ClaimsMutator, build_auth_components};
use crate::services::health::{DependencyProbe, HealthService, MySqlProbe, PgProbe};
use crate::state::AppState;

fn init_tracing(log_level: &str) {
    // RUST_LOG wins; otherwise LOG_LEVEL from Config.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},tower_http=info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env().context("load configuration")?;

    init_tracing(&config.log_level);
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        version = %config.app_version,
        "starting {}",
        config.app_name
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let timeout = config.auth.request_timeout;

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("build http client")?;

    let auth = build_auth_components(config, http).await?;

    let pg = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(timeout)
        .connect(&config.database_url_pg)
        .await
        .context("connect postgres")?;
    // MySQL only backs the data modules; readiness reports it, startup does not wait for it.
    let mysql = MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(timeout)
        .connect_lazy(&config.database_url_mysql)
        .context("configure mysql pool")?;

    let audit = ClaimsAuditRepo::new(pg.clone());
    audit.ensure_schema().await.context("create claims_audit table")?;

    let mutator = Arc::new(ClaimsMutator::new(auth.provider, Arc::new(audit), timeout));

    let probes: Vec<Arc<dyn DependencyProbe>> =
        vec![Arc::new(PgProbe(pg)), Arc::new(MySqlProbe(mysql))];
    let health = Arc::new(HealthService::new(
        probes,
        timeout,
        config
            .health_check_cache_enabled
            .then_some(config.health_check_cache_ttl),
    ));

    Ok(
        AppState::new(auth.authenticator, mutator, health, &config.auth.admin_scope_name)
            .with_app_info(config.app_name.clone(), config.app_version.clone()),
    )
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(state.clone()).with_state(state);

    let router = middleware::security_headers::apply(router, config.app_env.is_production());
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
