/*
 * Responsibility
 * - Config -> stores -> key cache (fail fast) -> services -> Router
 * - Middleware application (http, CORS, security headers)
 * - axum::serve() with graceful shutdown; stop the key refresher afterwards
 */
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::{Config, StoreBackend};
use crate::middleware;
use crate::repos::{
    AuditStore, IdentityStore, InMemoryStore, PgAuditStore, PgIdentityStore, PgRoleStore,
    PgSessionStore, RoleStore, Seed, SessionStore,
};
use crate::services::auth::{build_key_cache, build_token_verifier};
use crate::services::keys::KeyMaterialCache;
use crate::services::{
    AuditSink, AuthorizationGate, IdentityResolver, PermissionAggregator, PermissionCatalog,
    SessionLedger,
};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,access_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing (stderr may be hidden by the launcher).
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

/// Store trait objects for one backend.
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub roles: Arc<dyn RoleStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            identities: store.clone(),
            roles: store.clone(),
            sessions: store.clone(),
            audit: store,
        }
    }
}

async fn build_stores(config: &Config) -> Result<Stores> {
    match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .acquire_timeout(config.store_timeout)
                .connect(database_url)
                .await
                .context("failed to connect to database")?;

            Ok(Stores {
                identities: Arc::new(PgIdentityStore::new(pool.clone())),
                roles: Arc::new(PgRoleStore::new(pool.clone())),
                sessions: Arc::new(PgSessionStore::new(pool.clone())),
                audit: Arc::new(PgAuditStore::new(pool)),
            })
        }
        StoreBackend::Memory { seed_path } => {
            let store = match seed_path {
                Some(path) => {
                    let seed = Seed::from_path(path)
                        .with_context(|| format!("failed to load seed {}", path.display()))?;
                    InMemoryStore::from_seed(seed)?
                }
                None => InMemoryStore::new(),
            };
            tracing::warn!("using in-memory stores; nothing is persisted");
            Ok(Stores::memory(Arc::new(store)))
        }
    }
}

/// Wire the services over the given stores and key cache.
pub fn build_state(
    stores: &Stores,
    keys: Arc<KeyMaterialCache>,
    config: &Config,
) -> AppState {
    let timeout = config.store_timeout;
    let identities = IdentityResolver::new(stores.identities.clone(), timeout);

    let gate = AuthorizationGate::new(
        build_token_verifier(config, keys),
        identities.clone(),
        PermissionAggregator::new(stores.roles.clone(), timeout),
        AuditSink::new(stores.audit.clone(), timeout),
    );
    let sessions = SessionLedger::new(stores.sessions.clone(), identities, timeout);

    AppState::new(Arc::new(gate), Arc::new(sessions))
}

pub fn build_router(state: AppState, catalog: &PermissionCatalog, config: &Config) -> Result<Router> {
    let v1 = api::v1::routes(state.clone(), catalog)?;

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1)
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    Ok(middleware::http::apply(router, config))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting access gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let stores = build_stores(&config).await?;

    // No keys, no service.
    let keys = build_key_cache(&config)
        .await
        .context("initial verification key fetch failed")?;
    let refresher =
        keys.spawn_refresher(Duration::from_secs(config.jwks_refresh_interval_seconds));

    let catalog = PermissionCatalog::load(stores.roles.as_ref(), config.store_timeout)
        .await
        .context("failed to load permission catalog")?;

    let state = build_state(&stores, keys, &config);
    let app = build_router(state, &catalog, &config)?;

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresher.abort();
    served?;

    Ok(())
}
