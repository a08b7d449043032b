//! HTTP server bootstrap.
//!
//! This module wires together:
//! - configuration
//! - database connection pool
//! - core services (product store, ledger, entitlement store, gateway)
//! - the chain and storage collaborators
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::gateway::DownloadGateway;
use crate::infra::{PgEntitlementStore, PgProductStore, PgPurchaseLedger};
use crate::payment::{ChainClient, RpcChainClient, VerifierConfig};
use crate::storage::HttpFileStorage;
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Solana JSON-RPC endpoint.
    pub rpc_url: String,
    /// Label shown in wallet UIs on payment requests.
    pub marketplace_label: String,
    /// Conversion rate (marketplace currency units per SOL), supplied by
    /// the deployment's price-oracle integration.
    pub native_rate: Decimal,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/nect_commerce".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let rpc_url = std::env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());

        let marketplace_label =
            std::env::var("MARKETPLACE_LABEL").unwrap_or_else(|_| "Nect".to_string());

        let native_rate: Decimal = std::env::var("USD_PER_SOL_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| Decimal::from(150));

        Self {
            database_url,
            listen_addr,
            max_connections,
            rpc_url,
            marketplace_label,
            native_rate,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<PgProductStore>,
    pub ledger: Arc<PgPurchaseLedger>,
    pub gateway: Arc<DownloadGateway>,
    pub chain: Arc<dyn ChainClient>,
    pub marketplace_label: String,
    pub native_rate: Decimal,
    pub verifier_config: VerifierConfig,
    pub pool: PgPool,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env());

    info!("Starting nect-commerce v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);
    info!("  RPC endpoint: {}", config.rpc_url);

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(config.rpc_url.clone()));
    let state = build_state(
        pool,
        chain,
        config.marketplace_label.clone(),
        config.native_rate,
    );

    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("nect-commerce is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble application state from a pool and a chain client.
///
/// Split out so tests can inject their own collaborators.
pub fn build_state(
    pool: PgPool,
    chain: Arc<dyn ChainClient>,
    marketplace_label: String,
    native_rate: Decimal,
) -> AppState {
    let products = Arc::new(PgProductStore::new(pool.clone()));
    let ledger = Arc::new(PgPurchaseLedger::new(pool.clone()));
    let entitlements = Arc::new(PgEntitlementStore::new(pool.clone()));
    let storage = Arc::new(HttpFileStorage::new());
    let gateway = Arc::new(DownloadGateway::new(entitlements, storage));

    AppState {
        products,
        ledger,
        gateway,
        chain,
        marketplace_label,
        native_rate,
        verifier_config: VerifierConfig::default(),
        pool,
    }
}

/// Build the full router (API, identity middleware, health probes).
pub fn build_router() -> anyhow::Result<Router<AppState>> {
    let api = crate::api::router().layer(axum::middleware::from_fn(
        crate::auth::identity_middleware,
    ));

    let mut router = Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "nect-commerce",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Ok(axum::Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
        }))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {}", e),
        )),
    }
}
